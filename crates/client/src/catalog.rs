use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use hatchquote_core::config::CatalogConfig;
use hatchquote_core::cpq::catalog::Catalog;
use hatchquote_core::cpq::currency::Clock;
use hatchquote_core::domain::product::{Product, ProductId};
use hatchquote_core::errors::{ApplicationError, DomainError};
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_products(&self) -> Result<Vec<Product>, ApplicationError>;
    async fn fetch_product_by_id(&self, id: &ProductId) -> Result<Product, ApplicationError>;
    async fn fetch_products_by_category(
        &self,
        category: &str,
    ) -> Result<Vec<Product>, ApplicationError>;
}

pub struct HttpCatalogSource {
    client: Client,
    base_url: String,
}

impl HttpCatalogSource {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client, base_url }
    }

    pub fn from_config(config: &CatalogConfig) -> Result<Self, ApplicationError> {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| ApplicationError::Configuration(error.to_string()))?;
        Ok(Self::new(client, config.base_url.clone()))
    }

    async fn get_json<T>(&self, path: &str) -> Result<T, ApplicationError>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|error| ApplicationError::Catalog(format!("GET {url}: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApplicationError::Catalog(format!("GET {url} returned {status}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|error| ApplicationError::Catalog(format!("GET {url}: invalid body: {error}")))
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch_products(&self) -> Result<Vec<Product>, ApplicationError> {
        self.get_json("/products").await
    }

    async fn fetch_product_by_id(&self, id: &ProductId) -> Result<Product, ApplicationError> {
        self.get_json(&format!("/products/{id}")).await
    }

    async fn fetch_products_by_category(
        &self,
        category: &str,
    ) -> Result<Vec<Product>, ApplicationError> {
        self.get_json(&format!("/products/category/{category}")).await
    }
}

struct CachedCatalog {
    catalog: Catalog,
    fetched_at: DateTime<Utc>,
}

/// Read-through catalog cache.
///
/// The full product list is kept for the TTL. Per-id and per-category reads are
/// answered from a fresh list when one is cached; otherwise they go to the
/// source and fall back to filtering the full list when that request fails.
pub struct CatalogService<S, C> {
    source: S,
    clock: C,
    ttl: Duration,
    cache: Mutex<Option<CachedCatalog>>,
}

impl<S, C> CatalogService<S, C>
where
    S: CatalogSource,
    C: Clock,
{
    pub fn new(source: S, clock: C, ttl: Duration) -> Self {
        Self { source, clock, ttl, cache: Mutex::new(None) }
    }

    /// Full catalog. A stale cached copy is served if a refresh fails.
    pub async fn catalog(&self) -> Result<Catalog, ApplicationError> {
        let now = self.clock.now();
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if now - cached.fetched_at < self.ttl {
                debug!(event_name = "catalog.cache_hit", products = cached.catalog.products().len());
                return Ok(cached.catalog.clone());
            }
        }

        match self.source.fetch_products().await {
            Ok(products) => {
                let catalog = Catalog::new(products);
                *cache = Some(CachedCatalog { catalog: catalog.clone(), fetched_at: now });
                Ok(catalog)
            }
            Err(error) => match cache.as_ref() {
                Some(stale) => {
                    warn!(
                        event_name = "catalog.stale_served",
                        error = %error,
                        "catalog refresh failed, serving cached products"
                    );
                    Ok(stale.catalog.clone())
                }
                None => Err(error),
            },
        }
    }

    pub async fn products(&self) -> Result<Vec<Product>, ApplicationError> {
        Ok(self.catalog().await?.products().to_vec())
    }

    /// Cached catalog if it is still inside the TTL.
    async fn fresh_catalog(&self) -> Option<Catalog> {
        let now = self.clock.now();
        let cache = self.cache.lock().await;
        cache
            .as_ref()
            .filter(|cached| now - cached.fetched_at < self.ttl)
            .map(|cached| cached.catalog.clone())
    }

    /// Ids missing from a fresh list still go to the source, since the product
    /// may have been added after the list was fetched.
    pub async fn product_by_id(&self, id: &ProductId) -> Result<Product, ApplicationError> {
        if let Some(product) = self.fresh_catalog().await.and_then(|catalog| catalog.find(id).cloned())
        {
            debug!(event_name = "catalog.cache_hit", product_id = %id);
            return Ok(product);
        }

        match self.source.fetch_product_by_id(id).await {
            Ok(product) => Ok(product),
            Err(error) => {
                warn!(
                    event_name = "catalog.fetch_fallback",
                    product_id = %id,
                    error = %error,
                    "product fetch failed, filtering full catalog"
                );
                let catalog = self.catalog().await?;
                catalog
                    .find(id)
                    .cloned()
                    .ok_or_else(|| DomainError::UnknownProduct(id.clone()).into())
            }
        }
    }

    pub async fn products_by_category(
        &self,
        category: &str,
    ) -> Result<Vec<Product>, ApplicationError> {
        if let Some(catalog) = self.fresh_catalog().await {
            debug!(event_name = "catalog.cache_hit", category);
            return Ok(catalog.by_category(category).cloned().collect());
        }

        match self.source.fetch_products_by_category(category).await {
            Ok(products) => Ok(products),
            Err(error) => {
                warn!(
                    event_name = "catalog.fetch_fallback",
                    category,
                    error = %error,
                    "category fetch failed, filtering full catalog"
                );
                let catalog = self.catalog().await?;
                Ok(catalog.by_category(category).cloned().collect())
            }
        }
    }

    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }
}
