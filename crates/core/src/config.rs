use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cpq::currency::CurrencySettings;

pub const DEFAULT_CONFIG_FILE: &str = "hatchquote.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    pub currency: CurrencyConfig,
    pub orders: OrdersConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub base_url: String,
    pub cache_ttl_secs: u64,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CurrencyConfig {
    pub rate_url: String,
    pub display_currency: String,
    pub fallback_rate: Decimal,
    pub cache_ttl_secs: u64,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct OrdersConfig {
    pub endpoint: String,
    pub api_token: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub catalog_base_url: Option<String>,
    pub rate_url: Option<String>,
    pub display_currency: Option<String>,
    pub orders_endpoint: Option<String>,
    pub orders_api_token: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig {
                base_url: "http://localhost:5000/api".to_string(),
                cache_ttl_secs: 300,
                timeout_secs: 10,
            },
            currency: CurrencyConfig {
                rate_url: "http://localhost:5000/api/currency/rate".to_string(),
                display_currency: "UZS".to_string(),
                fallback_rate: Decimal::from(12_650),
                cache_ttl_secs: 300,
                timeout_secs: 5,
            },
            orders: OrdersConfig {
                endpoint: "http://localhost:5000/api/orders".to_string(),
                api_token: None,
                timeout_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl CurrencyConfig {
    pub fn converter_settings(&self) -> CurrencySettings {
        CurrencySettings {
            display_currency: self.display_currency.clone(),
            fallback_rate: self.fallback_rate,
            cache_ttl: Duration::seconds(i64::try_from(self.cache_ttl_secs).unwrap_or(i64::MAX)),
            display_scale: display_scale(&self.display_currency),
        }
    }
}

/// Currencies without minor units display whole amounts.
fn display_scale(currency: &str) -> u32 {
    match currency {
        "UZS" | "JPY" | "KRW" => 0,
        _ => 2,
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(catalog) = patch.catalog {
            if let Some(base_url) = catalog.base_url {
                self.catalog.base_url = base_url;
            }
            if let Some(cache_ttl_secs) = catalog.cache_ttl_secs {
                self.catalog.cache_ttl_secs = cache_ttl_secs;
            }
            if let Some(timeout_secs) = catalog.timeout_secs {
                self.catalog.timeout_secs = timeout_secs;
            }
        }

        if let Some(currency) = patch.currency {
            if let Some(rate_url) = currency.rate_url {
                self.currency.rate_url = rate_url;
            }
            if let Some(display_currency) = currency.display_currency {
                self.currency.display_currency = display_currency;
            }
            if let Some(fallback_rate) = currency.fallback_rate {
                self.currency.fallback_rate = fallback_rate;
            }
            if let Some(cache_ttl_secs) = currency.cache_ttl_secs {
                self.currency.cache_ttl_secs = cache_ttl_secs;
            }
            if let Some(timeout_secs) = currency.timeout_secs {
                self.currency.timeout_secs = timeout_secs;
            }
        }

        if let Some(orders) = patch.orders {
            if let Some(endpoint) = orders.endpoint {
                self.orders.endpoint = endpoint;
            }
            if let Some(api_token) = orders.api_token {
                self.orders.api_token = Some(api_token.into());
            }
            if let Some(timeout_secs) = orders.timeout_secs {
                self.orders.timeout_secs = timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("HATCHQUOTE_CATALOG_BASE_URL") {
            self.catalog.base_url = value;
        }
        if let Some(value) = read_env("HATCHQUOTE_CATALOG_CACHE_TTL_SECS") {
            self.catalog.cache_ttl_secs = parse_u64("HATCHQUOTE_CATALOG_CACHE_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("HATCHQUOTE_CATALOG_TIMEOUT_SECS") {
            self.catalog.timeout_secs = parse_u64("HATCHQUOTE_CATALOG_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("HATCHQUOTE_CURRENCY_RATE_URL") {
            self.currency.rate_url = value;
        }
        if let Some(value) = read_env("HATCHQUOTE_CURRENCY_DISPLAY_CURRENCY") {
            self.currency.display_currency = value;
        }
        if let Some(value) = read_env("HATCHQUOTE_CURRENCY_FALLBACK_RATE") {
            self.currency.fallback_rate =
                parse_decimal("HATCHQUOTE_CURRENCY_FALLBACK_RATE", &value)?;
        }
        if let Some(value) = read_env("HATCHQUOTE_CURRENCY_CACHE_TTL_SECS") {
            self.currency.cache_ttl_secs =
                parse_u64("HATCHQUOTE_CURRENCY_CACHE_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("HATCHQUOTE_CURRENCY_TIMEOUT_SECS") {
            self.currency.timeout_secs = parse_u64("HATCHQUOTE_CURRENCY_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("HATCHQUOTE_ORDERS_ENDPOINT") {
            self.orders.endpoint = value;
        }
        if let Some(value) = read_env("HATCHQUOTE_ORDERS_API_TOKEN") {
            self.orders.api_token = Some(value.into());
        }
        if let Some(value) = read_env("HATCHQUOTE_ORDERS_TIMEOUT_SECS") {
            self.orders.timeout_secs = parse_u64("HATCHQUOTE_ORDERS_TIMEOUT_SECS", &value)?;
        }

        let log_level =
            read_env("HATCHQUOTE_LOGGING_LEVEL").or_else(|| read_env("HATCHQUOTE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("HATCHQUOTE_LOGGING_FORMAT").or_else(|| read_env("HATCHQUOTE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(base_url) = overrides.catalog_base_url {
            self.catalog.base_url = base_url;
        }
        if let Some(rate_url) = overrides.rate_url {
            self.currency.rate_url = rate_url;
        }
        if let Some(display_currency) = overrides.display_currency {
            self.currency.display_currency = display_currency;
        }
        if let Some(endpoint) = overrides.orders_endpoint {
            self.orders.endpoint = endpoint;
        }
        if let Some(api_token) = overrides.orders_api_token {
            self.orders.api_token = Some(api_token.into());
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_catalog(&self.catalog)?;
        validate_currency(&self.currency)?;
        validate_orders(&self.orders)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_http_url(field: &str, url: &str) -> Result<(), ConfigError> {
    let url = url.trim();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

fn validate_timeout(field: &str, timeout_secs: u64) -> Result<(), ConfigError> {
    if timeout_secs == 0 || timeout_secs > 300 {
        return Err(ConfigError::Validation(format!("{field} must be in range 1..=300")));
    }
    Ok(())
}

fn validate_ttl(field: &str, ttl_secs: u64) -> Result<(), ConfigError> {
    if ttl_secs == 0 || ttl_secs > 86_400 {
        return Err(ConfigError::Validation(format!("{field} must be in range 1..=86400")));
    }
    Ok(())
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    validate_http_url("catalog.base_url", &catalog.base_url)?;
    validate_ttl("catalog.cache_ttl_secs", catalog.cache_ttl_secs)?;
    validate_timeout("catalog.timeout_secs", catalog.timeout_secs)
}

fn validate_currency(currency: &CurrencyConfig) -> Result<(), ConfigError> {
    validate_http_url("currency.rate_url", &currency.rate_url)?;
    validate_ttl("currency.cache_ttl_secs", currency.cache_ttl_secs)?;
    validate_timeout("currency.timeout_secs", currency.timeout_secs)?;

    let code = currency.display_currency.as_str();
    if code.len() != 3 || !code.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(ConfigError::Validation(
            "currency.display_currency must be a three-letter ISO code such as `UZS`".to_string(),
        ));
    }

    if currency.fallback_rate <= Decimal::ZERO {
        return Err(ConfigError::Validation(
            "currency.fallback_rate must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_orders(orders: &OrdersConfig) -> Result<(), ConfigError> {
    validate_http_url("orders.endpoint", &orders.endpoint)?;
    validate_timeout("orders.timeout_secs", orders.timeout_secs)?;

    let blank_token = orders
        .api_token
        .as_ref()
        .is_some_and(|token| token.expose_secret().trim().is_empty());
    if blank_token {
        return Err(ConfigError::Validation(
            "orders.api_token is set but empty; remove it or provide a token".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    value.trim().parse::<Decimal>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    catalog: Option<CatalogPatch>,
    currency: Option<CurrencyPatch>,
    orders: Option<OrdersPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    base_url: Option<String>,
    cache_ttl_secs: Option<u64>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CurrencyPatch {
    rate_url: Option<String>,
    display_currency: Option<String>,
    fallback_rate: Option<Decimal>,
    cache_ttl_secs: Option<u64>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct OrdersPatch {
    endpoint: Option<String>,
    api_token: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
