use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::cpq::catalog::{price_for_custom, price_for_size, CatalogPrice};
use crate::cpq::rules::ProductRuleSet;
use crate::cpq::PricingSubject;
use crate::domain::product::{Product, ProductId};
use crate::domain::quote::{DimensionRequest, PriceQuote, PricingTraceStep, TierUsed};
use crate::errors::DomainError;

pub trait PricingEngine: Send + Sync {
    /// Reference-currency unit price for a custom configuration.
    fn price(
        &self,
        subject: PricingSubject<'_>,
        request: &DimensionRequest,
    ) -> Result<PriceQuote, DomainError>;

    /// Unit price of a discrete catalog size.
    fn price_size(
        &self,
        product: &Product,
        size_index: usize,
        installation_is_ceiling: bool,
    ) -> Result<PriceQuote, DomainError>;
}

#[derive(Default)]
pub struct DeterministicPricingEngine;

impl PricingEngine for DeterministicPricingEngine {
    fn price(
        &self,
        subject: PricingSubject<'_>,
        request: &DimensionRequest,
    ) -> Result<PriceQuote, DomainError> {
        match subject {
            PricingSubject::Special(rules) => price_special(rules, request),
            PricingSubject::Generic(product) => price_generic(product, request),
        }
    }

    fn price_size(
        &self,
        product: &Product,
        size_index: usize,
        installation_is_ceiling: bool,
    ) -> Result<PriceQuote, DomainError> {
        let price = price_for_size(product, size_index, installation_is_ceiling)?;
        Ok(catalog_quote(product.id.clone(), price, "size"))
    }
}

impl<T> PricingEngine for &T
where
    T: PricingEngine,
{
    fn price(
        &self,
        subject: PricingSubject<'_>,
        request: &DimensionRequest,
    ) -> Result<PriceQuote, DomainError> {
        (**self).price(subject, request)
    }

    fn price_size(
        &self,
        product: &Product,
        size_index: usize,
        installation_is_ceiling: bool,
    ) -> Result<PriceQuote, DomainError> {
        (**self).price_size(product, size_index, installation_is_ceiling)
    }
}

/// Tier lookup, flap legality, two-flap ladder, then the ceiling addend last.
///
/// A panel that the floor-hatch rules would re-orient is priced in its swapped
/// orientation; the perimeter is unchanged by the swap.
pub fn price_special(
    rules: ProductRuleSet,
    request: &DimensionRequest,
) -> Result<PriceQuote, DomainError> {
    let product_id = ProductId(rules.product_id().to_owned());
    let dimensions = if rules.requires_swap(&request.dimensions) {
        request.dimensions.swapped()
    } else {
        request.dimensions
    };
    let perimeter = dimensions.perimeter();

    let Some(price) = rules.price(&dimensions, request.flap_count, request.installation_is_ceiling)
    else {
        let allowed = rules.allowed_flaps(&dimensions);
        warn!(
            event_name = "pricing.not_computable",
            product_id = %product_id,
            perimeter,
            flap_count = request.flap_count.get(),
            allowed = %allowed,
            "flap count is not legal for the requested geometry"
        );
        return Err(DomainError::PriceNotComputable {
            product_id,
            reason: format!(
                "{} flap(s) not allowed at {dimensions} (allowed: {allowed})",
                request.flap_count
            ),
        });
    };

    let is_over_limit = rules.is_over_limit(perimeter);
    let trace = vec![
        PricingTraceStep {
            stage: "tier".to_owned(),
            detail: format!("perimeter {perimeter} <= {}", price.tier.max_perimeter),
            amount: price.base,
        },
        PricingTraceStep {
            stage: "two_flap_surcharge".to_owned(),
            detail: format!("{}% of tier price", price.two_flap_percent),
            amount: price.two_flap_surcharge,
        },
        PricingTraceStep {
            stage: "ceiling_surcharge".to_owned(),
            detail: "flat ceiling-installation addend".to_owned(),
            amount: price.ceiling_surcharge,
        },
        PricingTraceStep {
            stage: "total".to_owned(),
            detail: if is_over_limit {
                format!("over {} limit, manual quote required", rules.max_perimeter())
            } else {
                "tier + surcharges".to_owned()
            },
            amount: price.total,
        },
    ];

    info!(
        event_name = "pricing.quote_computed",
        product_id = %product_id,
        perimeter,
        flap_count = request.flap_count.get(),
        ceiling = request.installation_is_ceiling,
        price = %price.total,
        is_over_limit,
        "special product priced"
    );

    Ok(PriceQuote {
        product_id,
        price_in_reference_currency: price.total,
        tier_used: Some(TierUsed { max_perimeter: price.tier.max_perimeter, base_price: price.base }),
        is_over_limit,
        trace,
    })
}

pub fn price_generic(product: &Product, request: &DimensionRequest) -> Result<PriceQuote, DomainError> {
    let price = price_for_custom(
        product,
        &request.dimensions,
        request.flap_count,
        request.installation_is_ceiling,
    )?;
    Ok(catalog_quote(product.id.clone(), price, "perimeter_tier"))
}

fn catalog_quote(product_id: ProductId, price: CatalogPrice, stage: &str) -> PriceQuote {
    let mut trace = vec![PricingTraceStep {
        stage: stage.to_owned(),
        detail: match &price.tier {
            Some(tier) => format!("perimeter tier <= {}", tier.max_perimeter),
            None => "catalog price".to_owned(),
        },
        amount: price.base,
    }];
    if price.double_door_surcharge > Decimal::ZERO {
        trace.push(PricingTraceStep {
            stage: "double_door_surcharge".to_owned(),
            detail: "tier double-door addend".to_owned(),
            amount: price.double_door_surcharge,
        });
    }
    if price.ceiling_surcharge > Decimal::ZERO {
        trace.push(PricingTraceStep {
            stage: "ceiling_surcharge".to_owned(),
            detail: "ceiling installation".to_owned(),
            amount: price.ceiling_surcharge,
        });
    }

    info!(
        event_name = "pricing.catalog_priced",
        product_id = %product_id,
        price = %price.total,
        is_over_limit = price.is_over_limit,
        "catalog product priced"
    );

    PriceQuote {
        product_id,
        price_in_reference_currency: price.total,
        tier_used: price
            .tier
            .map(|tier| TierUsed { max_perimeter: tier.max_perimeter, base_price: tier.price }),
        is_over_limit: price.is_over_limit,
        trace,
    }
}
