pub mod catalog;
pub mod constraints;
pub mod currency;
pub mod pricing;
pub mod rules;

use serde::Serialize;

use crate::domain::product::{Product, ProductId};
use crate::domain::quote::{DimensionRequest, PriceQuote};
use crate::errors::DomainError;

use self::{
    constraints::{ConstraintEngine, DeterministicConstraintEngine, FlapValidation},
    pricing::{DeterministicPricingEngine, PricingEngine},
    rules::ProductRuleSet,
};

/// What a custom-size request is priced against: one of the hard-coded rule
/// sets, or the catalog data of any other product.
#[derive(Clone, Copy, Debug)]
pub enum PricingSubject<'a> {
    Special(ProductRuleSet),
    Generic(&'a Product),
}

impl<'a> PricingSubject<'a> {
    pub fn of(product: &'a Product) -> Self {
        match ProductRuleSet::for_product(&product.id) {
            Some(rules) => Self::Special(rules),
            None => Self::Generic(product),
        }
    }

    pub fn product_id(&self) -> ProductId {
        match self {
            Self::Special(rules) => ProductId(rules.product_id().to_owned()),
            Self::Generic(product) => product.id.clone(),
        }
    }

    pub fn is_special(&self) -> bool {
        matches!(self, Self::Special(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CpqEvaluation {
    pub validation: FlapValidation,
    /// Absent when the validation re-oriented the panel and a fresh Calculate is due.
    pub quote: Option<PriceQuote>,
}

impl CpqEvaluation {
    pub fn requires_manual_quote(&self) -> bool {
        self.quote.as_ref().is_some_and(|quote| quote.is_over_limit)
    }
}

pub trait CpqRuntime: Send + Sync {
    fn evaluate(
        &self,
        subject: PricingSubject<'_>,
        request: &DimensionRequest,
    ) -> Result<CpqEvaluation, DomainError>;

    fn price_size(
        &self,
        product: &Product,
        size_index: usize,
        installation_is_ceiling: bool,
    ) -> Result<PriceQuote, DomainError>;
}

pub struct DeterministicCpqRuntime<C, P> {
    constraint_engine: C,
    pricing_engine: P,
}

impl<C, P> DeterministicCpqRuntime<C, P> {
    pub fn new(constraint_engine: C, pricing_engine: P) -> Self {
        Self { constraint_engine, pricing_engine }
    }
}

impl Default for DeterministicCpqRuntime<DeterministicConstraintEngine, DeterministicPricingEngine> {
    fn default() -> Self {
        Self::new(DeterministicConstraintEngine, DeterministicPricingEngine)
    }
}

impl<C, P> CpqRuntime for DeterministicCpqRuntime<C, P>
where
    C: ConstraintEngine,
    P: PricingEngine,
{
    fn evaluate(
        &self,
        subject: PricingSubject<'_>,
        request: &DimensionRequest,
    ) -> Result<CpqEvaluation, DomainError> {
        let validation = self.constraint_engine.validate(subject, request)?;
        if validation.recalculation_required {
            return Ok(CpqEvaluation { validation, quote: None });
        }

        let corrected = DimensionRequest {
            dimensions: validation.dimensions,
            flap_count: validation.flap_count,
            quantity: request.quantity,
            installation_is_ceiling: request.installation_is_ceiling,
        };
        let quote = self.pricing_engine.price(subject, &corrected)?;
        Ok(CpqEvaluation { validation, quote: Some(quote) })
    }

    fn price_size(
        &self,
        product: &Product,
        size_index: usize,
        installation_is_ceiling: bool,
    ) -> Result<PriceQuote, DomainError> {
        self.pricing_engine.price_size(product, size_index, installation_is_ceiling)
    }
}
