use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cpq::catalog::minimum_dimensions;
use crate::cpq::rules::ProductRuleSet;
use crate::cpq::PricingSubject;
use crate::domain::product::{Dimensions, Product, ProductId};
use crate::domain::quote::{DimensionRequest, FlapCount, FlapSet};
use crate::errors::DomainError;

/// Generic products reject anything more elongated than 2.7 : 1.
pub const GENERIC_MAX_ASPECT_NUMERATOR: u32 = 27;
pub const GENERIC_MAX_ASPECT_DENOMINATOR: u32 = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Adjustment {
    SwappedDimensions { from: Dimensions, to: Dimensions },
    ForcedFlapCount { from: FlapCount, to: FlapCount },
    ResetToMinimum { from: Dimensions, to: Dimensions, aspect_ratio: Decimal },
}

/// Outcome of validating one request; `dimensions` and `flap_count` are the corrected values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlapValidation {
    pub dimensions: Dimensions,
    pub allowed_flaps: FlapSet,
    pub flap_count: FlapCount,
    pub adjustments: Vec<Adjustment>,
    /// Set when the stored dimensions changed and the user must press Calculate again.
    pub recalculation_required: bool,
}

impl FlapValidation {
    fn accept(dimensions: Dimensions, allowed_flaps: FlapSet, flap_count: FlapCount) -> Self {
        Self {
            dimensions,
            allowed_flaps,
            flap_count,
            adjustments: Vec::new(),
            recalculation_required: false,
        }
    }

    pub fn forced_flap_count(&self) -> Option<FlapCount> {
        self.adjustments.iter().find_map(|adjustment| match adjustment {
            Adjustment::ForcedFlapCount { to, .. } => Some(*to),
            _ => None,
        })
    }

    pub fn dimensions_exceeded(&self) -> bool {
        self.adjustments
            .iter()
            .any(|adjustment| matches!(adjustment, Adjustment::ResetToMinimum { .. }))
    }

    pub fn was_swapped(&self) -> bool {
        self.adjustments
            .iter()
            .any(|adjustment| matches!(adjustment, Adjustment::SwappedDimensions { .. }))
    }

    fn force_flaps_into(&mut self, allowed: FlapSet) {
        self.allowed_flaps = allowed;
        if allowed.contains(self.flap_count) {
            return;
        }
        if let Some(forced) = allowed.first() {
            self.adjustments.push(Adjustment::ForcedFlapCount { from: self.flap_count, to: forced });
            self.flap_count = forced;
        }
    }
}

pub trait ConstraintEngine: Send + Sync {
    fn validate(
        &self,
        subject: PricingSubject<'_>,
        request: &DimensionRequest,
    ) -> Result<FlapValidation, DomainError>;
}

#[derive(Default)]
pub struct DeterministicConstraintEngine;

impl ConstraintEngine for DeterministicConstraintEngine {
    fn validate(
        &self,
        subject: PricingSubject<'_>,
        request: &DimensionRequest,
    ) -> Result<FlapValidation, DomainError> {
        request.dimensions.check_bounds()?;
        match subject {
            PricingSubject::Special(rules) => validate_special(rules, request),
            PricingSubject::Generic(product) => validate_generic(product, request),
        }
    }
}

pub fn validate_special(
    rules: ProductRuleSet,
    request: &DimensionRequest,
) -> Result<FlapValidation, DomainError> {
    let product_id = ProductId(rules.product_id().to_owned());
    let mut dimensions = request.dimensions;
    let mut adjustments = Vec::new();
    let mut recalculation_required = false;

    if rules.requires_swap(&dimensions) {
        let swapped = dimensions.swapped();
        debug!(
            event_name = "constraints.dimensions_swapped",
            product_id = %product_id,
            from = %dimensions,
            to = %swapped,
            "re-oriented panel before flap checks"
        );
        adjustments.push(Adjustment::SwappedDimensions { from: dimensions, to: swapped });
        dimensions = swapped;
        recalculation_required = true;
    }

    if rules.geometrically_blocked(&dimensions).contains(request.flap_count) {
        return Err(DomainError::GeometricallyInfeasible {
            product_id,
            dimensions,
            flap_count: request.flap_count,
        });
    }

    let allowed = rules.allowed_flaps(&dimensions);
    if allowed.is_empty() {
        return Err(DomainError::GeometricallyInfeasible {
            product_id,
            dimensions,
            flap_count: request.flap_count,
        });
    }

    let mut validation = FlapValidation::accept(dimensions, allowed, request.flap_count);
    validation.adjustments = adjustments;
    validation.recalculation_required = recalculation_required;
    validation.force_flaps_into(allowed);
    Ok(validation)
}

pub fn validate_generic(
    product: &Product,
    request: &DimensionRequest,
) -> Result<FlapValidation, DomainError> {
    let minimum = minimum_dimensions(product);
    let requested = request.dimensions;

    if !requested.fits_within_minimum(&minimum) {
        return Err(DomainError::BelowMinimumSize { requested, minimum });
    }

    let mut validation = FlapValidation::accept(requested, FlapSet::EMPTY, request.flap_count);

    if exceeds_generic_aspect(&requested) {
        let aspect_ratio = requested.aspect_ratio().unwrap_or(Decimal::ZERO);
        debug!(
            event_name = "constraints.dimensions_exceeded",
            product_id = %product.id,
            requested = %requested,
            reset_to = %minimum,
            "aspect ratio above generic cap, resetting to minimum size"
        );
        validation.adjustments.push(Adjustment::ResetToMinimum {
            from: requested,
            to: minimum,
            aspect_ratio,
        });
        validation.dimensions = minimum;
    }

    let allowed = generic_allowed_flaps(product, validation.dimensions.perimeter());
    validation.force_flaps_into(allowed);
    Ok(validation)
}

/// Double-leaf option comes from the matched perimeter tier; products priced only by
/// discrete sizes offer one or two leaves.
pub fn generic_allowed_flaps(product: &Product, perimeter: u32) -> FlapSet {
    match product.perimeter_tier(perimeter) {
        Some(tier) if tier.has_double_door_option => FlapSet::ONE_OR_TWO,
        Some(_) => FlapSet::ONE,
        None => FlapSet::ONE_OR_TWO,
    }
}

fn exceeds_generic_aspect(dimensions: &Dimensions) -> bool {
    let long = u64::from(dimensions.width.max(dimensions.height));
    let short = u64::from(dimensions.width.min(dimensions.height));
    u64::from(GENERIC_MAX_ASPECT_DENOMINATOR) * long
        > u64::from(GENERIC_MAX_ASPECT_NUMERATOR) * short
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::{
        validate_generic, validate_special, Adjustment, ConstraintEngine,
        DeterministicConstraintEngine,
    };
    use crate::cpq::rules::ProductRuleSet;
    use crate::cpq::PricingSubject;
    use crate::domain::product::{Dimensions, PerimeterPriceTier, Product, ProductId};
    use crate::domain::quote::{DimensionRequest, FlapCount, FlapSet};
    use crate::errors::DomainError;

    fn generic_product(double_door_up_to: u32) -> Product {
        let tier = |max_perimeter: u32, price: rust_decimal::Decimal| PerimeterPriceTier {
            max_perimeter,
            price,
            has_double_door_option: max_perimeter <= double_door_up_to && max_perimeter > 200,
            has_installation_type_option: true,
            double_door_surcharge: Some(dec!(12)),
            ceiling_surcharge: None,
            example_dimensions: None,
        };
        Product {
            id: ProductId("6700aa00f6edd352f8920a01".to_owned()),
            name: "Plastic hatch".to_owned(),
            category: "plastic".to_owned(),
            base_price: dec!(18),
            sizes: Vec::new(),
            perimeter_pricing: vec![tier(200, dec!(18)), tier(400, dec!(32)), tier(800, dec!(60))],
            minimum_dimensions: None,
        }
    }

    #[test]
    fn selected_flaps_outside_allowed_set_are_forced_to_first_legal() {
        let request = DimensionRequest::new(30, 30, FlapCount::Two);
        let validation =
            validate_special(ProductRuleSet::CompactPanel, &request).expect("valid geometry");

        assert_eq!(validation.allowed_flaps, FlapSet::ONE);
        assert_eq!(validation.flap_count, FlapCount::One);
        assert_eq!(validation.forced_flap_count(), Some(FlapCount::One));
        assert!(!validation.recalculation_required);
    }

    #[test]
    fn elongated_steel_panel_is_forced_to_two_flaps() {
        let request = DimensionRequest::new(60, 100, FlapCount::One);
        let validation = validate_special(ProductRuleSet::SteelPanel, &request).expect("valid");
        assert_eq!(validation.allowed_flaps, FlapSet::TWO);
        assert_eq!(validation.flap_count, FlapCount::Two);
    }

    #[test]
    fn legal_selection_is_left_untouched() {
        let request = DimensionRequest::new(50, 50, FlapCount::Two);
        let validation = validate_special(ProductRuleSet::SteelPanel, &request).expect("valid");
        assert!(validation.adjustments.is_empty());
        assert_eq!(validation.flap_count, FlapCount::Two);
    }

    #[test]
    fn floor_hatch_swaps_tall_panels_and_requires_recalculation() {
        let request = DimensionRequest::new(200, 270, FlapCount::Two);
        let validation = validate_special(ProductRuleSet::FloorHatch, &request).expect("valid");

        assert_eq!(validation.dimensions, Dimensions::new(270, 200));
        assert!(validation.was_swapped());
        assert!(validation.recalculation_required);
        assert_eq!(validation.allowed_flaps, FlapSet::TWO);
    }

    #[test]
    fn floor_hatch_shallow_two_flap_request_is_blocking() {
        let request = DimensionRequest::new(160, 80, FlapCount::Two);
        let error = validate_special(ProductRuleSet::FloorHatch, &request)
            .expect_err("two flaps cannot fit a shallow panel");
        assert!(matches!(error, DomainError::GeometricallyInfeasible { .. }));

        let single = DimensionRequest::new(160, 80, FlapCount::One);
        assert!(validate_special(ProductRuleSet::FloorHatch, &single).is_ok());
    }

    #[test]
    fn floor_hatch_large_shallow_panel_has_no_valid_configuration() {
        let request = DimensionRequest::new(250, 100, FlapCount::One);
        let error = validate_special(ProductRuleSet::FloorHatch, &request)
            .expect_err("empty allowed set");
        assert!(error.requires_manual_quote());
    }

    #[test]
    fn huge_or_zero_sides_are_rejected_before_any_rule_runs() {
        let engine = DeterministicConstraintEngine;
        let product = generic_product(800);
        for (width, height) in [(3_000_000_000, 10), (2_147_483_600, 48), (0, 50)] {
            let request = DimensionRequest::new(width, height, FlapCount::One);
            for subject in
                [PricingSubject::Special(ProductRuleSet::FloorHatch), PricingSubject::Generic(&product)]
            {
                let error = engine.validate(subject, &request).expect_err("out of range");
                assert!(matches!(error, DomainError::DimensionsOutOfRange { .. }));
            }
        }
    }

    #[test]
    fn ratio_checks_do_not_overflow_on_wide_inputs() {
        let wide = DimensionRequest::new(u32::MAX, 1, FlapCount::Two);
        let validation = validate_special(ProductRuleSet::SteelPanel, &wide).expect("still rules");
        assert_eq!(validation.allowed_flaps, FlapSet::TWO);
    }

    #[test]
    fn generic_request_below_minimum_is_rejected_without_correction() {
        let product = generic_product(800);
        let request = DimensionRequest::new(15, 40, FlapCount::One);
        let error = validate_generic(&product, &request).expect_err("below 20x30");
        assert_eq!(
            error,
            DomainError::BelowMinimumSize {
                requested: Dimensions::new(15, 40),
                minimum: Dimensions::new(20, 30),
            }
        );
    }

    #[test]
    fn generic_aspect_ratio_above_cap_resets_to_minimum() {
        let product = generic_product(800);
        let request = DimensionRequest::new(50, 250, FlapCount::One);
        let validation = validate_generic(&product, &request).expect("reset, not rejected");

        assert!(validation.dimensions_exceeded());
        assert_eq!(validation.dimensions, Dimensions::new(20, 30));
        assert!(matches!(
            validation.adjustments.as_slice(),
            [Adjustment::ResetToMinimum { aspect_ratio, .. }] if *aspect_ratio == dec!(5)
        ));
    }

    #[test]
    fn generic_ratio_of_exactly_two_point_seven_is_accepted() {
        let product = generic_product(800);
        let request = DimensionRequest::new(100, 270, FlapCount::One);
        let validation = validate_generic(&product, &request).expect("valid");
        assert!(!validation.dimensions_exceeded());
    }

    #[test]
    fn generic_double_door_follows_tier_option() {
        let product = generic_product(400);
        let small = validate_generic(&product, &DimensionRequest::new(40, 40, FlapCount::Two))
            .expect("valid");
        assert_eq!(small.flap_count, FlapCount::One);

        let medium = validate_generic(&product, &DimensionRequest::new(80, 80, FlapCount::Two))
            .expect("valid");
        assert_eq!(medium.flap_count, FlapCount::Two);
        assert_eq!(medium.allowed_flaps, FlapSet::ONE_OR_TWO);
    }
}
