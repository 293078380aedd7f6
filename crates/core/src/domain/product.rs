use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Longest side accepted for any panel, in centimetres.
pub const MAX_SIDE_CM: u32 = 1_000;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Width × height in whole centimetres.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Saturates instead of wrapping; bounded inputs never get near the limit.
    pub fn perimeter(&self) -> u32 {
        self.width.saturating_add(self.height).saturating_mul(2)
    }

    /// Rejects zero sides and sides longer than [`MAX_SIDE_CM`].
    pub fn check_bounds(&self) -> Result<(), DomainError> {
        let in_range = |side: u32| (1..=MAX_SIDE_CM).contains(&side);
        if in_range(self.width) && in_range(self.height) {
            return Ok(());
        }
        Err(DomainError::DimensionsOutOfRange { requested: *self, max_side: MAX_SIDE_CM })
    }

    /// `max(w, h) / min(w, h)`. A zero side yields `None`.
    pub fn aspect_ratio(&self) -> Option<Decimal> {
        let long = self.width.max(self.height);
        let short = self.width.min(self.height);
        if short == 0 {
            return None;
        }
        Some(Decimal::from(long) / Decimal::from(short))
    }

    pub fn swapped(&self) -> Self {
        Self { width: self.height, height: self.width }
    }

    pub fn fits_within_minimum(&self, minimum: &Dimensions) -> bool {
        self.width >= minimum.width && self.height >= minimum.height
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeOption {
    pub dimensions: Dimensions,
    pub price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerimeterPriceTier {
    pub max_perimeter: u32,
    pub price: Decimal,
    #[serde(default)]
    pub has_double_door_option: bool,
    #[serde(default)]
    pub has_installation_type_option: bool,
    #[serde(default)]
    pub double_door_surcharge: Option<Decimal>,
    #[serde(default)]
    pub ceiling_surcharge: Option<Decimal>,
    #[serde(default)]
    pub example_dimensions: Option<Dimensions>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub base_price: Decimal,
    #[serde(default)]
    pub sizes: Vec<SizeOption>,
    /// Ascending by `max_perimeter`.
    #[serde(default)]
    pub perimeter_pricing: Vec<PerimeterPriceTier>,
    #[serde(default)]
    pub minimum_dimensions: Option<Dimensions>,
}

impl Product {
    pub fn size(&self, index: usize) -> Option<&SizeOption> {
        self.sizes.get(index)
    }

    pub fn size_for(&self, dimensions: &Dimensions) -> Option<&SizeOption> {
        self.sizes.iter().find(|size| &size.dimensions == dimensions)
    }

    /// First tier whose `max_perimeter >= perimeter`, else the highest tier.
    pub fn perimeter_tier(&self, perimeter: u32) -> Option<&PerimeterPriceTier> {
        self.perimeter_pricing
            .iter()
            .find(|tier| tier.max_perimeter >= perimeter)
            .or_else(|| self.perimeter_pricing.last())
    }

    pub fn max_tier_perimeter(&self) -> Option<u32> {
        self.perimeter_pricing.last().map(|tier| tier.max_perimeter)
    }

    pub fn tiers_are_sorted(&self) -> bool {
        self.perimeter_pricing.windows(2).all(|pair| pair[0].max_perimeter < pair[1].max_perimeter)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::{Dimensions, PerimeterPriceTier, Product, ProductId, MAX_SIDE_CM};
    use crate::errors::DomainError;

    fn tier(max_perimeter: u32, price: rust_decimal::Decimal) -> PerimeterPriceTier {
        PerimeterPriceTier {
            max_perimeter,
            price,
            has_double_door_option: false,
            has_installation_type_option: false,
            double_door_surcharge: None,
            ceiling_surcharge: None,
            example_dimensions: None,
        }
    }

    fn product() -> Product {
        Product {
            id: ProductId("generic-1".to_owned()),
            name: "Push-lock hatch".to_owned(),
            category: "push-lock".to_owned(),
            base_price: dec!(20),
            sizes: Vec::new(),
            perimeter_pricing: vec![tier(120, dec!(20)), tier(200, dec!(30)), tier(320, dec!(45))],
            minimum_dimensions: None,
        }
    }

    #[test]
    fn perimeter_and_aspect_ratio_follow_geometry() {
        let dims = Dimensions::new(50, 250);
        assert_eq!(dims.perimeter(), 600);
        assert_eq!(dims.aspect_ratio(), Some(dec!(5)));
        assert_eq!(Dimensions::new(0, 10).aspect_ratio(), None);
    }

    #[test]
    fn perimeter_saturates_for_out_of_range_sides() {
        assert_eq!(Dimensions::new(2_147_483_600, 48).perimeter(), u32::MAX);
        assert_eq!(Dimensions::new(u32::MAX, u32::MAX).perimeter(), u32::MAX);
    }

    #[test]
    fn bounds_reject_zero_and_oversized_sides() {
        assert!(Dimensions::new(1, MAX_SIDE_CM).check_bounds().is_ok());
        for dims in [
            Dimensions::new(0, 40),
            Dimensions::new(40, 0),
            Dimensions::new(MAX_SIDE_CM + 1, 40),
            Dimensions::new(3_000_000_000, 10),
        ] {
            assert_eq!(
                dims.check_bounds(),
                Err(DomainError::DimensionsOutOfRange { requested: dims, max_side: MAX_SIDE_CM })
            );
        }
    }

    #[test]
    fn tier_lookup_is_inclusive_and_falls_back_to_highest() {
        let product = product();
        assert_eq!(product.perimeter_tier(120).map(|t| t.max_perimeter), Some(120));
        assert_eq!(product.perimeter_tier(121).map(|t| t.max_perimeter), Some(200));
        assert_eq!(product.perimeter_tier(999).map(|t| t.max_perimeter), Some(320));
        assert!(product.tiers_are_sorted());
    }
}
