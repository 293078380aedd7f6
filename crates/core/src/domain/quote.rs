use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::{Dimensions, ProductId};
use crate::errors::DomainError;

/// Number of independently opening leaves on the panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FlapCount {
    One,
    Two,
    Three,
}

impl FlapCount {
    pub const fn get(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
        }
    }

    const fn bit(self) -> u8 {
        1 << (self.get() - 1)
    }
}

impl TryFrom<u8> for FlapCount {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            3 => Ok(Self::Three),
            other => Err(DomainError::UnsupportedFlapCount(other)),
        }
    }
}

impl From<FlapCount> for u8 {
    fn from(value: FlapCount) -> Self {
        value.get()
    }
}

impl std::fmt::Display for FlapCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Ordered set of legal flap counts. Iteration and `first` go from fewest flaps up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlapSet(u8);

impl FlapSet {
    pub const EMPTY: Self = Self(0);
    pub const ONE: Self = Self(0b001);
    pub const TWO: Self = Self(0b010);
    pub const ONE_OR_TWO: Self = Self(0b011);

    pub fn contains(&self, flaps: FlapCount) -> bool {
        self.0 & flaps.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn first(&self) -> Option<FlapCount> {
        self.iter().next()
    }

    pub fn iter(self) -> impl Iterator<Item = FlapCount> {
        [FlapCount::One, FlapCount::Two, FlapCount::Three]
            .into_iter()
            .filter(move |flaps| self.contains(*flaps))
    }

    pub fn is_subset_of(&self, other: &FlapSet) -> bool {
        self.0 & !other.0 == 0
    }
}

impl std::fmt::Display for FlapSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self.iter().map(|flaps| flaps.to_string()).collect();
        write!(f, "{{{}}}", rendered.join(","))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionRequest {
    pub dimensions: Dimensions,
    pub flap_count: FlapCount,
    pub quantity: i32,
    pub installation_is_ceiling: bool,
}

impl DimensionRequest {
    pub fn new(width: u32, height: u32, flap_count: FlapCount) -> Self {
        Self {
            dimensions: Dimensions::new(width, height),
            flap_count,
            quantity: 1,
            installation_is_ceiling: false,
        }
    }

    pub fn with_ceiling(mut self, installation_is_ceiling: bool) -> Self {
        self.installation_is_ceiling = installation_is_ceiling;
        self
    }

    pub fn with_quantity(mut self, quantity: i32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn perimeter(&self) -> u32 {
        self.dimensions.perimeter()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierUsed {
    pub max_perimeter: u32,
    pub base_price: Decimal,
}

/// Reference-currency price for one configured unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub product_id: ProductId,
    pub price_in_reference_currency: Decimal,
    pub tier_used: Option<TierUsed>,
    pub is_over_limit: bool,
    pub trace: Vec<PricingTraceStep>,
}

impl PriceQuote {
    pub fn total(&self, quantity: i32) -> Decimal {
        self.price_in_reference_currency * Decimal::from(quantity.max(0))
    }
}
