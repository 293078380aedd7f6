//! Perimeter-tiered rule tables for the special product line.
//!
//! Each special product owns an ascending tier table, a two-flap surcharge
//! ladder and a hard perimeter ceiling. Tier lookup never fails: a perimeter
//! above the last row prices at the last row, and `is_over_limit` reports the
//! ceiling breach separately so the request can go to manual quoting.
//!
//! Geometry checks use integer cross-multiplication (`10 * long > 14 * short`
//! for a 1.4 ratio) so table boundaries are exact.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::{Dimensions, ProductId};
use crate::domain::quote::{FlapCount, FlapSet};

/// Flat ceiling-installation addend in reference currency.
pub const CEILING_SURCHARGE_USD: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PriceTier {
    pub max_perimeter: u32,
    pub price_usd: u32,
    pub allowed_flaps: FlapSet,
}

impl PriceTier {
    pub fn price(&self) -> Decimal {
        Decimal::from(self.price_usd)
    }
}

/// Two-flap surcharge percentage for `min_perimeter..=max_perimeter`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SurchargeBand {
    pub min_perimeter: u32,
    pub max_perimeter: u32,
    pub percent: u32,
}

impl SurchargeBand {
    fn covers(&self, perimeter: u32) -> bool {
        (self.min_perimeter..=self.max_perimeter).contains(&perimeter)
    }
}

const fn tier(max_perimeter: u32, price_usd: u32, allowed_flaps: FlapSet) -> PriceTier {
    PriceTier { max_perimeter, price_usd, allowed_flaps }
}

const fn band(min_perimeter: u32, max_perimeter: u32, percent: u32) -> SurchargeBand {
    SurchargeBand { min_perimeter, max_perimeter, percent }
}

const ONE: FlapSet = FlapSet::ONE;
const TWO: FlapSet = FlapSet::TWO;
const BOTH: FlapSet = FlapSet::ONE_OR_TWO;

const STEEL_PANEL_TIERS: [PriceTier; 8] = [
    tier(120, 45, ONE),
    tier(160, 55, ONE),
    tier(200, 70, BOTH),
    tier(240, 85, BOTH),
    tier(280, 99, BOTH),
    tier(400, 145, BOTH),
    tier(600, 189, BOTH),
    tier(720, 229, TWO),
];

const STEEL_PANEL_LADDER: [SurchargeBand; 3] =
    [band(161, 200, 65), band(201, 240, 60), band(241, 280, 55)];

const ALUMINIUM_PANEL_TIERS: [PriceTier; 7] = [
    tier(160, 40, ONE),
    tier(240, 60, BOTH),
    tier(320, 80, BOTH),
    tier(400, 105, BOTH),
    tier(480, 130, BOTH),
    tier(560, 155, BOTH),
    tier(640, 180, TWO),
];

const ALUMINIUM_PANEL_LADDER: [SurchargeBand; 3] =
    [band(161, 240, 50), band(241, 400, 40), band(401, 560, 35)];

const FLOOR_HATCH_TIERS: [PriceTier; 5] = [
    tier(400, 150, ONE),
    tier(480, 195, BOTH),
    tier(560, 235, TWO),
    tier(640, 280, TWO),
    tier(720, 325, TWO),
];

const FLOOR_HATCH_LADDER: [SurchargeBand; 1] = [band(401, 480, 40)];

const COMPACT_PANEL_TIERS: [PriceTier; 6] = [
    tier(120, 30, ONE),
    tier(160, 38, ONE),
    tier(200, 52, BOTH),
    tier(240, 60, BOTH),
    tier(280, 68, BOTH),
    tier(360, 85, TWO),
];

const COMPACT_PANEL_LADDER: [SurchargeBand; 3] =
    [band(161, 200, 65), band(201, 240, 60), band(241, 280, 55)];

const TIERED_PANEL_TIERS: [PriceTier; 7] = [
    tier(120, 35, ONE),
    tier(160, 40, ONE),
    tier(200, 45, BOTH),
    tier(240, 50, BOTH),
    tier(280, 55, BOTH),
    tier(360, 90, BOTH),
    tier(600, 95, BOTH),
];

const TIERED_PANEL_LADDER: [SurchargeBand; 8] = [
    band(161, 200, 70),
    band(201, 240, 67),
    band(241, 280, 51),
    band(281, 320, 42),
    band(321, 360, 31),
    band(361, 400, 20),
    band(401, 480, 10),
    band(481, u32::MAX, 0),
];

/// One variant per special product id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductRuleSet {
    /// Single/double threshold at 160/600 with a 1.4 aspect trigger.
    SteelPanel,
    /// 160/560 with a 1.5 aspect trigger.
    AluminiumPanel,
    /// 400/480/720 with the height-to-width constraint and orientation swap.
    FloorHatch,
    /// 160/280.
    CompactPanel,
    /// Flap legality read straight from the tier table.
    TieredPanel,
}

/// Result of applying a rule set's price table and surcharges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RulePrice {
    pub tier: PriceTier,
    pub base: Decimal,
    pub two_flap_percent: u32,
    pub two_flap_surcharge: Decimal,
    pub ceiling_surcharge: Decimal,
    pub total: Decimal,
}

impl ProductRuleSet {
    pub const ALL: [Self; 5] = [
        Self::SteelPanel,
        Self::AluminiumPanel,
        Self::FloorHatch,
        Self::CompactPanel,
        Self::TieredPanel,
    ];

    pub fn for_product(product_id: &ProductId) -> Option<Self> {
        Self::ALL.into_iter().find(|rules| rules.product_id() == product_id.as_str())
    }

    pub const fn product_id(self) -> &'static str {
        match self {
            Self::SteelPanel => "68f35fe2f6edd352f8920e07",
            Self::AluminiumPanel => "68f36045f6edd352f8920e0b",
            Self::FloorHatch => "68f36177f6edd352f8920e1f",
            Self::CompactPanel => "68f36203f6edd352f8920e23",
            Self::TieredPanel => "68f362a9f6edd352f8920e27",
        }
    }

    pub fn tiers(self) -> &'static [PriceTier] {
        match self {
            Self::SteelPanel => &STEEL_PANEL_TIERS,
            Self::AluminiumPanel => &ALUMINIUM_PANEL_TIERS,
            Self::FloorHatch => &FLOOR_HATCH_TIERS,
            Self::CompactPanel => &COMPACT_PANEL_TIERS,
            Self::TieredPanel => &TIERED_PANEL_TIERS,
        }
    }

    pub fn two_flap_ladder(self) -> &'static [SurchargeBand] {
        match self {
            Self::SteelPanel => &STEEL_PANEL_LADDER,
            Self::AluminiumPanel => &ALUMINIUM_PANEL_LADDER,
            Self::FloorHatch => &FLOOR_HATCH_LADDER,
            Self::CompactPanel => &COMPACT_PANEL_LADDER,
            Self::TieredPanel => &TIERED_PANEL_LADDER,
        }
    }

    /// Largest perimeter priced automatically; beyond it the quote is flagged over limit.
    pub const fn max_perimeter(self) -> u32 {
        match self {
            Self::SteelPanel => 720,
            Self::AluminiumPanel => 640,
            Self::FloorHatch => 720,
            Self::CompactPanel => 360,
            Self::TieredPanel => 600,
        }
    }

    /// First tier with `max_perimeter >= perimeter`, else the last tier.
    pub fn tier_for(self, perimeter: u32) -> PriceTier {
        let tiers = self.tiers();
        tiers
            .iter()
            .find(|tier| tier.max_perimeter >= perimeter)
            .or_else(|| tiers.last())
            .copied()
            .unwrap_or(tier(0, 0, FlapSet::EMPTY))
    }

    /// Zero outside the ladder's bands.
    pub fn two_flap_percent(self, perimeter: u32) -> u32 {
        self.two_flap_ladder()
            .iter()
            .find(|band| band.covers(perimeter))
            .map(|band| band.percent)
            .unwrap_or(0)
    }

    pub fn is_over_limit(self, perimeter: u32) -> bool {
        perimeter > self.max_perimeter()
    }

    /// Only the floor hatch is re-oriented: a panel more than 1.3× taller than wide is swapped.
    pub fn requires_swap(self, dimensions: &Dimensions) -> bool {
        matches!(self, Self::FloorHatch)
            && 10 * u64::from(dimensions.height) > 13 * u64::from(dimensions.width)
    }

    /// Legal flap counts for the given geometry, re-derived per product.
    pub fn allowed_flaps(self, dimensions: &Dimensions) -> FlapSet {
        let perimeter = dimensions.perimeter();
        match self {
            Self::SteelPanel => match perimeter {
                0..=160 => FlapSet::ONE,
                161..=600 if exceeds_ratio(dimensions, 14, 10) => FlapSet::TWO,
                161..=600 => FlapSet::ONE_OR_TWO,
                _ => FlapSet::TWO,
            },
            Self::AluminiumPanel => match perimeter {
                0..=160 => FlapSet::ONE,
                _ if exceeds_ratio(dimensions, 3, 2) => FlapSet::TWO,
                161..=560 => FlapSet::ONE_OR_TWO,
                _ => FlapSet::TWO,
            },
            Self::FloorHatch => {
                let too_shallow = is_too_shallow(dimensions);
                match perimeter {
                    0..=400 => FlapSet::ONE,
                    401..=480 if too_shallow => FlapSet::ONE,
                    401..=480 => FlapSet::ONE_OR_TWO,
                    _ if too_shallow => FlapSet::EMPTY,
                    _ => FlapSet::TWO,
                }
            }
            Self::CompactPanel => match perimeter {
                0..=160 => FlapSet::ONE,
                161..=280 => FlapSet::ONE_OR_TWO,
                _ => FlapSet::TWO,
            },
            Self::TieredPanel => self.tier_for(perimeter).allowed_flaps,
        }
    }

    /// Flap counts ruled out by geometry rather than by the perimeter band.
    /// Requesting one of these is a blocking error, never an auto-correction.
    pub fn geometrically_blocked(self, dimensions: &Dimensions) -> FlapSet {
        match self {
            Self::FloorHatch if dimensions.perimeter() > 400 && is_too_shallow(dimensions) => {
                FlapSet::TWO
            }
            _ => FlapSet::EMPTY,
        }
    }

    /// `None` when `flaps` is illegal for this geometry.
    pub fn price(
        self,
        dimensions: &Dimensions,
        flaps: FlapCount,
        installation_is_ceiling: bool,
    ) -> Option<RulePrice> {
        if !self.allowed_flaps(dimensions).contains(flaps) {
            return None;
        }

        let perimeter = dimensions.perimeter();
        let tier = self.tier_for(perimeter);
        let base = tier.price();

        let two_flap_percent =
            if flaps == FlapCount::Two { self.two_flap_percent(perimeter) } else { 0 };
        let two_flap_surcharge = base * Decimal::from(two_flap_percent) / Decimal::ONE_HUNDRED;

        let ceiling_surcharge = if installation_is_ceiling {
            Decimal::from(CEILING_SURCHARGE_USD)
        } else {
            Decimal::ZERO
        };

        Some(RulePrice {
            tier,
            base,
            two_flap_percent,
            two_flap_surcharge,
            ceiling_surcharge,
            total: base + two_flap_surcharge + ceiling_surcharge,
        })
    }
}

/// `max / min > numerator / denominator`.
fn exceeds_ratio(dimensions: &Dimensions, numerator: u32, denominator: u32) -> bool {
    let long = u64::from(dimensions.width.max(dimensions.height));
    let short = u64::from(dimensions.width.min(dimensions.height));
    u64::from(denominator) * long > u64::from(numerator) * short
}

/// `height < width * 0.55`.
fn is_too_shallow(dimensions: &Dimensions) -> bool {
    100 * u64::from(dimensions.height) < 55 * u64::from(dimensions.width)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    use super::ProductRuleSet;
    use crate::domain::product::{Dimensions, ProductId};
    use crate::domain::quote::{FlapCount, FlapSet};

    fn square(perimeter: u32) -> Dimensions {
        Dimensions::new(perimeter / 4, perimeter / 4)
    }

    #[test]
    fn tables_are_strictly_ascending() {
        for rules in ProductRuleSet::ALL {
            let tiers = rules.tiers();
            assert!(!tiers.is_empty(), "{rules:?} has no tiers");
            assert!(
                tiers.windows(2).all(|pair| pair[0].max_perimeter < pair[1].max_perimeter),
                "{rules:?} tiers are not ascending"
            );
        }
    }

    #[test]
    fn product_ids_resolve_to_their_rule_sets() {
        for rules in ProductRuleSet::ALL {
            let id = ProductId(rules.product_id().to_owned());
            assert_eq!(ProductRuleSet::for_product(&id), Some(rules));
        }
        assert_eq!(ProductRuleSet::for_product(&ProductId("generic".to_owned())), None);
    }

    #[test]
    fn tier_boundary_is_inclusive() {
        let rules = ProductRuleSet::TieredPanel;
        assert_eq!(rules.tier_for(120).price_usd, 35);
        assert_eq!(rules.tier_for(121).price_usd, 40);
        assert_eq!(rules.tier_for(600).price_usd, 95);
        assert_eq!(rules.tier_for(5_000).price_usd, 95);
    }

    #[test]
    fn tiered_panel_boundary_prices_match_table() {
        let rules = ProductRuleSet::TieredPanel;
        let expected =
            [(120, 35), (160, 40), (200, 45), (240, 50), (280, 55), (360, 90), (600, 95)];
        for (perimeter, price) in expected {
            assert_eq!(rules.tier_for(perimeter).price_usd, price, "perimeter {perimeter}");
        }
    }

    #[test]
    fn steel_panel_flaps_follow_perimeter_and_aspect() {
        let rules = ProductRuleSet::SteelPanel;
        assert_eq!(rules.allowed_flaps(&Dimensions::new(40, 40)), FlapSet::ONE);
        assert_eq!(rules.allowed_flaps(&Dimensions::new(45, 45)), FlapSet::ONE_OR_TWO);
        assert_eq!(rules.allowed_flaps(&Dimensions::new(60, 90)), FlapSet::TWO);
        assert_eq!(rules.allowed_flaps(&Dimensions::new(50, 70)), FlapSet::ONE_OR_TWO);
        assert_eq!(rules.allowed_flaps(&Dimensions::new(160, 160)), FlapSet::TWO);
    }

    #[test]
    fn aluminium_panel_aspect_rule_skips_smallest_band() {
        let rules = ProductRuleSet::AluminiumPanel;
        assert_eq!(rules.allowed_flaps(&Dimensions::new(20, 60)), FlapSet::ONE);
        assert_eq!(rules.allowed_flaps(&Dimensions::new(40, 80)), FlapSet::TWO);
        assert_eq!(rules.allowed_flaps(&Dimensions::new(60, 90)), FlapSet::ONE_OR_TWO);
        assert_eq!(rules.allowed_flaps(&Dimensions::new(150, 150)), FlapSet::TWO);
    }

    #[test]
    fn floor_hatch_height_constraint_and_swap() {
        let rules = ProductRuleSet::FloorHatch;
        assert_eq!(rules.allowed_flaps(&Dimensions::new(110, 110)), FlapSet::ONE_OR_TWO);
        assert_eq!(rules.allowed_flaps(&Dimensions::new(160, 80)), FlapSet::ONE);
        assert_eq!(rules.geometrically_blocked(&Dimensions::new(160, 80)), FlapSet::TWO);
        assert_eq!(rules.allowed_flaps(&Dimensions::new(250, 100)), FlapSet::EMPTY);
        assert_eq!(rules.allowed_flaps(&Dimensions::new(250, 200)), FlapSet::TWO);

        assert!(rules.requires_swap(&Dimensions::new(200, 261)));
        assert!(!rules.requires_swap(&Dimensions::new(200, 260)));
        assert!(!ProductRuleSet::SteelPanel.requires_swap(&Dimensions::new(100, 300)));
    }

    #[test]
    fn compact_panel_thresholds() {
        let rules = ProductRuleSet::CompactPanel;
        assert_eq!(rules.allowed_flaps(&square(160)), FlapSet::ONE);
        assert_eq!(rules.allowed_flaps(&square(200)), FlapSet::ONE_OR_TWO);
        assert_eq!(rules.allowed_flaps(&square(280)), FlapSet::ONE_OR_TWO);
        assert_eq!(rules.allowed_flaps(&square(320)), FlapSet::TWO);
    }

    #[test]
    fn steel_panel_surcharges_stack_with_ceiling_addend() {
        // 40 x 50 -> perimeter 180, tier <=200 at 70 USD, 65% two-flap surcharge
        let price = ProductRuleSet::SteelPanel
            .price(&Dimensions::new(40, 50), FlapCount::Two, true)
            .expect("two flaps are legal at perimeter 180");
        assert_eq!(price.base, dec!(70));
        assert_eq!(price.two_flap_percent, 65);
        assert_eq!(price.total, dec!(70) * dec!(1.65) + dec!(3));
    }

    #[test]
    fn steel_panel_two_flaps_above_280_carry_no_surcharge() {
        let price = ProductRuleSet::SteelPanel
            .price(&Dimensions::new(80, 80), FlapCount::Two, false)
            .expect("legal");
        assert_eq!(price.two_flap_percent, 0);
        assert_eq!(price.total, dec!(145));
    }

    #[test]
    fn tiered_panel_ladder_has_eight_bands_above_160() {
        let rules = ProductRuleSet::TieredPanel;
        let expected = [
            (180, 70),
            (220, 67),
            (260, 51),
            (300, 42),
            (340, 31),
            (380, 20),
            (440, 10),
            (520, 0),
            (160, 0),
        ];
        for (perimeter, percent) in expected {
            assert_eq!(rules.two_flap_percent(perimeter), percent, "perimeter {perimeter}");
        }
    }

    #[test]
    fn illegal_flaps_yield_no_price() {
        assert!(ProductRuleSet::CompactPanel
            .price(&Dimensions::new(30, 30), FlapCount::Two, false)
            .is_none());
        assert!(ProductRuleSet::FloorHatch
            .price(&Dimensions::new(250, 100), FlapCount::Two, false)
            .is_none());
        assert!(ProductRuleSet::TieredPanel
            .price(&Dimensions::new(50, 50), FlapCount::Three, false)
            .is_none());
    }

    proptest! {
        #[test]
        fn pricing_is_idempotent(
            width in 10u32..400,
            height in 10u32..400,
            two in any::<bool>(),
            ceiling in any::<bool>(),
        ) {
            let flaps = if two { FlapCount::Two } else { FlapCount::One };
            let dims = Dimensions::new(width, height);
            for rules in ProductRuleSet::ALL {
                prop_assert_eq!(rules.price(&dims, flaps, ceiling), rules.price(&dims, flaps, ceiling));
            }
        }

        #[test]
        fn square_panels_never_loosen_above_their_two_flap_threshold(side in 10u32..200) {
            // Past the upper threshold only two flaps remain for every rule set except the tiered one.
            let dims = Dimensions::new(side, side);
            let bigger = Dimensions::new(side + 1, side + 1);
            let rule_sets =
                [ProductRuleSet::SteelPanel, ProductRuleSet::AluminiumPanel, ProductRuleSet::CompactPanel];
            for rules in rule_sets {
                let before = rules.allowed_flaps(&dims);
                let after = rules.allowed_flaps(&bigger);
                if before == FlapSet::TWO {
                    prop_assert_eq!(after, FlapSet::TWO);
                }
            }
        }

        #[test]
        fn smallest_band_only_ever_allows_one_flap(width in 1u32..79, height in 1u32..79) {
            let dims = Dimensions::new(width, height);
            prop_assume!(dims.perimeter() <= 160);
            for rules in ProductRuleSet::ALL {
                prop_assert!(rules.allowed_flaps(&dims).is_subset_of(&FlapSet::ONE));
            }
        }
    }
}
