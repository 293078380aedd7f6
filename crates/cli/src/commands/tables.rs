use hatchquote_core::cpq::rules::{ProductRuleSet, CEILING_SURCHARGE_USD};
use hatchquote_core::domain::product::ProductId;
use serde::Serialize;

use super::{to_data, CommandResult, EXIT_VALIDATION};

#[derive(Debug, Serialize)]
struct RuleTable {
    product_id: &'static str,
    rule_set: ProductRuleSet,
    max_perimeter: u32,
    ceiling_surcharge_usd: u32,
    tiers: Vec<TierRow>,
    two_flap_ladder: Vec<LadderRow>,
}

#[derive(Debug, Serialize)]
struct TierRow {
    max_perimeter: u32,
    price_usd: u32,
    allowed_flaps: Vec<u8>,
}

#[derive(Debug, Serialize)]
struct LadderRow {
    min_perimeter: u32,
    max_perimeter: u32,
    percent: u32,
}

pub fn run(product: Option<&str>) -> CommandResult {
    let selected: Vec<ProductRuleSet> = match product {
        Some(raw) => match ProductRuleSet::for_product(&ProductId::from(raw.trim())) {
            Some(rules) => vec![rules],
            None => {
                return CommandResult::failure(
                    "tables",
                    "unknown_product",
                    format!("`{raw}` has no built-in rule table"),
                    EXIT_VALIDATION,
                );
            }
        },
        None => ProductRuleSet::ALL.to_vec(),
    };

    let tables: Vec<RuleTable> = selected.into_iter().map(rule_table).collect();
    let message = format!("{} rule table(s), prices in USD", tables.len());
    CommandResult::success_with_data("tables", message, to_data(&tables))
}

fn rule_table(rules: ProductRuleSet) -> RuleTable {
    RuleTable {
        product_id: rules.product_id(),
        rule_set: rules,
        max_perimeter: rules.max_perimeter(),
        ceiling_surcharge_usd: CEILING_SURCHARGE_USD,
        tiers: rules
            .tiers()
            .iter()
            .map(|tier| TierRow {
                max_perimeter: tier.max_perimeter,
                price_usd: tier.price_usd,
                allowed_flaps: tier.allowed_flaps.iter().map(u8::from).collect(),
            })
            .collect(),
        two_flap_ladder: rules
            .two_flap_ladder()
            .iter()
            .map(|band| LadderRow {
                min_perimeter: band.min_perimeter,
                max_perimeter: band.max_perimeter,
                percent: band.percent,
            })
            .collect(),
    }
}
