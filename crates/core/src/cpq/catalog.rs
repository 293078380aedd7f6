use rust_decimal::Decimal;

use crate::cpq::constraints::generic_allowed_flaps;
use crate::cpq::rules::CEILING_SURCHARGE_USD;
use crate::domain::product::{Dimensions, PerimeterPriceTier, Product, ProductId};
use crate::domain::quote::FlapCount;
use crate::errors::DomainError;

/// Category whose ceiling-mounted units carry the flat ceiling addend.
pub const CEILING_MOUNT_CATEGORY: &str = "ceiling-hatch";

#[derive(Clone, Debug, Default)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    pub fn find(&self, product_id: &ProductId) -> Option<&Product> {
        self.products.iter().find(|product| &product.id == product_id)
    }

    pub fn get(&self, product_id: &ProductId) -> Result<&Product, DomainError> {
        self.find(product_id).ok_or_else(|| DomainError::UnknownProduct(product_id.clone()))
    }

    pub fn by_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Product> + 'a {
        self.products.iter().filter(move |product| product.category == category)
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// Smallest manufacturable opening: product override, else by category.
pub fn minimum_dimensions(product: &Product) -> Dimensions {
    if let Some(minimum) = product.minimum_dimensions {
        return minimum;
    }
    match product.category.as_str() {
        "push-lock" => Dimensions::new(15, 15),
        "plastic" => Dimensions::new(20, 30),
        CEILING_MOUNT_CATEGORY => Dimensions::new(30, 30),
        _ => Dimensions::new(25, 25),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogPrice {
    pub base: Decimal,
    pub double_door_surcharge: Decimal,
    pub ceiling_surcharge: Decimal,
    pub total: Decimal,
    pub tier: Option<PerimeterPriceTier>,
    pub is_over_limit: bool,
}

impl CatalogPrice {
    fn from_parts(
        base: Decimal,
        double_door_surcharge: Decimal,
        ceiling_surcharge: Decimal,
        tier: Option<PerimeterPriceTier>,
        is_over_limit: bool,
    ) -> Self {
        Self {
            base,
            double_door_surcharge,
            ceiling_surcharge,
            total: base + double_door_surcharge + ceiling_surcharge,
            tier,
            is_over_limit,
        }
    }
}

/// Discrete SKU price; only the ceiling-mount category adds a surcharge.
pub fn price_for_size(
    product: &Product,
    index: usize,
    installation_is_ceiling: bool,
) -> Result<CatalogPrice, DomainError> {
    let size = product
        .size(index)
        .ok_or_else(|| DomainError::UnknownSize { product_id: product.id.clone(), index })?;

    Ok(CatalogPrice::from_parts(
        size.price,
        Decimal::ZERO,
        category_ceiling_addend(product, installation_is_ceiling),
        None,
        false,
    ))
}

/// Custom-size price from the perimeter tiers, falling back to `base_price` for
/// products without tiers.
pub fn price_for_custom(
    product: &Product,
    dimensions: &Dimensions,
    flaps: FlapCount,
    installation_is_ceiling: bool,
) -> Result<CatalogPrice, DomainError> {
    let perimeter = dimensions.perimeter();
    let allowed = generic_allowed_flaps(product, perimeter);
    if !allowed.contains(flaps) {
        return Err(DomainError::IllegalFlapCount {
            product_id: product.id.clone(),
            flap_count: flaps,
            allowed,
        });
    }

    let Some(tier) = product.perimeter_tier(perimeter) else {
        return Ok(CatalogPrice::from_parts(
            product.base_price,
            Decimal::ZERO,
            category_ceiling_addend(product, installation_is_ceiling),
            None,
            false,
        ));
    };

    let double_door_surcharge = if flaps == FlapCount::Two && tier.has_double_door_option {
        tier.double_door_surcharge.unwrap_or(Decimal::ZERO)
    } else {
        Decimal::ZERO
    };

    let ceiling_surcharge = match (installation_is_ceiling, tier.ceiling_surcharge) {
        (true, Some(surcharge)) if tier.has_installation_type_option => surcharge,
        _ => category_ceiling_addend(product, installation_is_ceiling),
    };

    let is_over_limit = product.max_tier_perimeter().is_some_and(|max| perimeter > max);

    Ok(CatalogPrice::from_parts(
        tier.price,
        double_door_surcharge,
        ceiling_surcharge,
        Some(tier.clone()),
        is_over_limit,
    ))
}

fn category_ceiling_addend(product: &Product, installation_is_ceiling: bool) -> Decimal {
    if installation_is_ceiling && product.category == CEILING_MOUNT_CATEGORY {
        Decimal::from(CEILING_SURCHARGE_USD)
    } else {
        Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::{minimum_dimensions, price_for_custom, price_for_size, Catalog};
    use crate::domain::product::{Dimensions, PerimeterPriceTier, Product, ProductId, SizeOption};
    use crate::domain::quote::FlapCount;
    use crate::errors::DomainError;

    fn tier(max_perimeter: u32, price: rust_decimal::Decimal) -> PerimeterPriceTier {
        PerimeterPriceTier {
            max_perimeter,
            price,
            has_double_door_option: max_perimeter > 200,
            has_installation_type_option: max_perimeter > 200,
            double_door_surcharge: Some(dec!(15)),
            ceiling_surcharge: Some(dec!(5)),
            example_dimensions: None,
        }
    }

    fn product(category: &str) -> Product {
        Product {
            id: ProductId(format!("{category}-1")),
            name: "Hatch".to_owned(),
            category: category.to_owned(),
            base_price: dec!(25),
            sizes: vec![
                SizeOption { dimensions: Dimensions::new(30, 30), price: dec!(22) },
                SizeOption { dimensions: Dimensions::new(60, 60), price: dec!(41) },
            ],
            perimeter_pricing: vec![tier(200, dec!(30)), tier(400, dec!(55))],
            minimum_dimensions: None,
        }
    }

    #[test]
    fn catalog_finds_by_id_and_category() {
        let catalog = Catalog::new(vec![product("plastic"), product("ceiling-hatch")]);
        assert!(catalog.find(&ProductId("plastic-1".to_owned())).is_some());
        assert_eq!(catalog.by_category("ceiling-hatch").count(), 1);
        assert!(matches!(
            catalog.get(&ProductId("missing".to_owned())),
            Err(DomainError::UnknownProduct(_))
        ));
    }

    #[test]
    fn minimum_dimensions_follow_category_unless_overridden() {
        assert_eq!(minimum_dimensions(&product("push-lock")), Dimensions::new(15, 15));
        assert_eq!(minimum_dimensions(&product("plastic")), Dimensions::new(20, 30));
        assert_eq!(minimum_dimensions(&product("ceiling-hatch")), Dimensions::new(30, 30));
        assert_eq!(minimum_dimensions(&product("steel")), Dimensions::new(25, 25));

        let mut custom = product("steel");
        custom.minimum_dimensions = Some(Dimensions::new(40, 40));
        assert_eq!(minimum_dimensions(&custom), Dimensions::new(40, 40));
    }

    #[test]
    fn discrete_size_adds_ceiling_addend_only_for_ceiling_category() {
        let plain = price_for_size(&product("plastic"), 1, true).expect("size exists");
        assert_eq!(plain.total, dec!(41));

        let ceiling = price_for_size(&product("ceiling-hatch"), 1, true).expect("size exists");
        assert_eq!(ceiling.total, dec!(44));

        assert!(matches!(
            price_for_size(&product("plastic"), 9, false),
            Err(DomainError::UnknownSize { index: 9, .. })
        ));
    }

    #[test]
    fn custom_size_applies_tier_surcharges() {
        let price = price_for_custom(&product("plastic"), &Dimensions::new(80, 80), FlapCount::Two, true)
            .expect("two flaps available above 200");
        assert_eq!(price.base, dec!(55));
        assert_eq!(price.double_door_surcharge, dec!(15));
        assert_eq!(price.ceiling_surcharge, dec!(5));
        assert_eq!(price.total, dec!(75));
        assert!(!price.is_over_limit);
    }

    #[test]
    fn custom_size_above_highest_tier_prices_at_highest_and_flags() {
        let price =
            price_for_custom(&product("plastic"), &Dimensions::new(150, 150), FlapCount::One, false)
                .expect("no hard rejection");
        assert_eq!(price.base, dec!(55));
        assert!(price.is_over_limit);
    }

    #[test]
    fn custom_size_rejects_double_door_where_tier_has_none() {
        let error =
            price_for_custom(&product("plastic"), &Dimensions::new(40, 40), FlapCount::Two, false)
                .expect_err("tier <=200 has no double door");
        assert!(matches!(error, DomainError::IllegalFlapCount { .. }));
    }
}
