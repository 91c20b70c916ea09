//! Authoritative order pricing.
//!
//! Every checkout path prices its lines here, from the catalog. Clients may send a unit price along with a cart line,
//! but it is never used.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Cents, OrderItem, Product},
    order_objects::CartLine,
    traits::StoreError,
};

/// Orders at or above this item subtotal ship free
pub const FREE_SHIPPING_THRESHOLD: i64 = 50_00;
pub const FLAT_SHIPPING_FEE: i64 = 5_99;
/// 8% sales tax
pub const TAX_RATE_BASIS_POINTS: i64 = 800;

pub fn shipping_for(items_price: Cents) -> Cents {
    if items_price.value() >= FREE_SHIPPING_THRESHOLD {
        Cents::from(0)
    } else {
        Cents::from(FLAT_SHIPPING_FEE)
    }
}

pub fn tax_for(items_price: Cents) -> Cents {
    items_price.apply_basis_points(TAX_RATE_BASIS_POINTS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub items_price: Cents,
    pub shipping_price: Cents,
    pub tax_price: Cents,
    pub total_price: Cents,
}

impl PriceBreakdown {
    pub fn for_items_price(items_price: Cents) -> Self {
        let shipping_price = shipping_for(items_price);
        let tax_price = tax_for(items_price);
        Self { items_price, shipping_price, tax_price, total_price: items_price + shipping_price + tax_price }
    }

    pub fn for_items(items: &[OrderItem]) -> Self {
        Self::for_items_price(items.iter().map(OrderItem::line_total).sum())
    }
}

/// The unit price of a product with the given variation options selected.
///
/// Each selected option adds its `priceModifier` to the base price. Selecting an axis or option the product does not
/// have is an error.
pub fn unit_price(product: &Product, selection: Option<&BTreeMap<String, String>>) -> Result<Cents, StoreError> {
    let mut price = product.price;
    let Some(selection) = selection else {
        return Ok(price);
    };
    for (axis, choice) in selection {
        let variation = product.variations.0.iter().find(|v| &v.name == axis).ok_or_else(|| {
            StoreError::ValidationError(format!("{} has no '{axis}' option", product.name))
        })?;
        let option = variation.options.iter().find(|o| &o.value == choice).ok_or_else(|| {
            StoreError::ValidationError(format!("'{choice}' is not a valid {axis} for {}", product.name))
        })?;
        price += option.price_modifier;
    }
    Ok(price)
}

/// Prices a single cart line against its catalog product, checking that the product can be sold in that quantity.
pub fn price_line(product: &Product, line: &CartLine) -> Result<OrderItem, StoreError> {
    if !product.is_active {
        return Err(StoreError::ProductUnavailable(product.name.clone()));
    }
    if line.quantity < 1 {
        return Err(StoreError::ValidationError(format!("Invalid quantity for {}", product.name)));
    }
    if product.stock < line.quantity {
        return Err(StoreError::InsufficientStock(product.name.clone()));
    }
    let price = unit_price(product, line.variation.as_ref())?;
    Ok(OrderItem {
        product: product.id.clone(),
        name: product.name.clone(),
        image: product.main_image().cloned(),
        quantity: line.quantity,
        price,
        variation: line.variation.clone().filter(|v| !v.is_empty()),
    })
}
