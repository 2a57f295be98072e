//! Priced view of a cart.

use std::collections::HashMap;

use common::{CartId, Money, ProductId};
use serde::Serialize;

use crate::catalog::Product;

use super::Cart;

/// One cart line priced against the current catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummaryLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub sku: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
    /// Stock currently on hand, for display only.
    pub stock_quantity: u32,
}

/// Cart contents with subtotal, shipping and total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub id: CartId,
    pub items: Vec<CartSummaryLine>,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub total: Money,
    pub currency: String,
    pub total_items: u32,
}

impl CartSummary {
    /// Prices `cart` with the given products.
    ///
    /// Lines whose product is missing from `products` are left out of the
    /// items and the subtotal.
    pub fn build(
        cart: &Cart,
        products: &HashMap<ProductId, Product>,
        shipping_cost: Money,
        currency: impl Into<String>,
    ) -> Self {
        let items: Vec<CartSummaryLine> = cart
            .lines()
            .iter()
            .filter_map(|line| {
                let product = products.get(&line.product_id)?;
                Some(CartSummaryLine {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    sku: product.sku.clone(),
                    unit_price: product.price,
                    quantity: line.quantity,
                    line_total: product.price.multiply(line.quantity),
                    stock_quantity: product.stock,
                })
            })
            .collect();

        let subtotal: Money = items.iter().map(|item| item.line_total).sum();

        Self {
            id: cart.id(),
            total_items: items.iter().map(|item| item.quantity).sum(),
            items,
            subtotal,
            shipping_cost,
            total: subtotal + shipping_cost,
            currency: currency.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use common::CustomerId;

    use super::*;

    #[test]
    fn test_summary_totals() {
        let honey = Product::new("Euphorbia honey", "HNY-EUP-250", Money::from_units(100), 5);
        let wax = Product::new("Beeswax block", "WAX-100", Money::from_cents(2550), 10);

        let mut cart = Cart::new(CustomerId::new());
        cart.add_item(honey.id, 2).unwrap();
        cart.add_item(wax.id, 1).unwrap();

        let products = HashMap::from([(honey.id, honey.clone()), (wax.id, wax)]);
        let summary = CartSummary::build(&cart, &products, Money::from_units(30), "MAD");

        assert_eq!(summary.items.len(), 2);
        assert_eq!(summary.subtotal, Money::from_cents(22550));
        assert_eq!(summary.total, Money::from_cents(25550));
        assert_eq!(summary.total_items, 3);
        assert_eq!(summary.items[0].product_name, honey.name);
        assert_eq!(summary.items[0].stock_quantity, 5);
    }

    #[test]
    fn test_empty_cart_still_carries_shipping() {
        let cart = Cart::new(CustomerId::new());
        let summary = CartSummary::build(&cart, &HashMap::new(), Money::from_units(30), "MAD");

        assert!(summary.items.is_empty());
        assert_eq!(summary.subtotal, Money::zero());
        assert_eq!(summary.total, Money::from_units(30));
    }

    #[test]
    fn test_serializes_camel_case() {
        let cart = Cart::new(CustomerId::new());
        let summary = CartSummary::build(&cart, &HashMap::new(), Money::from_units(30), "MAD");
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["shippingCost"], "30.00");
        assert_eq!(json["totalItems"], 0);
    }
}
