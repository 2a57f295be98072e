//! Value objects for the order domain.

use chrono::{Datelike, Utc};
use common::{Money, ProductId};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::FieldError;

use super::OrderError;

/// Human-facing order number, `ORD-<year>-<6 digits>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    const PREFIX: &'static str = "ORD";

    /// Generates a number for `year` with a random six-digit suffix.
    ///
    /// Suffixes can collide; the order store rejects duplicates and callers
    /// retry with a fresh number.
    pub fn generate(year: i32) -> Self {
        let suffix: u32 = rand::rng().random_range(0..1_000_000);
        Self(format!("{}-{year}-{suffix:06}", Self::PREFIX))
    }

    /// Generates a number for the current UTC year.
    pub fn generate_now() -> Self {
        Self::generate(Utc::now().year())
    }

    /// Parses and validates an order number.
    pub fn parse(s: &str) -> Result<Self, OrderError> {
        let invalid = || OrderError::InvalidOrderNumber(s.to_string());
        let mut parts = s.split('-');

        let (Some(prefix), Some(year), Some(suffix), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if prefix != Self::PREFIX
            || year.len() != 4
            || !all_digits(year)
            || suffix.len() != 6
            || !all_digits(suffix)
        {
            return Err(invalid());
        }

        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shipping address copied onto an order at checkout.
///
/// This is a value, not a reference to the customer's address book: later
/// edits to the customer's stored address never reach an existing order.
///
/// Absent fields deserialize as blank so `validate` can name every one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingAddress {
    pub name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    /// Checks that every required field is present and non-blank.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let required = [
            ("name", &self.name, "Name is required"),
            ("phone", &self.phone, "Phone is required"),
            ("line1", &self.line1, "Address line 1 is required"),
            ("city", &self.city, "City is required"),
            ("region", &self.region, "Region is required"),
            ("postalCode", &self.postal_code, "Postal code is required"),
            ("country", &self.country, "Country is required"),
        ];

        let errors: Vec<FieldError> = required
            .into_iter()
            .filter(|(_, value, _)| value.trim().is_empty())
            .map(|(field, _, message)| FieldError::new(format!("shippingAddress.{field}"), message))
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// A line of a committed order.
///
/// Unit price and product name are frozen copies taken at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

impl OrderLine {
    /// Creates a line, computing its total from price and quantity.
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id,
            product_name: product_name.into(),
            quantity,
            unit_price,
            line_total: unit_price.multiply(quantity),
        }
    }
}

/// Monetary breakdown of an order.
///
/// Always satisfies `total = subtotal + shipping_cost - discount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    subtotal: Money,
    shipping_cost: Money,
    discount: Money,
    total: Money,
}

impl OrderTotals {
    pub fn new(subtotal: Money, shipping_cost: Money, discount: Money) -> Self {
        Self {
            subtotal,
            shipping_cost,
            discount,
            total: subtotal + shipping_cost - discount,
        }
    }

    /// Totals for a set of lines, or `None` when any line total or sum
    /// overflows.
    pub fn checked_for_lines(lines: &[OrderLine], shipping_cost: Money) -> Option<Self> {
        let subtotal = lines.iter().try_fold(Money::zero(), |acc, line| {
            acc.checked_add(line.unit_price.checked_multiply(line.quantity)?)
        })?;
        subtotal.checked_add(shipping_cost)?;
        Some(Self::new(subtotal, shipping_cost, Money::zero()))
    }

    /// Totals for a set of lines with the given shipping cost and no discount.
    pub fn for_lines(lines: &[OrderLine], shipping_cost: Money) -> Self {
        let subtotal = lines.iter().map(|line| line.line_total).sum();
        Self::new(subtotal, shipping_cost, Money::zero())
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn shipping_cost(&self) -> Money {
        self.shipping_cost
    }

    pub fn discount(&self) -> Money {
        self.discount
    }

    pub fn total(&self) -> Money {
        self.total
    }
}
