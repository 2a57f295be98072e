//! Business settings shared by the fulfillment services.

use common::Money;

/// Shipping, currency and redirect settings.
#[derive(Debug, Clone)]
pub struct FulfillmentSettings {
    /// Flat shipping cost added to every order.
    pub shipping_cost: Money,
    /// ISO currency code for every order.
    pub currency: String,
    /// Storefront base URL used to build payment redirects.
    pub web_base_url: String,
    /// How many order numbers checkout tries before giving up.
    pub order_number_attempts: u32,
}

impl Default for FulfillmentSettings {
    fn default() -> Self {
        Self {
            shipping_cost: Money::from_units(30),
            currency: "MAD".to_string(),
            web_base_url: "http://localhost:5173".to_string(),
            order_number_attempts: 5,
        }
    }
}

impl FulfillmentSettings {
    /// Where the provider sends the customer after paying.
    pub fn success_url(&self, order_number: &str) -> String {
        format!("{}/orders/{order_number}/success", self.base())
    }

    /// Where the provider sends the customer after abandoning payment.
    pub fn cancel_url(&self) -> String {
        format!("{}/checkout", self.base())
    }

    fn base(&self) -> &str {
        self.web_base_url.trim_end_matches('/')
    }
}
