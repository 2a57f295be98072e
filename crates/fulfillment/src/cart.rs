//! Cart operations for a signed-in customer.

use std::collections::HashMap;

use common::{CustomerId, ProductId};
use domain::{Cart, CartSummary, Customer, Product};
use store::Store;

use crate::error::{FulfillmentError, Result};
use crate::settings::FulfillmentSettings;

/// Service for reading and editing a customer's cart.
///
/// Stock checks here only guard the user experience; checkout reserves
/// stock for real.
#[derive(Clone)]
pub struct CartService<S: Store> {
    store: S,
    settings: FulfillmentSettings,
}

impl<S: Store> CartService<S> {
    /// Creates a new cart service.
    pub fn new(store: S, settings: FulfillmentSettings) -> Self {
        Self { store, settings }
    }

    /// Returns the customer's cart, creating an empty one on first access.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, customer_id: CustomerId) -> Result<CartSummary> {
        self.require_customer(customer_id).await?;
        let cart = self.store.get_or_create_cart(customer_id).await?;
        self.summarize(&cart).await
    }

    /// Adds units of a product, merging with an existing line.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartSummary> {
        if quantity == 0 {
            return Err(FulfillmentError::InvalidQuantity(quantity));
        }
        self.require_customer(customer_id).await?;
        let product = self.require_product(product_id).await?;

        let mut cart = self.store.get_or_create_cart(customer_id).await?;
        let merged = cart.quantity_of(product_id).saturating_add(quantity);
        check_stock(&product, merged)?;

        cart.add_item(product_id, quantity)?;
        self.store.save_cart(&cart).await?;
        self.summarize(&cart).await
    }

    /// Sets the quantity of a product already in the cart.
    #[tracing::instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartSummary> {
        if quantity == 0 {
            return Err(FulfillmentError::InvalidQuantity(quantity));
        }
        self.require_customer(customer_id).await?;

        let mut cart = self.store.get_or_create_cart(customer_id).await?;
        if cart.quantity_of(product_id) == 0 {
            return Err(FulfillmentError::ItemNotInCart(product_id));
        }
        let product = self.require_product(product_id).await?;
        check_stock(&product, quantity)?;

        cart.update_item_quantity(product_id, quantity)?;
        self.store.save_cart(&cart).await?;
        self.summarize(&cart).await
    }

    /// Removes a product from the cart. Absent products are ignored.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> Result<CartSummary> {
        self.require_customer(customer_id).await?;

        let mut cart = self.store.get_or_create_cart(customer_id).await?;
        if cart.remove_item(product_id) {
            self.store.save_cart(&cart).await?;
        }
        self.summarize(&cart).await
    }

    /// Empties the cart. The cart itself is kept.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, customer_id: CustomerId) -> Result<CartSummary> {
        self.require_customer(customer_id).await?;

        let mut cart = self.store.get_or_create_cart(customer_id).await?;
        cart.clear();
        self.store.save_cart(&cart).await?;
        self.summarize(&cart).await
    }

    async fn require_customer(&self, customer_id: CustomerId) -> Result<Customer> {
        self.store
            .find_customer(customer_id)
            .await?
            .ok_or(FulfillmentError::CustomerNotFound(customer_id))
    }

    async fn require_product(&self, product_id: ProductId) -> Result<Product> {
        self.store
            .find_product(product_id)
            .await?
            .ok_or(FulfillmentError::ProductNotFound(product_id))
    }

    async fn summarize(&self, cart: &Cart) -> Result<CartSummary> {
        let ids: Vec<ProductId> = cart.lines().iter().map(|line| line.product_id).collect();
        let products: HashMap<ProductId, Product> = self
            .store
            .find_products(&ids)
            .await?
            .into_iter()
            .map(|product| (product.id, product))
            .collect();

        Ok(CartSummary::build(
            cart,
            &products,
            self.settings.shipping_cost,
            self.settings.currency.clone(),
        ))
    }
}

fn check_stock(product: &Product, quantity: u32) -> Result<()> {
    if !product.has_stock_for(quantity) {
        return Err(FulfillmentError::InsufficientStock {
            product_id: product.id,
            requested: quantity,
            available: product.stock,
        });
    }
    Ok(())
}
