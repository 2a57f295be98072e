use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartId, CustomerId, Money, OrderId, ProductId};
use domain::{
    Cart, CartLine, Customer, Order, OrderLine, OrderNumber, OrderParts, OrderStatus, OrderTotals,
    Product, ShippingAddress, WebhookEvent,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    traits::{
        CartStore, CustomerDirectory, EventInsert, InventoryLedger, OrderStore, ProductCatalog,
        WebhookEventStore,
    },
};

const ORDER_COLUMNS: &str = "id, order_number, customer_id, status, subtotal_cents, \
     shipping_cost_cents, discount_cents, total_cents, currency, payment_provider, \
     payment_intent_id, payment_session_id, tracking_number, shipping_address, notes, \
     created_at, updated_at";

const WEBHOOK_COLUMNS: &str = "id, provider, event_id, event_type, payload, signature, \
     processed, processed_at, error, attempts, received_at";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Inserts or updates a product row. Used for seeding.
    pub async fn upsert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, sku, price_cents, stock)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, sku = EXCLUDED.sku,
                price_cents = EXCLUDED.price_cents, stock = EXCLUDED.stock, updated_at = NOW()
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.price.cents())
        .bind(to_db_quantity(product.stock)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Inserts or updates a customer row. Used for seeding.
    pub async fn upsert_customer(&self, customer: &Customer) -> Result<()> {
        let address = customer
            .default_address
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO customers (id, email, full_name, default_address)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET email = EXCLUDED.email, full_name = EXCLUDED.full_name,
                default_address = EXCLUDED.default_address
            "#,
        )
        .bind(customer.id.as_uuid())
        .bind(&customer.email)
        .bind(&customer.full_name)
        .bind(address)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            sku: row.try_get("sku")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock: from_db_quantity(row.try_get("stock")?)?,
        })
    }

    fn row_to_customer(row: PgRow) -> Result<Customer> {
        let address: Option<serde_json::Value> = row.try_get("default_address")?;
        Ok(Customer {
            id: CustomerId::from_uuid(row.try_get::<Uuid, _>("id")?),
            email: row.try_get("email")?,
            full_name: row.try_get("full_name")?,
            default_address: address.map(serde_json::from_value).transpose()?,
        })
    }

    fn row_to_line(row: &PgRow) -> Result<OrderLine> {
        Ok(OrderLine {
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            product_name: row.try_get("product_name")?,
            quantity: from_db_quantity(row.try_get("quantity")?)?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            line_total: Money::from_cents(row.try_get("line_total_cents")?),
        })
    }

    fn row_to_order(row: &PgRow, lines: Vec<OrderLine>) -> Result<Order> {
        let number: String = row.try_get("order_number")?;
        let status: String = row.try_get("status")?;
        let address: serde_json::Value = row.try_get("shipping_address")?;
        let address: ShippingAddress = serde_json::from_value(address)?;

        let totals = OrderTotals::new(
            Money::from_cents(row.try_get("subtotal_cents")?),
            Money::from_cents(row.try_get("shipping_cost_cents")?),
            Money::from_cents(row.try_get("discount_cents")?),
        );

        Ok(Order::from_parts(OrderParts {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_number: OrderNumber::parse(&number)
                .map_err(|e| StoreError::InvalidData(e.to_string()))?,
            customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            status: status.parse().map_err(StoreError::InvalidData)?,
            totals,
            currency: row.try_get("currency")?,
            payment_provider: row.try_get("payment_provider")?,
            payment_intent_id: row.try_get("payment_intent_id")?,
            payment_session_id: row.try_get("payment_session_id")?,
            tracking_number: row.try_get("tracking_number")?,
            shipping_address: address,
            notes: row.try_get("notes")?,
            lines,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }

    fn row_to_webhook_event(row: PgRow) -> Result<WebhookEvent> {
        Ok(WebhookEvent {
            id: row.try_get("id")?,
            provider: row.try_get("provider")?,
            event_id: row.try_get("event_id")?,
            event_type: row.try_get("event_type")?,
            payload: row.try_get("payload")?,
            signature: row.try_get("signature")?,
            processed: row.try_get("processed")?,
            processed_at: row.try_get("processed_at")?,
            error: row.try_get("error")?,
            attempts: from_db_attempts(row.try_get("attempts")?)?,
            received_at: row.try_get("received_at")?,
        })
    }

    /// Loads the lines for a batch of order rows and assembles the orders,
    /// keeping the row order.
    async fn hydrate_orders(&self, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let line_rows = sqlx::query(
            r#"
            SELECT order_id, product_id, product_name, quantity, unit_price_cents, line_total_cents
            FROM order_lines
            WHERE order_id = ANY($1)
            ORDER BY order_id, line_no ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut lines: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for row in &line_rows {
            let order_id: Uuid = row.try_get("order_id")?;
            lines
                .entry(order_id)
                .or_default()
                .push(Self::row_to_line(row)?);
        }

        rows.iter()
            .zip(ids)
            .map(|(row, id)| Self::row_to_order(row, lines.remove(&id).unwrap_or_default()))
            .collect()
    }

    async fn find_order_where(&self, condition: &str, value: &str) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE {condition} LIMIT 1");
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.hydrate_orders(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn current_status(&self, order_id: OrderId) -> Result<Option<OrderStatus>> {
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        status
            .map(|s| s.parse().map_err(StoreError::InvalidData))
            .transpose()
    }

    fn ensure_order_updated(order_id: OrderId, rows_affected: u64) -> Result<()> {
        if rows_affected == 0 {
            return Err(StoreError::OrderNotFound(order_id.to_string()));
        }
        Ok(())
    }

    fn ensure_event_updated(event_id: &str, rows_affected: u64) -> Result<()> {
        if rows_affected == 0 {
            return Err(StoreError::InvalidData(format!(
                "webhook event {event_id} is not stored"
            )));
        }
        Ok(())
    }
}

fn to_db_quantity(quantity: u32) -> Result<i32> {
    i32::try_from(quantity)
        .map_err(|_| StoreError::InvalidData(format!("quantity {quantity} out of range")))
}

fn from_db_quantity(quantity: i32) -> Result<u32> {
    u32::try_from(quantity)
        .map_err(|_| StoreError::InvalidData(format!("negative quantity {quantity}")))
}

fn from_db_attempts(attempts: i32) -> Result<u32> {
    u32::try_from(attempts)
        .map_err(|_| StoreError::InvalidData(format!("negative attempt count {attempts}")))
}

#[async_trait]
impl ProductCatalog for PostgresStore {
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>> {
        sqlx::query("SELECT id, name, sku, price_cents, stock FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_product)
            .transpose()
    }

    async fn find_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let rows =
            sqlx::query("SELECT id, name, sku, price_cents, stock FROM products WHERE id = ANY($1)")
                .bind(&ids)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }
}

#[async_trait]
impl CustomerDirectory for PostgresStore {
    async fn find_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        sqlx::query("SELECT id, email, full_name, default_address FROM customers WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_customer)
            .transpose()
    }
}

#[async_trait]
impl InventoryLedger for PostgresStore {
    async fn try_reserve(&self, product_id: ProductId, quantity: u32) -> Result<u32> {
        let requested = to_db_quantity(quantity)?;

        // Single conditional decrement; the row lock serializes concurrent reservations
        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            RETURNING stock
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(requested)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(remaining) = remaining {
            return from_db_quantity(remaining);
        }

        let available = self.available(product_id).await?;
        Err(StoreError::InsufficientStock {
            product_id,
            requested: quantity,
            available,
        })
    }

    async fn release(&self, product_id: ProductId, quantity: u32) -> Result<()> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(product_id.as_uuid())
        .bind(to_db_quantity(quantity)?)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ProductNotFound(product_id));
        }
        Ok(())
    }

    async fn available(&self, product_id: ProductId) -> Result<u32> {
        let stock: Option<i32> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(product_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match stock {
            Some(stock) => from_db_quantity(stock),
            None => Err(StoreError::ProductNotFound(product_id)),
        }
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn get_or_create_cart(&self, customer_id: CustomerId) -> Result<Cart> {
        sqlx::query(
            "INSERT INTO carts (id, customer_id) VALUES ($1, $2) ON CONFLICT (customer_id) DO NOTHING",
        )
        .bind(CartId::new().as_uuid())
        .bind(customer_id.as_uuid())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query("SELECT id, created_at, updated_at FROM carts WHERE customer_id = $1")
            .bind(customer_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        let cart_id: Uuid = row.try_get("id")?;

        let line_rows = sqlx::query(
            "SELECT product_id, quantity FROM cart_items WHERE cart_id = $1 ORDER BY position ASC",
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;

        let lines = line_rows
            .into_iter()
            .map(|row| -> Result<CartLine> {
                Ok(CartLine {
                    product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
                    quantity: from_db_quantity(row.try_get("quantity")?)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Cart::from_parts(
            CartId::from_uuid(cart_id),
            customer_id,
            lines,
            row.try_get("created_at")?,
            row.try_get("updated_at")?,
        ))
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE carts SET updated_at = $2 WHERE id = $1")
            .bind(cart.id().as_uuid())
            .bind(cart.updated_at())
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart.id().as_uuid())
            .execute(&mut *tx)
            .await?;

        for (position, line) in cart.lines().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO cart_items (cart_id, product_id, quantity, position)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(cart.id().as_uuid())
            .bind(line.product_id.as_uuid())
            .bind(to_db_quantity(line.quantity)?)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        let number = order.order_number().as_str();
        let totals = order.totals();
        let address = serde_json::to_value(order.shipping_address())?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, customer_id, status, subtotal_cents,
                shipping_cost_cents, discount_cents, total_cents, currency, payment_provider,
                payment_intent_id, payment_session_id, tracking_number, shipping_address, notes,
                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(number)
        .bind(order.customer_id().as_uuid())
        .bind(order.status().as_str())
        .bind(totals.subtotal().cents())
        .bind(totals.shipping_cost().cents())
        .bind(totals.discount().cents())
        .bind(totals.total().cents())
        .bind(order.currency())
        .bind(order.payment_provider())
        .bind(order.payment_intent_id())
        .bind(order.payment_session_id())
        .bind(order.tracking_number())
        .bind(address)
        .bind(order.notes())
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_order_number")
            {
                return StoreError::DuplicateOrderNumber(number.to_string());
            }
            StoreError::Database(e)
        })?;

        for (line_no, line) in order.lines().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, line_no, product_id, product_name, quantity,
                    unit_price_cents, line_total_cents)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(order.id().as_uuid())
            .bind(line_no as i32)
            .bind(line.product_id.as_uuid())
            .bind(&line.product_name)
            .bind(to_db_quantity(line.quantity)?)
            .bind(line.unit_price.cents())
            .bind(line.line_total.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>> {
        self.find_order_where("order_number = $1", number.as_str())
            .await
    }

    async fn find_order_by_payment_reference(&self, reference: &str) -> Result<Option<Order>> {
        self.find_order_where(
            "(payment_intent_id = $1 OR payment_session_id = $1)",
            reference,
        )
        .await
    }

    async fn list_orders_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = $1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(customer_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

        self.hydrate_orders(rows).await
    }

    async fn attach_payment(
        &self,
        order_id: OrderId,
        provider: &str,
        session_id: &str,
        payment_intent_id: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET payment_provider = $2, payment_session_id = $3, payment_intent_id = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(provider)
        .bind(session_id)
        .bind(payment_intent_id)
        .execute(&self.pool)
        .await?;

        Self::ensure_order_updated(order_id, result.rows_affected())
    }

    async fn update_order_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<()> {
        if !expected.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                from: expected,
                to: next,
            });
        }

        let result = sqlx::query(
            "UPDATE orders SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2",
        )
        .bind(order_id.as_uuid())
        .bind(expected.as_str())
        .bind(next.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        match self.current_status(order_id).await? {
            Some(actual) => Err(StoreError::StatusConflict { expected, actual }),
            None => Err(StoreError::OrderNotFound(order_id.to_string())),
        }
    }

    async fn set_tracking_number(&self, order_id: OrderId, tracking_number: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE orders SET tracking_number = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(order_id.as_uuid())
        .bind(tracking_number)
        .execute(&self.pool)
        .await?;

        Self::ensure_order_updated(order_id, result.rows_affected())
    }

    async fn list_stale_pending_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE status = $1 AND payment_session_id IS NULL AND created_at < $2 \
             ORDER BY created_at ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(OrderStatus::Pending.as_str())
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;

        self.hydrate_orders(rows).await
    }
}

#[async_trait]
impl WebhookEventStore for PostgresStore {
    async fn insert_event_if_absent(&self, event: &WebhookEvent) -> Result<EventInsert> {
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_events (id, provider, event_id, event_type, payload, signature,
                processed, processed_at, error, attempts, received_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event.id)
        .bind(&event.provider)
        .bind(&event.event_id)
        .bind(&event.event_type)
        .bind(&event.payload)
        .bind(&event.signature)
        .bind(event.processed)
        .bind(event.processed_at)
        .bind(&event.error)
        .bind(i32::try_from(event.attempts).unwrap_or(i32::MAX))
        .bind(event.received_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(event_id = %event.event_id, "webhook event already stored");
            return Ok(EventInsert::Duplicate);
        }
        Ok(EventInsert::Inserted)
    }

    async fn mark_event_processed(&self, event_id: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE webhook_events
            SET processed = TRUE, processed_at = NOW(), error = NULL
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .execute(&self.pool)
        .await?;

        Self::ensure_event_updated(event_id, result.rows_affected())
    }

    async fn mark_event_failed(&self, event_id: &str, error: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE webhook_events SET processed = FALSE, error = $2, attempts = attempts + 1 \
             WHERE event_id = $1",
        )
        .bind(event_id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Self::ensure_event_updated(event_id, result.rows_affected())
    }

    async fn find_event(&self, event_id: &str) -> Result<Option<WebhookEvent>> {
        let sql = format!("SELECT {WEBHOOK_COLUMNS} FROM webhook_events WHERE event_id = $1");
        sqlx::query(&sql)
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_webhook_event)
            .transpose()
    }

    async fn list_unprocessed_events(
        &self,
        cutoff: DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<Vec<WebhookEvent>> {
        let sql = format!(
            "SELECT {WEBHOOK_COLUMNS} FROM webhook_events \
             WHERE processed = FALSE AND received_at < $1 AND attempts < $2 \
             ORDER BY received_at ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(cutoff)
            .bind(i32::try_from(max_attempts).unwrap_or(i32::MAX))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_webhook_event).collect()
    }
}
