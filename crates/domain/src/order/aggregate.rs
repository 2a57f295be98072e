//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{CustomerId, Money, OrderId};
use serde::{Deserialize, Serialize};

use super::{OrderError, OrderLine, OrderNumber, OrderStatus, OrderTotals, ShippingAddress};

/// Everything checkout knows about an order before it is numbered.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: CustomerId,
    pub lines: Vec<OrderLine>,
    pub shipping_cost: Money,
    pub currency: String,
    pub shipping_address: ShippingAddress,
    pub notes: Option<String>,
}

/// Raw field set used to rehydrate an order from storage.
#[derive(Debug, Clone)]
pub struct OrderParts {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub customer_id: CustomerId,
    pub status: OrderStatus,
    pub totals: OrderTotals,
    pub currency: String,
    pub payment_provider: Option<String>,
    pub payment_intent_id: Option<String>,
    pub payment_session_id: Option<String>,
    pub tracking_number: Option<String>,
    pub shipping_address: ShippingAddress,
    pub notes: Option<String>,
    pub lines: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order aggregate root.
///
/// Lines, totals, currency and the shipping address are fixed when the order
/// is placed. Only the status, payment references and tracking number change
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    order_number: OrderNumber,
    customer_id: CustomerId,
    status: OrderStatus,
    totals: OrderTotals,
    currency: String,
    payment_provider: Option<String>,
    payment_intent_id: Option<String>,
    payment_session_id: Option<String>,
    tracking_number: Option<String>,
    shipping_address: ShippingAddress,
    notes: Option<String>,
    lines: Vec<OrderLine>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Places a new `PENDING` order under the given number.
    ///
    /// Totals are computed from the lines; no discount is applied.
    pub fn place(new: NewOrder, order_number: OrderNumber) -> Result<Self, OrderError> {
        if new.lines.is_empty() {
            return Err(OrderError::NoLines);
        }
        if let Some(line) = new.lines.iter().find(|line| line.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                product_id: line.product_id.to_string(),
                quantity: line.quantity,
            });
        }

        let now = Utc::now();
        let totals = OrderTotals::checked_for_lines(&new.lines, new.shipping_cost)
            .ok_or(OrderError::AmountOverflow)?;

        Ok(Self {
            id: OrderId::new(),
            order_number,
            customer_id: new.customer_id,
            status: OrderStatus::Pending,
            totals,
            currency: new.currency,
            payment_provider: None,
            payment_intent_id: None,
            payment_session_id: None,
            tracking_number: None,
            shipping_address: new.shipping_address,
            notes: new.notes,
            lines: new.lines,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuilds an order from stored fields without re-running validation.
    pub fn from_parts(parts: OrderParts) -> Self {
        Self {
            id: parts.id,
            order_number: parts.order_number,
            customer_id: parts.customer_id,
            status: parts.status,
            totals: parts.totals,
            currency: parts.currency,
            payment_provider: parts.payment_provider,
            payment_intent_id: parts.payment_intent_id,
            payment_session_id: parts.payment_session_id,
            tracking_number: parts.tracking_number,
            shipping_address: parts.shipping_address,
            notes: parts.notes,
            lines: parts.lines,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        }
    }

    // Accessors

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn order_number(&self) -> &OrderNumber {
        &self.order_number
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn totals(&self) -> &OrderTotals {
        &self.totals
    }

    pub fn total(&self) -> Money {
        self.totals.total()
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn payment_provider(&self) -> Option<&str> {
        self.payment_provider.as_deref()
    }

    pub fn payment_intent_id(&self) -> Option<&str> {
        self.payment_intent_id.as_deref()
    }

    pub fn payment_session_id(&self) -> Option<&str> {
        self.payment_session_id.as_deref()
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns true if either payment reference equals `reference`.
    pub fn matches_payment_reference(&self, reference: &str) -> bool {
        self.payment_intent_id.as_deref() == Some(reference)
            || self.payment_session_id.as_deref() == Some(reference)
    }

    // Mutations

    /// Moves the order to `next`, returning the previous status.
    pub fn transition_to(&mut self, next: OrderStatus) -> Result<OrderStatus, OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        let previous = self.status;
        self.status = next;
        self.touch();
        Ok(previous)
    }

    /// Records the payment provider's references for this order.
    pub fn attach_payment(
        &mut self,
        provider: impl Into<String>,
        session_id: impl Into<String>,
        payment_intent_id: Option<String>,
    ) {
        self.payment_provider = Some(provider.into());
        self.payment_session_id = Some(session_id.into());
        self.payment_intent_id = payment_intent_id;
        self.touch();
    }

    pub fn set_tracking_number(&mut self, tracking_number: impl Into<String>) {
        self.tracking_number = Some(tracking_number.into());
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
