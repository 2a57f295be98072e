//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// PENDING ──► CONFIRMED ──► PAID ──► PROCESSING ──► SHIPPED ──► DELIVERED ──► COMPLETED
///    └───────────────────────►┘ └──────────────────►┘
///
/// PENDING, CONFIRMED, PAID, PROCESSING ──► CANCELLED
/// PAID and everything after it         ──► REFUNDED
/// ```
///
/// `CANCELLED` and `REFUNDED` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order committed, awaiting payment. Stock is reserved.
    #[default]
    Pending,

    /// Order acknowledged by the merchant before payment settled.
    Confirmed,

    /// Payment provider reported success.
    Paid,

    /// Order is being prepared.
    Processing,

    /// Handed to the carrier.
    Shipped,

    /// Carrier reported delivery.
    Delivered,

    /// Order lifecycle finished.
    Completed,

    /// Order abandoned or payment failed (terminal state).
    Cancelled,

    /// Payment returned to the customer (terminal state).
    Refunded,
}

impl OrderStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [OrderStatus; 9] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Paid,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    /// Returns true if the order may move from `self` to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;

        matches!(
            (self, next),
            (Pending, Confirmed | Paid | Cancelled)
                | (Confirmed, Paid | Cancelled)
                | (Paid, Processing | Shipped | Cancelled | Refunded)
                | (Processing, Shipped | Cancelled | Refunded)
                | (Shipped, Delivered | Refunded)
                | (Delivered, Completed | Refunded)
                | (Completed, Refunded)
        )
    }

    /// Returns true if a payment notification may settle the order.
    ///
    /// Only `Pending` orders are driven by payment events; every other
    /// status is left alone.
    pub fn awaits_payment(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if no payment has been taken for the order yet.
    pub fn is_unpaid(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// Returns true if the order can be cancelled in this status.
    pub fn can_cancel(&self) -> bool {
        self.can_transition_to(OrderStatus::Cancelled)
    }

    /// Returns true if the order can be refunded in this status.
    pub fn can_refund(&self) -> bool {
        self.can_transition_to(OrderStatus::Refunded)
    }

    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Paid => "PAID",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown order status: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn test_main_line_transitions() {
        use OrderStatus::*;
        let line = [Pending, Confirmed, Paid, Processing, Shipped, Delivered, Completed];
        for pair in line.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
            assert!(!pair[1].can_transition_to(pair[0]), "{} -> {}", pair[1], pair[0]);
        }
    }

    #[test]
    fn test_pending_can_be_paid_directly() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
    }

    #[test]
    fn test_only_pending_awaits_payment() {
        for status in OrderStatus::ALL {
            assert_eq!(
                status.awaits_payment(),
                status == OrderStatus::Pending,
                "{status}"
            );
        }
    }

    #[test]
    fn test_pending_and_confirmed_are_unpaid() {
        for status in OrderStatus::ALL {
            let expected = matches!(status, OrderStatus::Pending | OrderStatus::Confirmed);
            assert_eq!(status.is_unpaid(), expected, "{status}");
        }
    }

    #[test]
    fn test_terminal_statuses_have_no_exits() {
        for from in [OrderStatus::Cancelled, OrderStatus::Refunded] {
            assert!(from.is_terminal());
            for to in OrderStatus::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_cannot_cancel_after_shipping() {
        assert!(OrderStatus::Processing.can_cancel());
        assert!(!OrderStatus::Shipped.can_cancel());
        assert!(!OrderStatus::Delivered.can_cancel());
        assert!(!OrderStatus::Completed.can_cancel());
    }

    #[test]
    fn test_refund_requires_settled_payment() {
        assert!(!OrderStatus::Pending.can_refund());
        assert!(!OrderStatus::Confirmed.can_refund());
        assert!(OrderStatus::Paid.can_refund());
        assert!(OrderStatus::Completed.can_refund());
        assert!(!OrderStatus::Cancelled.can_refund());
    }

    #[test]
    fn test_no_self_transitions() {
        for status in OrderStatus::ALL {
            assert!(!status.can_transition_to(status), "{status}");
        }
    }

    #[test]
    fn test_display_and_parse() {
        for status in OrderStatus::ALL {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("SHIPPING".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_serialization_uses_upper_case() {
        let json = serde_json::to_string(&OrderStatus::Paid).unwrap();
        assert_eq!(json, "\"PAID\"");
    }
}
