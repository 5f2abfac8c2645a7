use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Host-platform order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    AwaitingConfirm,
    Processing,
    MultiToken,
    PaymentFailed,
    Completed,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::AwaitingConfirm => "awaitingconfirm",
            OrderStatus::Processing => "processing",
            OrderStatus::MultiToken => "multitoken",
            OrderStatus::PaymentFailed => "paymentfailed",
            OrderStatus::Completed => "completed",
            OrderStatus::Canceled => "canceled",
        }
    }

    /// Terminal on the host side; candidates for gateway settlement/refund.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Canceled)
    }

    /// Still waiting on payment; candidates for the payments job.
    pub fn is_awaiting_payment(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::AwaitingConfirm | OrderStatus::MultiToken
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Host-platform order. Owned by the commerce platform; the reconciler
/// only transitions its status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub status: OrderStatus,
    /// Order total, in the same unit/scale the gateway reports balances.
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    /// Updated by the host on any mutation, including ours.
    pub changed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Last modification time, falling back to creation time when the
    /// host has never stamped `changed_at`.
    pub fn modified_at(&self) -> DateTime<Utc> {
        self.changed_at.unwrap_or(self.created_at)
    }
}

/// Loosely-typed yes/no/empty flags from the host schema, closed into an
/// exhaustive enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flag {
    Yes,
    No,
    #[default]
    Unset,
}

impl Flag {
    pub fn is_yes(&self) -> bool {
        matches!(self, Flag::Yes)
    }
}

/// Gateway-side lifecycle marker for an order's payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentStatus {
    PaymentReceived,
    SettleInProgress,
    Settled,
    SettleFailed,
    RefundInProgress,
    Refunded,
    RefundFailed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::PaymentReceived => "payment-received",
            PaymentStatus::SettleInProgress => "settle-in-progress",
            PaymentStatus::Settled => "settled",
            PaymentStatus::SettleFailed => "settle-failed",
            PaymentStatus::RefundInProgress => "refund-in-progress",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::RefundFailed => "refund-failed",
        }
    }

    /// An operation has been issued but not yet confirmed complete.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            PaymentStatus::SettleInProgress | PaymentStatus::RefundInProgress
        )
    }

    /// In flight or already resolved on the gateway side. The payments
    /// job short-circuits for any of these.
    pub fn is_gateway_authoritative(&self) -> bool {
        !matches!(self, PaymentStatus::PaymentReceived)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which job last mutated an order's payment meta. Arbitrates
/// near-simultaneous updates between the two jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    #[serde(rename = "orders-cron")]
    OrdersJob,
    #[serde(rename = "payments-cron")]
    PaymentsJob,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::OrdersJob => "orders-cron",
            DataSource::PaymentsJob => "payments-cron",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which sync path is allowed to retry past a transient error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryPath {
    OrderSync,
    PaymentSync,
}

impl RetryPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryPath::OrderSync => "sync-order",
            RetryPath::PaymentSync => "sync-payment",
        }
    }
}

impl fmt::Display for RetryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-order reconciliation record, created lazily on first sight.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderPaymentMeta {
    pub order_id: String,
    pub payment_status: Option<PaymentStatus>,
    /// `Yes` freezes the record; no path mutates it again.
    pub processing_completed: Flag,
    pub hard_error: Flag,
    pub transient_error: Flag,
    /// Scopes which sync path may act while `transient_error` is set.
    pub retry_action: Option<RetryPath>,
    /// Code of the last transient error (E1xx/E2xx).
    pub error_code: Option<String>,
    pub data_source: Option<DataSource>,
    /// Last gateway transaction id.
    pub txid: Option<String>,
    /// Last known deposit addresses, opaque to the reconciler.
    pub addresses: Option<serde_json::Value>,
}

impl OrderPaymentMeta {
    pub fn new(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            ..Default::default()
        }
    }
}

/// Status transitions the reconciler applies to host orders, each with
/// the human-readable comment attached to the order history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderTransition {
    Place,
    Confirm,
    Process,
    MultiToken,
    SingleToken,
    Fail,
}

impl OrderTransition {
    pub fn target_status(&self) -> OrderStatus {
        match self {
            OrderTransition::Place => OrderStatus::Pending,
            OrderTransition::Confirm => OrderStatus::AwaitingConfirm,
            OrderTransition::Process => OrderStatus::Processing,
            OrderTransition::MultiToken => OrderStatus::MultiToken,
            // Balance resolved back to one token; order re-enters the
            // normal pending flow.
            OrderTransition::SingleToken => OrderStatus::Pending,
            OrderTransition::Fail => OrderStatus::PaymentFailed,
        }
    }

    pub fn comment(&self) -> &'static str {
        match self {
            OrderTransition::Place => "Payment pending for the order",
            OrderTransition::Confirm => "Payment received for the order, awaiting confirmation",
            OrderTransition::Process => "Payment confirmed for the order",
            OrderTransition::MultiToken => "Payment made in multiple tokens for the order",
            OrderTransition::SingleToken => "Payment received in single token for the order",
            OrderTransition::Fail => "Payment not received even after 24 hours after order placed",
        }
    }
}

/// The two independently-scheduled job streams, each with its own
/// watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStream {
    Orders,
    Payments,
}

impl JobStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStream::Orders => "order_updated_at",
            JobStream::Payments => "payment_updated_at",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_status_guards() {
        assert!(PaymentStatus::SettleInProgress.is_in_flight());
        assert!(PaymentStatus::RefundInProgress.is_in_flight());
        assert!(!PaymentStatus::PaymentReceived.is_in_flight());
        assert!(!PaymentStatus::Refunded.is_in_flight());

        assert!(PaymentStatus::Refunded.is_gateway_authoritative());
        assert!(PaymentStatus::SettleFailed.is_gateway_authoritative());
        assert!(!PaymentStatus::PaymentReceived.is_gateway_authoritative());
    }

    #[test]
    fn test_single_token_transition_reenters_pending() {
        assert_eq!(
            OrderTransition::SingleToken.target_status(),
            OrderStatus::Pending
        );
        assert_eq!(
            OrderTransition::Fail.target_status(),
            OrderStatus::PaymentFailed
        );
    }

    #[test]
    fn test_modified_at_fallback() {
        use chrono::TimeZone;
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let order = Order {
            id: "41".to_string(),
            status: OrderStatus::Pending,
            total: rust_decimal_macros::dec!(10),
            created_at: created,
            changed_at: None,
        };
        assert_eq!(order.modified_at(), created);
    }
}
