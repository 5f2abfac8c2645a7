// Local store collaborator: order queries, per-order payment meta and
// the two job watermarks. The persistent engine lives with the host
// platform; `MemoryStore` backs tests and embedded use.

pub mod memory;
pub mod models;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppResult;
use models::{
    DataSource, Flag, JobStream, Order, OrderPaymentMeta, OrderStatus, OrderTransition,
    PaymentStatus, RetryPath,
};

pub use memory::MemoryStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// Last successfully processed timestamp for a job stream. Never
    /// rewound; a fresh store reports a trailing default window.
    async fn watermark(&self, stream: JobStream) -> AppResult<DateTime<Utc>>;

    async fn set_watermark(&self, stream: JobStream, at: DateTime<Utc>) -> AppResult<()>;

    async fn order(&self, order_id: &str) -> AppResult<Option<Order>>;

    /// The order awaiting payment for this payment id, if any
    /// (pending / awaitingconfirm / multitoken).
    async fn awaiting_order(&self, payment_id: &str) -> AppResult<Option<Order>>;

    /// Terminal-status orders changed within `[from, to]` that are not
    /// yet processing-completed, most recently changed first.
    async fn updated_orders(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Order>>;

    /// Terminal-status, not processing-completed orders whose meta holds
    /// the given payment status.
    async fn orders_for_payment_status(&self, status: PaymentStatus) -> AppResult<Vec<Order>>;

    /// Orders in the given host status, not processing-completed.
    async fn orders_for_status(&self, status: OrderStatus) -> AppResult<Vec<Order>>;

    /// Orders flagged with a transient error, not processing-completed.
    async fn transient_error_orders(&self) -> AppResult<Vec<Order>>;

    /// Per-order payment meta, created lazily on first sight.
    async fn meta(&self, order_id: &str) -> AppResult<OrderPaymentMeta>;

    async fn set_payment_status(
        &self,
        order_id: &str,
        status: Option<PaymentStatus>,
    ) -> AppResult<()>;

    async fn set_processing_completed(&self, order_id: &str, flag: Flag) -> AppResult<()>;

    /// Record or clear the transient error flag together with its retry
    /// path tag and error code.
    async fn set_transient_error(
        &self,
        order_id: &str,
        flag: Flag,
        retry: Option<RetryPath>,
        code: Option<&str>,
    ) -> AppResult<()>;

    async fn set_hard_error(&self, order_id: &str, flag: Flag) -> AppResult<()>;

    async fn set_data_source(&self, order_id: &str, source: DataSource) -> AppResult<()>;

    async fn set_txid(&self, order_id: &str, txid: &str) -> AppResult<()>;

    async fn set_addresses(&self, order_id: &str, addresses: serde_json::Value) -> AppResult<()>;

    /// Move the order to the transition's target status, stamping
    /// `changed_at` and attaching the transition comment.
    async fn apply_order_transition(
        &self,
        order_id: &str,
        transition: OrderTransition,
    ) -> AppResult<()>;

    /// Mark the order's pending payment-transaction record, if present,
    /// as succeeded.
    async fn mark_payment_transaction_succeeded(&self, order_id: &str) -> AppResult<()>;
}
