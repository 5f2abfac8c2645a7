use tracing::{error, info, warn};

use crate::context::ReconcileContext;
use crate::error::AppResult;
use crate::reconcile::sync::Reconciler;
use crate::store::models::{DataSource, RetryPath};

/// Re-processes orders flagged with a transient error, dispatching each
/// to the sync path recorded in its retry tag.
pub struct RetryJob {
    ctx: ReconcileContext,
    reconciler: Reconciler,
}

impl RetryJob {
    pub fn new(ctx: ReconcileContext) -> Self {
        let reconciler = Reconciler::new(ctx.clone());
        Self { ctx, reconciler }
    }

    pub async fn run(&self) -> AppResult<()> {
        let store = &self.ctx.store;
        let orders = store.transient_error_orders().await?;
        for order in orders {
            let meta = store.meta(&order.id).await?;
            match meta.retry_action {
                Some(RetryPath::OrderSync) => {
                    info!("retry: re-running order sync for {}", order.id);
                    if let Err(e) = self
                        .reconciler
                        .sync_order(&order, DataSource::OrdersJob)
                        .await
                    {
                        error!("retry: order sync failed for {}: {}", order.id, e);
                    }
                }
                Some(RetryPath::PaymentSync) => {
                    let payment = match self.ctx.gateway.get_payment(&order.id).await {
                        Ok(payment) => payment,
                        Err(e) => {
                            warn!("retry: payment fetch failed for {}: {}", order.id, e);
                            continue;
                        }
                    };
                    info!("retry: re-running payment sync for {}", order.id);
                    if let Err(e) = self
                        .reconciler
                        .sync_payment(&payment, DataSource::PaymentsJob)
                        .await
                    {
                        error!("retry: payment sync failed for {}: {}", order.id, e);
                    }
                }
                None => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{OperationReceipt, PaymentInfo, TokenBalance};
    use crate::store::models::{Flag, OrderPaymentMeta, OrderStatus, PaymentStatus};
    use crate::store::Store;
    use crate::testing::{order_at, payment_record, test_context};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn full_balance(id: &str) -> PaymentInfo {
        PaymentInfo {
            id: id.to_string(),
            addresses: serde_json::Value::Null,
            token_balances: vec![TokenBalance {
                chain: "goerli".to_string(),
                addr: "0xtoken".to_string(),
                balance: dec!(100),
            }],
        }
    }

    #[tokio::test]
    async fn test_retry_order_path_settles_after_transient_failure() {
        let harness = test_context();
        let now = harness.clock.now();
        harness
            .store
            .insert_order(order_at("1", OrderStatus::Completed, now - Duration::hours(1)))
            .await;
        let mut meta = OrderPaymentMeta::new("1");
        meta.transient_error = Flag::Yes;
        meta.retry_action = Some(RetryPath::OrderSync);
        harness.store.put_meta(meta).await;
        harness.gateway.set_balance("1", Ok(full_balance("1")));
        harness.gateway.set_settle_result(Ok(OperationReceipt {
            txid: Some("tx-1".to_string()),
        }));

        RetryJob::new(harness.ctx()).run().await.unwrap();

        let meta = harness.store.meta("1").await.unwrap();
        assert_eq!(meta.payment_status, Some(PaymentStatus::SettleInProgress));
        assert_eq!(meta.transient_error, Flag::No);
    }

    #[tokio::test]
    async fn test_retry_payment_path_refetches_payment() {
        let harness = test_context();
        let now = harness.clock.now();
        harness
            .store
            .insert_order(order_at("2", OrderStatus::Pending, now - Duration::hours(1)))
            .await;
        let mut meta = OrderPaymentMeta::new("2");
        meta.transient_error = Flag::Yes;
        meta.retry_action = Some(RetryPath::PaymentSync);
        harness.store.put_meta(meta).await;
        harness
            .gateway
            .set_payment("2", payment_record("2", now - Duration::minutes(30)));
        harness.gateway.set_balance("2", Ok(full_balance("2")));

        RetryJob::new(harness.ctx()).run().await.unwrap();

        let order = harness.store.order("2").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn test_orders_without_retry_tag_are_skipped() {
        let harness = test_context();
        let now = harness.clock.now();
        harness
            .store
            .insert_order(order_at("3", OrderStatus::Completed, now - Duration::hours(1)))
            .await;
        let mut meta = OrderPaymentMeta::new("3");
        meta.transient_error = Flag::Yes;
        harness.store.put_meta(meta).await;

        RetryJob::new(harness.ctx()).run().await.unwrap();
        assert_eq!(harness.gateway.total_calls(), 0);
    }
}
