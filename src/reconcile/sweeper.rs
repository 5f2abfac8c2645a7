use tracing::info;

use crate::context::ReconcileContext;
use crate::error::AppResult;
use crate::store::models::{OrderStatus, OrderTransition};

/// Fails pending orders whose payment never arrived before the cutoff.
/// Terminal and unconditional; error flags do not gate it.
pub struct TimeoutSweeper {
    ctx: ReconcileContext,
}

impl TimeoutSweeper {
    pub fn new(ctx: ReconcileContext) -> Self {
        Self { ctx }
    }

    pub async fn run(&self) -> AppResult<()> {
        let store = &self.ctx.store;
        let orders = store.orders_for_status(OrderStatus::Pending).await?;
        let now = self.ctx.clock.now();

        for order in orders {
            let elapsed = now - order.modified_at();
            if elapsed > self.ctx.config.await_payment_cutoff {
                info!(
                    "order {}: payment confirmation not received before cutoff, elapsed {} minutes",
                    order.id,
                    elapsed.num_minutes()
                );
                store
                    .apply_order_transition(&order.id, OrderTransition::Fail)
                    .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::{Flag, OrderPaymentMeta};
    use crate::store::Store;
    use crate::testing::{order_at, test_context};
    use chrono::Duration;

    #[tokio::test]
    async fn test_cutoff_boundary() {
        let harness = test_context();
        let now = harness.clock.now();
        harness
            .store
            .insert_order(order_at("young", OrderStatus::Pending, now - Duration::minutes(1439)))
            .await;
        harness
            .store
            .insert_order(order_at("old", OrderStatus::Pending, now - Duration::minutes(1441)))
            .await;

        TimeoutSweeper::new(harness.ctx()).run().await.unwrap();

        let young = harness.store.order("young").await.unwrap().unwrap();
        assert_eq!(young.status, OrderStatus::Pending);
        let old = harness.store.order("old").await.unwrap().unwrap();
        assert_eq!(old.status, OrderStatus::PaymentFailed);
    }

    #[tokio::test]
    async fn test_created_at_fallback() {
        let harness = test_context();
        let now = harness.clock.now();
        let mut order = order_at("1", OrderStatus::Pending, now);
        order.changed_at = None;
        order.created_at = now - Duration::minutes(1500);
        harness.store.insert_order(order).await;

        TimeoutSweeper::new(harness.ctx()).run().await.unwrap();

        let after = harness.store.order("1").await.unwrap().unwrap();
        assert_eq!(after.status, OrderStatus::PaymentFailed);
    }

    #[tokio::test]
    async fn test_not_gated_by_error_flags() {
        let harness = test_context();
        let now = harness.clock.now();
        harness
            .store
            .insert_order(order_at("1", OrderStatus::Pending, now - Duration::minutes(1500)))
            .await;
        let mut meta = OrderPaymentMeta::new("1");
        meta.hard_error = Flag::Yes;
        harness.store.put_meta(meta).await;

        TimeoutSweeper::new(harness.ctx()).run().await.unwrap();

        let after = harness.store.order("1").await.unwrap().unwrap();
        assert_eq!(after.status, OrderStatus::PaymentFailed);
    }

    #[tokio::test]
    async fn test_non_pending_orders_ignored() {
        let harness = test_context();
        let now = harness.clock.now();
        harness
            .store
            .insert_order(order_at("1", OrderStatus::Processing, now - Duration::minutes(2000)))
            .await;

        TimeoutSweeper::new(harness.ctx()).run().await.unwrap();

        let after = harness.store.order("1").await.unwrap().unwrap();
        assert_eq!(after.status, OrderStatus::Processing);
    }
}
