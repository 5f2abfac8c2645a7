use chrono::{DateTime, Duration, Utc};
use tracing::{error, info};

use crate::context::ReconcileContext;
use crate::error::AppResult;
use crate::gateway::OperationKind;
use crate::reconcile::settlement::SettlementManager;
use crate::reconcile::sweeper::TimeoutSweeper;
use crate::reconcile::sync::Reconciler;
use crate::store::models::{DataSource, JobStream};

/// The orders job: pushes local order status changes out to the
/// gateway, then runs the completion/verification passes.
pub struct OrdersJob {
    ctx: ReconcileContext,
    reconciler: Reconciler,
    settlement: SettlementManager,
    sweeper: TimeoutSweeper,
}

impl OrdersJob {
    pub fn new(ctx: ReconcileContext) -> Self {
        let reconciler = Reconciler::new(ctx.clone());
        let settlement = SettlementManager::new(ctx.clone());
        let sweeper = TimeoutSweeper::new(ctx.clone());
        Self {
            ctx,
            reconciler,
            settlement,
            sweeper,
        }
    }

    pub async fn run(&self) -> AppResult<()> {
        let source = DataSource::OrdersJob;
        let store = &self.ctx.store;

        let start_at = store.watermark(JobStream::Orders).await?;
        // bound the scan to its start time so orders we mutate below are
        // not re-fetched before the watermark advances
        let scan_start = self.ctx.clock.now();
        info!("{}: looking for orders modified after {}", source, start_at);

        let orders = store.updated_orders(start_at, scan_start).await?;
        if orders.is_empty() {
            info!("{}: no updated orders found", source);
        }

        let mut latest: Option<DateTime<Utc>> = None;
        for order in &orders {
            let changed = order.modified_at();
            latest = Some(latest.map_or(changed, |l| l.max(changed)));
            info!(
                "{}: processing order {} changed at {}",
                source, order.id, changed
            );
            // one order failing never aborts the batch
            if let Err(e) = self.reconciler.sync_order(order, source).await {
                error!("{}: sync failed for order {}: {}", source, order.id, e);
            }
        }

        if let Some(latest) = latest {
            let next = latest + Duration::seconds(1);
            store.set_watermark(JobStream::Orders, next).await?;
            info!("{}: watermark advanced to {}", source, next);
        }

        self.settlement
            .verify_operation_statuses(OperationKind::Settle, source)
            .await?;
        self.sweeper.run().await?;
        self.settlement
            .verify_operation_statuses(OperationKind::Refund, source)
            .await?;
        self.settlement.complete_refund_sweep(source).await?;
        Ok(())
    }
}
