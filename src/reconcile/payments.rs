use chrono::{DateTime, Duration, Utc};
use tracing::{error, info};

use crate::context::ReconcileContext;
use crate::error::AppResult;
use crate::reconcile::sync::Reconciler;
use crate::store::models::{DataSource, JobStream};

/// The payments job: pulls gateway payment events and applies them to
/// awaiting orders. A gateway failure mid-pagination aborts the whole
/// run without advancing the watermark, so the next run redelivers.
pub struct PaymentsJob {
    ctx: ReconcileContext,
    reconciler: Reconciler,
}

impl PaymentsJob {
    pub fn new(ctx: ReconcileContext) -> Self {
        let reconciler = Reconciler::new(ctx.clone());
        Self { ctx, reconciler }
    }

    pub async fn run(&self) -> AppResult<()> {
        let source = DataSource::PaymentsJob;
        let store = &self.ctx.store;

        let start_at = store.watermark(JobStream::Payments).await?;
        info!("{}: looking for payments modified after {}", source, start_at);

        let mut cursor: Option<String> = None;
        let mut latest: Option<DateTime<Utc>> = None;
        loop {
            let page = match self
                .ctx
                .gateway
                .list_payments(start_at, cursor.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    error!("{}: payment listing failed, aborting run: {}", source, e);
                    return Err(e.into());
                }
            };

            for payment in &page.results {
                latest = Some(latest.map_or(payment.updated_at, |l| l.max(payment.updated_at)));
                info!(
                    "{}: processing payment {} updated at {}",
                    source, payment.id, payment.updated_at
                );
                if let Err(e) = self.reconciler.sync_payment(payment, source).await {
                    error!("{}: sync failed for payment {}: {}", source, payment.id, e);
                }
            }

            match page.next_cursor() {
                Some(token) => cursor = Some(token.to_string()),
                None => break,
            }
        }

        if let Some(latest) = latest {
            let next = latest + Duration::seconds(1);
            store.set_watermark(JobStream::Payments, next).await?;
            info!("{}: watermark advanced to {}", source, next);
        }
        Ok(())
    }
}
