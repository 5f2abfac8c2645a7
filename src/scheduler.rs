// Background runner: the two jobs on independent intervals. They are
// deliberately not synchronized; overlap safety rests on the collision
// window and the terminal/in-flight guards inside the reconciler.

use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info};

use crate::context::ReconcileContext;
use crate::reconcile::{OrdersJob, PaymentsJob, RetryJob};

pub struct JobScheduler {
    ctx: ReconcileContext,
}

impl JobScheduler {
    pub fn new(ctx: ReconcileContext) -> Self {
        Self { ctx }
    }

    /// Spawn both job loops. Each cycle failure is logged and the loop
    /// continues; the next tick reprocesses from the last watermark.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        vec![self.spawn_orders_loop(), self.spawn_payments_loop()]
    }

    fn spawn_orders_loop(&self) -> JoinHandle<()> {
        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            let job = OrdersJob::new(ctx.clone());
            let retry = RetryJob::new(ctx.clone());
            let mut ticker = interval(ctx.config.orders_interval);
            loop {
                ticker.tick().await;
                info!("orders job cycle starting");
                if let Err(e) = job.run().await {
                    error!("orders job cycle failed: {}", e);
                }
                if let Err(e) = retry.run().await {
                    error!("retry pass failed: {}", e);
                }
            }
        })
    }

    fn spawn_payments_loop(&self) -> JoinHandle<()> {
        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            let job = PaymentsJob::new(ctx.clone());
            let mut ticker = interval(ctx.config.payments_interval);
            loop {
                ticker.tick().await;
                info!("payments job cycle starting");
                if let Err(e) = job.run().await {
                    error!("payments job cycle failed: {}", e);
                }
            }
        })
    }
}
