use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::context::ReconcileContext;
use crate::error::{codes, AppResult};
use crate::gateway::{PaymentInfo, PaymentRecord};
use crate::reconcile::classifier::ErrorClassifier;
use crate::reconcile::settlement::SettlementManager;
use crate::store::models::{
    DataSource, Flag, Order, OrderStatus, OrderTransition, PaymentStatus, RetryPath,
};

/// The per-order state machine driven by both jobs. Guard conditions
/// run in a fixed order; each short-circuits the sync for this run.
pub struct Reconciler {
    ctx: ReconcileContext,
    classifier: ErrorClassifier,
    settlement: SettlementManager,
}

impl Reconciler {
    pub fn new(ctx: ReconcileContext) -> Self {
        let classifier = ErrorClassifier::new(ctx.store.clone());
        let settlement = SettlementManager::new(ctx.clone());
        Self {
            ctx,
            classifier,
            settlement,
        }
    }

    /// Reconcile one locally-changed order against the gateway.
    pub async fn sync_order(&self, order: &Order, source: DataSource) -> AppResult<()> {
        let store = &self.ctx.store;
        info!(
            "{}: sync_order: order {} status {}",
            source, order.id, order.status
        );

        let meta = store.meta(&order.id).await?;

        if meta.hard_error.is_yes() {
            info!("{}: sync_order: order {} skipped, hard error set", source, order.id);
            return Ok(());
        }

        if meta.transient_error.is_yes() && meta.retry_action != Some(RetryPath::OrderSync) {
            info!(
                "{}: sync_order: order {} skipped, transient error owned by {:?}",
                source, order.id, meta.retry_action
            );
            return Ok(());
        }

        if meta.processing_completed.is_yes() {
            info!(
                "{}: sync_order: order {} already completed, no further changes",
                source, order.id
            );
            return Ok(());
        }

        if meta.payment_status.map_or(false, |s| s.is_in_flight()) {
            // an operation is already in flight; completion is verified
            // elsewhere
            return Ok(());
        }

        let now = self.ctx.clock.now();
        if now - order.modified_at() < self.ctx.config.collision_window
            && source == DataSource::OrdersJob
            && meta.data_source == Some(DataSource::PaymentsJob)
        {
            let message = format!(
                "order {} was updated by {} recently, deferring; will retry",
                order.id,
                DataSource::PaymentsJob
            );
            info!("{}: sync_order: {}", source, message);
            self.classifier
                .log_transient(
                    &order.id,
                    RetryPath::OrderSync,
                    codes::ORDER_COLLISION_DEFER,
                    &message,
                )
                .await?;
            return Ok(());
        }

        let payment = match self.ctx.gateway.get_token_balance(&order.id, None).await {
            Err(e) if e.is_multi_token() => {
                store
                    .apply_order_transition(&order.id, OrderTransition::MultiToken)
                    .await?;
                info!(
                    "{}: sync_order: order {} holds balances in multiple tokens: {}",
                    source, order.id, e.message
                );
                return Ok(());
            }
            Err(e) => {
                warn!(
                    "{}: sync_order: token balance lookup failed for order {}: {}",
                    source, order.id, e
                );
                return Ok(());
            }
            Ok(payment) => payment,
        };

        if order.status == OrderStatus::MultiToken {
            // balance resolved back to a single token
            store
                .apply_order_transition(&order.id, OrderTransition::SingleToken)
                .await?;
            self.check_balance_mark_processing(order, &payment, source)
                .await?;
            info!(
                "{}: sync_order: order {} resolved to a single token",
                source, order.id
            );
        }

        let amount = payment.resolved_amount();
        if amount == Decimal::ZERO {
            info!("{}: sync_order: order {} has no payment yet", source, order.id);
            return Ok(());
        }

        // Dispatch keyed on the status the order entered this run with;
        // a just-resolved multitoken order is picked up next run.
        match order.status {
            OrderStatus::Completed => {
                info!("{}: sync_order: order {} settling payment", source, order.id);
                self.settlement.settle_order(order, &payment, source).await?;
            }
            OrderStatus::Canceled => {
                info!("{}: sync_order: order {} refunding payment", source, order.id);
                self.settlement
                    .refund_order(&order.id, &payment, source)
                    .await?;
            }
            other => {
                info!(
                    "{}: sync_order: order {} unhandled status {}",
                    source, order.id, other
                );
            }
        }
        Ok(())
    }

    /// Reconcile one gateway payment event against its local order.
    pub async fn sync_payment(&self, payment: &PaymentRecord, source: DataSource) -> AppResult<()> {
        let store = &self.ctx.store;
        let order = match store.awaiting_order(&payment.id).await? {
            Some(order) => order,
            // no pending/awaiting/multitoken order for this payment
            None => return Ok(()),
        };

        let meta = store.meta(&order.id).await?;

        if meta.hard_error.is_yes()
            || (meta.transient_error.is_yes()
                && meta.retry_action != Some(RetryPath::PaymentSync))
        {
            info!(
                "{}: sync_payment: order {} skipped, hard error or retry path mismatch ({:?})",
                source, order.id, meta.retry_action
            );
            return Ok(());
        }

        if meta.processing_completed.is_yes() {
            info!(
                "{}: sync_payment: order {} already completed, no further changes",
                source, order.id
            );
            return Ok(());
        }

        // while an operation is in flight or resolved, the gateway owns
        // this record
        if meta
            .payment_status
            .map_or(false, |s| s.is_gateway_authoritative())
        {
            info!(
                "{}: sync_payment: order {} skipped, payment status {:?} is gateway-side",
                source, order.id, meta.payment_status
            );
            return Ok(());
        }

        let now = self.ctx.clock.now();
        if now - order.modified_at() < self.ctx.config.collision_window
            && source == DataSource::PaymentsJob
            && meta.data_source == Some(DataSource::OrdersJob)
        {
            let message = format!(
                "order {} was updated by {} recently, deferring; will retry",
                order.id,
                DataSource::OrdersJob
            );
            info!("{}: sync_payment: {}", source, message);
            self.classifier
                .log_transient(
                    &order.id,
                    RetryPath::PaymentSync,
                    codes::PAYMENT_COLLISION_DEFER,
                    &message,
                )
                .await?;
            return Ok(());
        }

        store
            .set_addresses(&order.id, payment.addresses.clone())
            .await?;

        let resolved = match self
            .ctx
            .gateway
            .get_token_balance(&order.id, Some(payment))
            .await
        {
            Err(e) if e.is_multi_token() => {
                store
                    .apply_order_transition(&order.id, OrderTransition::MultiToken)
                    .await?;
                info!(
                    "{}: sync_payment: order {} holds balances in multiple tokens: {}",
                    source, order.id, e.message
                );
                return Ok(());
            }
            Err(e) => {
                warn!(
                    "{}: sync_payment: token balance lookup failed for order {}: {}",
                    source, order.id, e
                );
                return Ok(());
            }
            Ok(resolved) => resolved,
        };

        if order.status == OrderStatus::MultiToken {
            store
                .apply_order_transition(&order.id, OrderTransition::SingleToken)
                .await?;
            info!(
                "{}: sync_payment: order {} resolved to a single token",
                source, order.id
            );
        }

        self.check_balance_mark_processing(&order, &resolved, source)
            .await?;
        Ok(())
    }

    /// The single point where "money received" becomes "order may
    /// proceed": with the balance covering the order total, advance to
    /// processing and mark the payment received.
    pub async fn check_balance_mark_processing(
        &self,
        order: &Order,
        payment: &PaymentInfo,
        source: DataSource,
    ) -> AppResult<bool> {
        let store = &self.ctx.store;
        let amount = payment.resolved_amount();
        info!(
            "{}: balance check for order {}: amount {} against total {}",
            source, order.id, amount, order.total
        );
        if amount < order.total {
            return Ok(false);
        }

        store
            .apply_order_transition(&order.id, OrderTransition::Process)
            .await?;
        store.set_processing_completed(&order.id, Flag::No).await?;
        store
            .set_payment_status(&order.id, Some(PaymentStatus::PaymentReceived))
            .await?;
        store.set_data_source(&order.id, source).await?;
        store.mark_payment_transaction_succeeded(&order.id).await?;
        info!("{}: order {} set to processing", source, order.id);
        Ok(true)
    }
}
