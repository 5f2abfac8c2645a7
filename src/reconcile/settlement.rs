use tracing::{info, warn};

use crate::context::ReconcileContext;
use crate::error::{codes, AppResult};
use crate::gateway::{OperationKind, PaymentInfo};
use crate::reconcile::classifier::ErrorClassifier;
use crate::store::models::{DataSource, Flag, Order, PaymentStatus, RetryPath};

/// Issues settle/refund operations, records their in-progress markers,
/// and verifies completion against the gateway's operation history.
pub struct SettlementManager {
    ctx: ReconcileContext,
    classifier: ErrorClassifier,
}

impl SettlementManager {
    pub fn new(ctx: ReconcileContext) -> Self {
        let classifier = ErrorClassifier::new(ctx.store.clone());
        Self { ctx, classifier }
    }

    /// Settle a completed order's payment and mark it settle-in-progress.
    pub async fn settle_order(
        &self,
        order: &Order,
        payment: &PaymentInfo,
        source: DataSource,
    ) -> AppResult<()> {
        let store = &self.ctx.store;
        // rate limit courtesy towards the gateway
        tokio::time::sleep(self.ctx.config.issue_pacing).await;

        match self.ctx.gateway.settle(payment, order).await {
            Err(e) => {
                self.classifier
                    .log_transient(&order.id, RetryPath::OrderSync, codes::SETTLE_FAILED, &e.message)
                    .await?;
            }
            Ok(receipt) => {
                if let Some(txid) = receipt.txid {
                    store.set_txid(&order.id, &txid).await?;
                    store
                        .set_payment_status(&order.id, Some(PaymentStatus::SettleInProgress))
                        .await?;
                    store.set_processing_completed(&order.id, Flag::No).await?;
                    store.set_data_source(&order.id, source).await?;
                    self.classifier.clear_transient(&order.id).await?;
                    info!(
                        "{}: settle issued for order {}, tx-id {}",
                        source, order.id, txid
                    );
                } else {
                    warn!(
                        "{}: settle for order {} returned no transaction id",
                        source, order.id
                    );
                }
            }
        }
        Ok(())
    }

    /// Refund an order's payment and mark it refund-in-progress.
    pub async fn refund_order(
        &self,
        order_id: &str,
        payment: &PaymentInfo,
        source: DataSource,
    ) -> AppResult<()> {
        let store = &self.ctx.store;
        tokio::time::sleep(self.ctx.config.issue_pacing).await;

        match self.ctx.gateway.refund(payment, order_id).await {
            Err(e) => {
                self.classifier
                    .log_transient(order_id, RetryPath::OrderSync, codes::REFUND_FAILED, &e.message)
                    .await?;
            }
            Ok(receipt) => {
                if let Some(txid) = receipt.txid {
                    store.set_txid(order_id, &txid).await?;
                    store
                        .set_payment_status(order_id, Some(PaymentStatus::RefundInProgress))
                        .await?;
                    store.set_processing_completed(order_id, Flag::No).await?;
                    self.classifier.clear_transient(order_id).await?;
                    info!("{}: refund issued for order {}, tx-id {}", source, order_id, txid);
                } else {
                    warn!(
                        "{}: refund for order {} returned no transaction id",
                        source, order_id
                    );
                }
            }
        }
        // provenance is stamped even when the gateway call failed
        store.set_data_source(order_id, source).await?;
        Ok(())
    }

    /// Hand all orders with an in-flight operation of `kind` to the
    /// gateway collaborator for terminal status resolution.
    pub async fn verify_operation_statuses(
        &self,
        kind: OperationKind,
        source: DataSource,
    ) -> AppResult<()> {
        let in_flight = match kind {
            OperationKind::Settle => PaymentStatus::SettleInProgress,
            OperationKind::Refund => PaymentStatus::RefundInProgress,
        };
        let orders = self.ctx.store.orders_for_payment_status(in_flight).await?;
        if orders.is_empty() {
            return Ok(());
        }
        if let Err(e) = self
            .ctx
            .gateway
            .verify_operation_completion(&orders, kind, source)
            .await
        {
            warn!(
                "{}: {} completion verification failed: {}",
                source,
                kind.as_str(),
                e
            );
        }
        Ok(())
    }

    /// For refunded orders, confirm every token balance has actually
    /// been returned. One remediation refund per order per run; the
    /// record is frozen only once every balance is covered.
    pub async fn complete_refund_sweep(&self, source: DataSource) -> AppResult<()> {
        let store = &self.ctx.store;
        let orders = store
            .orders_for_payment_status(PaymentStatus::Refunded)
            .await?;

        'orders: for order in orders {
            let payment = match self.ctx.gateway.get_token_balance(&order.id, None).await {
                Ok(p) => p,
                Err(e) => {
                    warn!(
                        "{}: refund sweep balance lookup failed for order {}: {}",
                        source, order.id, e
                    );
                    continue;
                }
            };

            if payment.token_balances.is_empty() {
                store.set_processing_completed(&order.id, Flag::Yes).await?;
                info!("{}: order {} fully refunded, processing completed", source, order.id);
                continue;
            }

            // Cross-reference each remaining balance against successful
            // refund operations, across all history pages.
            let mut refunded = vec![false; payment.token_balances.len()];
            let mut cursor: Option<String> = None;
            loop {
                let page = match self
                    .ctx
                    .gateway
                    .list_operations(&order.id, cursor.as_deref())
                    .await
                {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(
                            "{}: refund sweep operation listing failed for order {}: {}",
                            source, order.id, e
                        );
                        continue 'orders;
                    }
                };
                for (i, balance) in payment.token_balances.iter().enumerate() {
                    if !refunded[i] && page.results.iter().any(|op| op.refunds(balance)) {
                        refunded[i] = true;
                    }
                }
                match page.next_cursor() {
                    Some(token) => cursor = Some(token.to_string()),
                    None => break,
                }
            }

            let unmatched = payment
                .token_balances
                .iter()
                .enumerate()
                .find(|(i, _)| !refunded[*i]);
            match unmatched {
                Some((_, balance)) => {
                    // one remediation per run; re-checked next run
                    let targeted = PaymentInfo {
                        id: order.id.clone(),
                        addresses: payment.addresses.clone(),
                        token_balances: vec![balance.clone()],
                    };
                    info!(
                        "{}: order {} still holds {} on {}, issuing targeted refund",
                        source, order.id, balance.balance, balance.chain
                    );
                    self.refund_order(&order.id, &targeted, source).await?;
                }
                None => {
                    store.set_processing_completed(&order.id, Flag::Yes).await?;
                    info!(
                        "{}: order {} refunds all confirmed, processing completed",
                        source, order.id
                    );
                }
            }
        }
        Ok(())
    }
}
