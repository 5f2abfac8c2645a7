use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::store::models::{
    DataSource, Flag, JobStream, Order, OrderPaymentMeta, OrderStatus, OrderTransition,
    PaymentStatus, RetryPath,
};
use crate::store::Store;

/// Status of the host's payment-transaction record for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentTransactionStatus {
    Pending,
    Success,
}

/// In-memory store. Production deployments adapt the host platform's
/// database behind the `Store` trait instead.
pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    orders: tokio::sync::RwLock<HashMap<String, Order>>,
    metas: tokio::sync::RwLock<HashMap<String, OrderPaymentMeta>>,
    watermarks: tokio::sync::RwLock<HashMap<JobStream, DateTime<Utc>>>,
    payment_transactions: tokio::sync::RwLock<HashMap<String, PaymentTransactionStatus>>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            orders: tokio::sync::RwLock::new(HashMap::new()),
            metas: tokio::sync::RwLock::new(HashMap::new()),
            watermarks: tokio::sync::RwLock::new(HashMap::new()),
            payment_transactions: tokio::sync::RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert_order(&self, order: Order) {
        let mut orders = self.orders.write().await;
        orders.insert(order.id.clone(), order);
    }

    pub async fn put_meta(&self, meta: OrderPaymentMeta) {
        let mut metas = self.metas.write().await;
        metas.insert(meta.order_id.clone(), meta);
    }

    pub async fn insert_payment_transaction(&self, order_id: &str) {
        let mut txs = self.payment_transactions.write().await;
        txs.insert(order_id.to_string(), PaymentTransactionStatus::Pending);
    }

    pub async fn payment_transaction(&self, order_id: &str) -> Option<PaymentTransactionStatus> {
        let txs = self.payment_transactions.read().await;
        txs.get(order_id).copied()
    }

    async fn update_meta<F>(&self, order_id: &str, apply: F) -> AppResult<()>
    where
        F: FnOnce(&mut OrderPaymentMeta),
    {
        let mut metas = self.metas.write().await;
        let meta = metas
            .entry(order_id.to_string())
            .or_insert_with(|| OrderPaymentMeta::new(order_id));
        apply(meta);
        Ok(())
    }

    /// `processing_completed` anywhere short of `Yes` keeps the record
    /// eligible for further reconciliation.
    async fn is_open(&self, order_id: &str) -> bool {
        let metas = self.metas.read().await;
        metas
            .get(order_id)
            .map(|m| !m.processing_completed.is_yes())
            .unwrap_or(true)
    }

    async fn collect_sorted<F>(&self, keep: F) -> Vec<Order>
    where
        F: Fn(&Order) -> bool,
    {
        let orders = self.orders.read().await;
        let mut found: Vec<Order> = orders.values().filter(|o| keep(o)).cloned().collect();
        found.sort_by(|a, b| b.modified_at().cmp(&a.modified_at()));
        found
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn watermark(&self, stream: JobStream) -> AppResult<DateTime<Utc>> {
        let watermarks = self.watermarks.read().await;
        Ok(watermarks
            .get(&stream)
            .copied()
            .unwrap_or_else(|| self.clock.now() - Duration::days(1)))
    }

    async fn set_watermark(&self, stream: JobStream, at: DateTime<Utc>) -> AppResult<()> {
        let mut watermarks = self.watermarks.write().await;
        watermarks.insert(stream, at);
        Ok(())
    }

    async fn order(&self, order_id: &str) -> AppResult<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(order_id).cloned())
    }

    async fn awaiting_order(&self, payment_id: &str) -> AppResult<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .get(payment_id)
            .filter(|o| o.status.is_awaiting_payment())
            .cloned())
    }

    async fn updated_orders(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Order>> {
        let mut found = self
            .collect_sorted(|o| {
                o.status.is_terminal() && o.modified_at() >= from && o.modified_at() <= to
            })
            .await;
        let mut open = Vec::with_capacity(found.len());
        for order in found.drain(..) {
            if self.is_open(&order.id).await {
                open.push(order);
            }
        }
        Ok(open)
    }

    async fn orders_for_payment_status(&self, status: PaymentStatus) -> AppResult<Vec<Order>> {
        let matching: Vec<String> = {
            let metas = self.metas.read().await;
            metas
                .values()
                .filter(|m| m.payment_status == Some(status) && !m.processing_completed.is_yes())
                .map(|m| m.order_id.clone())
                .collect()
        };
        Ok(self
            .collect_sorted(|o| o.status.is_terminal() && matching.contains(&o.id))
            .await)
    }

    async fn orders_for_status(&self, status: OrderStatus) -> AppResult<Vec<Order>> {
        let mut found = self.collect_sorted(|o| o.status == status).await;
        let mut open = Vec::with_capacity(found.len());
        for order in found.drain(..) {
            if self.is_open(&order.id).await {
                open.push(order);
            }
        }
        Ok(open)
    }

    async fn transient_error_orders(&self) -> AppResult<Vec<Order>> {
        let matching: Vec<String> = {
            let metas = self.metas.read().await;
            metas
                .values()
                .filter(|m| m.transient_error.is_yes() && !m.processing_completed.is_yes())
                .map(|m| m.order_id.clone())
                .collect()
        };
        Ok(self.collect_sorted(|o| matching.contains(&o.id)).await)
    }

    async fn meta(&self, order_id: &str) -> AppResult<OrderPaymentMeta> {
        let mut metas = self.metas.write().await;
        Ok(metas
            .entry(order_id.to_string())
            .or_insert_with(|| OrderPaymentMeta::new(order_id))
            .clone())
    }

    async fn set_payment_status(
        &self,
        order_id: &str,
        status: Option<PaymentStatus>,
    ) -> AppResult<()> {
        self.update_meta(order_id, |m| m.payment_status = status).await
    }

    async fn set_processing_completed(&self, order_id: &str, flag: Flag) -> AppResult<()> {
        self.update_meta(order_id, |m| m.processing_completed = flag)
            .await
    }

    async fn set_transient_error(
        &self,
        order_id: &str,
        flag: Flag,
        retry: Option<RetryPath>,
        code: Option<&str>,
    ) -> AppResult<()> {
        self.update_meta(order_id, |m| {
            m.transient_error = flag;
            m.retry_action = retry;
            m.error_code = code.map(|c| c.to_string());
        })
        .await
    }

    async fn set_hard_error(&self, order_id: &str, flag: Flag) -> AppResult<()> {
        self.update_meta(order_id, |m| m.hard_error = flag).await
    }

    async fn set_data_source(&self, order_id: &str, source: DataSource) -> AppResult<()> {
        self.update_meta(order_id, |m| m.data_source = Some(source))
            .await
    }

    async fn set_txid(&self, order_id: &str, txid: &str) -> AppResult<()> {
        self.update_meta(order_id, |m| m.txid = Some(txid.to_string()))
            .await
    }

    async fn set_addresses(&self, order_id: &str, addresses: serde_json::Value) -> AppResult<()> {
        self.update_meta(order_id, |m| m.addresses = Some(addresses))
            .await
    }

    async fn apply_order_transition(
        &self,
        order_id: &str,
        transition: OrderTransition,
    ) -> AppResult<()> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| AppError::OrderNotFound(order_id.to_string()))?;
        order.status = transition.target_status();
        order.changed_at = Some(self.clock.now());
        info!("order {}: {}", order_id, transition.comment());
        Ok(())
    }

    async fn mark_payment_transaction_succeeded(&self, order_id: &str) -> AppResult<()> {
        let mut txs = self.payment_transactions.write().await;
        if let Some(status) = txs.get_mut(order_id) {
            if *status == PaymentTransactionStatus::Pending {
                *status = PaymentTransactionStatus::Success;
                info!("order {}: payment transaction marked succeeded", order_id);
            }
        }
        Ok(())
    }
}
