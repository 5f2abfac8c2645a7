// Shared test doubles: scripted gateway, in-memory store, manual clock.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::clock::ManualClock;
use crate::config::ReconcilerConfig;
use crate::context::ReconcileContext;
use crate::error::GatewayError;
use crate::gateway::{
    GatewayClient, Operation, OperationKind, OperationReceipt, Page, PaymentInfo, PaymentRecord,
};
use crate::store::models::{DataSource, Order, OrderStatus};
use crate::store::MemoryStore;

pub fn order_at(id: &str, status: OrderStatus, changed: DateTime<Utc>) -> Order {
    Order {
        id: id.to_string(),
        status,
        total: dec!(100),
        created_at: changed - chrono::Duration::hours(1),
        changed_at: Some(changed),
    }
}

pub fn payment_record(id: &str, updated_at: DateTime<Utc>) -> PaymentRecord {
    PaymentRecord {
        id: id.to_string(),
        updated_at,
        addresses: serde_json::json!({ "goerli": "0xdeposit" }),
        token_balances: vec![],
    }
}

/// Scripted gateway double. Every call is counted so tests can assert
/// that guarded paths never reach the gateway at all.
pub struct MockGateway {
    balances: Mutex<HashMap<String, Result<PaymentInfo, GatewayError>>>,
    payments: Mutex<HashMap<String, PaymentRecord>>,
    payment_pages: Mutex<VecDeque<Result<Page<PaymentRecord>, GatewayError>>>,
    operation_pages: Mutex<HashMap<String, VecDeque<Page<Operation>>>>,
    settle_result: Mutex<Result<OperationReceipt, GatewayError>>,
    refund_result: Mutex<Result<OperationReceipt, GatewayError>>,
    refund_payments: Mutex<Vec<PaymentInfo>>,
    settle_count: Mutex<u32>,
    verify_count: Mutex<u32>,
    call_count: Mutex<u32>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            payments: Mutex::new(HashMap::new()),
            payment_pages: Mutex::new(VecDeque::new()),
            operation_pages: Mutex::new(HashMap::new()),
            settle_result: Mutex::new(Ok(OperationReceipt { txid: None })),
            refund_result: Mutex::new(Ok(OperationReceipt { txid: None })),
            refund_payments: Mutex::new(Vec::new()),
            settle_count: Mutex::new(0),
            verify_count: Mutex::new(0),
            call_count: Mutex::new(0),
        }
    }

    pub fn set_balance(&self, order_id: &str, result: Result<PaymentInfo, GatewayError>) {
        self.balances.lock().insert(order_id.to_string(), result);
    }

    pub fn set_payment(&self, order_id: &str, payment: PaymentRecord) {
        self.payments.lock().insert(order_id.to_string(), payment);
    }

    pub fn push_payments_page(&self, page: Result<Page<PaymentRecord>, GatewayError>) {
        self.payment_pages.lock().push_back(page);
    }

    pub fn push_operations_page(&self, order_id: &str, page: Page<Operation>) {
        self.operation_pages
            .lock()
            .entry(order_id.to_string())
            .or_default()
            .push_back(page);
    }

    pub fn set_settle_result(&self, result: Result<OperationReceipt, GatewayError>) {
        *self.settle_result.lock() = result;
    }

    pub fn set_refund_result(&self, result: Result<OperationReceipt, GatewayError>) {
        *self.refund_result.lock() = result;
    }

    pub fn total_calls(&self) -> u32 {
        *self.call_count.lock()
    }

    pub fn settle_calls(&self) -> u32 {
        *self.settle_count.lock()
    }

    pub fn refund_calls(&self) -> u32 {
        self.refund_payments.lock().len() as u32
    }

    pub fn last_refund_payment(&self) -> Option<PaymentInfo> {
        self.refund_payments.lock().last().cloned()
    }

    pub fn verify_calls(&self) -> u32 {
        *self.verify_count.lock()
    }

    fn record_call(&self) {
        *self.call_count.lock() += 1;
    }
}

#[async_trait]
impl GatewayClient for MockGateway {
    async fn get_token_balance(
        &self,
        order_id: &str,
        _hint: Option<&PaymentRecord>,
    ) -> Result<PaymentInfo, GatewayError> {
        self.record_call();
        self.balances
            .lock()
            .get(order_id)
            .cloned()
            .unwrap_or_else(|| {
                Ok(PaymentInfo {
                    id: order_id.to_string(),
                    addresses: serde_json::Value::Null,
                    token_balances: vec![],
                })
            })
    }

    async fn settle(
        &self,
        _payment: &PaymentInfo,
        _order: &Order,
    ) -> Result<OperationReceipt, GatewayError> {
        self.record_call();
        *self.settle_count.lock() += 1;
        self.settle_result.lock().clone()
    }

    async fn refund(
        &self,
        payment: &PaymentInfo,
        _order_id: &str,
    ) -> Result<OperationReceipt, GatewayError> {
        self.record_call();
        self.refund_payments.lock().push(payment.clone());
        self.refund_result.lock().clone()
    }

    async fn list_payments(
        &self,
        _since: DateTime<Utc>,
        _cursor: Option<&str>,
    ) -> Result<Page<PaymentRecord>, GatewayError> {
        self.record_call();
        self.payment_pages.lock().pop_front().unwrap_or_else(|| {
            Ok(Page {
                results: vec![],
                next_token: None,
            })
        })
    }

    async fn list_operations(
        &self,
        order_id: &str,
        _cursor: Option<&str>,
    ) -> Result<Page<Operation>, GatewayError> {
        self.record_call();
        Ok(self
            .operation_pages
            .lock()
            .get_mut(order_id)
            .and_then(|pages| pages.pop_front())
            .unwrap_or(Page {
                results: vec![],
                next_token: None,
            }))
    }

    async fn get_payment(&self, order_id: &str) -> Result<PaymentRecord, GatewayError> {
        self.record_call();
        self.payments
            .lock()
            .get(order_id)
            .cloned()
            .ok_or_else(|| GatewayError::new(404, format!("payment {} not found", order_id)))
    }

    async fn verify_operation_completion(
        &self,
        _orders: &[Order],
        _kind: OperationKind,
        _source: DataSource,
    ) -> Result<(), GatewayError> {
        self.record_call();
        *self.verify_count.lock() += 1;
        Ok(())
    }
}

pub struct TestHarness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<MockGateway>,
    pub config: ReconcilerConfig,
}

impl TestHarness {
    pub fn ctx(&self) -> ReconcileContext {
        ReconcileContext::new(
            self.store.clone(),
            self.gateway.clone(),
            self.clock.clone(),
            self.config.clone(),
        )
    }
}

pub fn test_context() -> TestHarness {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
    ));
    let store = Arc::new(MemoryStore::new(clock.clone()));
    let gateway = Arc::new(MockGateway::new());
    let config = ReconcilerConfig {
        // tests should not sleep
        issue_pacing: std::time::Duration::ZERO,
        ..ReconcilerConfig::default()
    };
    TestHarness {
        clock,
        store,
        gateway,
        config,
    }
}
