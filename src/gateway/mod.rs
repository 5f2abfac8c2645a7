// Payment gateway collaborator. The reconciler consumes this interface
// only; the concrete client (HTTP, SDK, ...) lives with the host.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::store::models::{DataSource, Order};

/// Gateway operations that refund a wallet; a successful one of these
/// marks a token balance as already remediated.
pub const REFUND_FUNC_NAMES: [&str; 2] = ["createAndRefundWallet", "refundWallet"];

/// One token's balance held against an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub chain: String,
    pub addr: String,
    pub balance: Decimal,
}

/// Resolved balance for an order, as returned by the balance lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub id: String,
    #[serde(default)]
    pub addresses: serde_json::Value,
    #[serde(default)]
    pub token_balances: Vec<TokenBalance>,
}

impl PaymentInfo {
    /// Amount of the first (single) token balance, zero when none.
    pub fn resolved_amount(&self) -> Decimal {
        self.token_balances
            .first()
            .map(|b| b.balance)
            .unwrap_or(Decimal::ZERO)
    }
}

/// Gateway-pushed payment event; ids map 1:1 to order ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub addresses: serde_json::Value,
    #[serde(default)]
    pub token_balances: Vec<TokenBalance>,
}

/// Inputs of a gateway-recorded operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationInputs {
    pub token: String,
}

/// A settle/refund attempt recorded by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub func_name: String,
    /// "yes" once the operation succeeded.
    pub status: String,
    pub hash: Option<String>,
    pub chain: String,
    #[serde(default)]
    pub inputs: OperationInputs,
}

impl Operation {
    /// True when this operation is a completed refund of the given
    /// token balance (matching chain and token, success hash present).
    pub fn refunds(&self, balance: &TokenBalance) -> bool {
        self.hash.is_some()
            && self.status == "yes"
            && self.chain == balance.chain
            && self.inputs.token == balance.addr
            && REFUND_FUNC_NAMES.contains(&self.func_name.as_str())
    }
}

/// One page of a cursor-driven gateway listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    /// The cursor for the following page, if the listing continues.
    pub fn next_cursor(&self) -> Option<&str> {
        match self.next_token.as_deref() {
            Some("") | None => None,
            Some(token) => Some(token),
        }
    }
}

/// Receipt of a settle/refund issuance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationReceipt {
    pub txid: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Settle,
    Refund,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Settle => "settle",
            OperationKind::Refund => "refund",
        }
    }
}

#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Aggregate token balance for an order. The reserved error code
    /// `-2` signals balances in more than one token.
    async fn get_token_balance(
        &self,
        order_id: &str,
        hint: Option<&PaymentRecord>,
    ) -> Result<PaymentInfo, GatewayError>;

    async fn settle(
        &self,
        payment: &PaymentInfo,
        order: &Order,
    ) -> Result<OperationReceipt, GatewayError>;

    async fn refund(
        &self,
        payment: &PaymentInfo,
        order_id: &str,
    ) -> Result<OperationReceipt, GatewayError>;

    /// Payments updated since `since`, one page per call.
    async fn list_payments(
        &self,
        since: DateTime<Utc>,
        cursor: Option<&str>,
    ) -> Result<Page<PaymentRecord>, GatewayError>;

    /// Settle/refund operation history for one order, one page per call.
    async fn list_operations(
        &self,
        order_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<Operation>, GatewayError>;

    /// Single payment fetch, used when re-running the payment path for
    /// one order outside a listing sweep.
    async fn get_payment(&self, order_id: &str) -> Result<PaymentRecord, GatewayError>;

    /// Resolve in-flight operations for the given orders to their
    /// terminal statuses. The gateway collaborator owns the status
    /// mapping and the resulting meta updates.
    async fn verify_operation_completion(
        &self,
        orders: &[Order],
        kind: OperationKind,
        source: DataSource,
    ) -> Result<(), GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn balance(chain: &str, addr: &str) -> TokenBalance {
        TokenBalance {
            chain: chain.to_string(),
            addr: addr.to_string(),
            balance: dec!(5),
        }
    }

    #[test]
    fn test_operation_refund_match() {
        let op = Operation {
            func_name: "refundWallet".to_string(),
            status: "yes".to_string(),
            hash: Some("0xabc".to_string()),
            chain: "goerli".to_string(),
            inputs: OperationInputs {
                token: "0xtoken".to_string(),
            },
        };
        assert!(op.refunds(&balance("goerli", "0xtoken")));
        assert!(!op.refunds(&balance("mainnet", "0xtoken")));
        assert!(!op.refunds(&balance("goerli", "0xother")));

        let unconfirmed = Operation { hash: None, ..op.clone() };
        assert!(!unconfirmed.refunds(&balance("goerli", "0xtoken")));

        let wrong_func = Operation {
            func_name: "createWallet".to_string(),
            ..op
        };
        assert!(!wrong_func.refunds(&balance("goerli", "0xtoken")));
    }

    #[test]
    fn test_page_cursor_end_markers() {
        let page = Page::<Operation> {
            results: vec![],
            next_token: Some("".to_string()),
        };
        assert_eq!(page.next_cursor(), None);

        let page = Page::<Operation> {
            results: vec![],
            next_token: Some("abc".to_string()),
        };
        assert_eq!(page.next_cursor(), Some("abc"));
    }

    #[test]
    fn test_resolved_amount_empty() {
        let info = PaymentInfo {
            id: "7".to_string(),
            addresses: serde_json::Value::Null,
            token_balances: vec![],
        };
        assert_eq!(info.resolved_amount(), Decimal::ZERO);
    }
}
