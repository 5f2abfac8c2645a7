use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reserved gateway code: balance is split across more than one token.
/// Not a failure, a business state awaiting resolution.
pub const MULTI_TOKEN_BALANCE: i32 = -2;

/// Transient error codes recorded on the order meta.
pub mod codes {
    /// payments job deferred to a recent orders-job update
    pub const PAYMENT_COLLISION_DEFER: &str = "E102";
    /// settle issuance failed at the gateway
    pub const SETTLE_FAILED: &str = "E103";
    /// orders job deferred to a recent payments-job update
    pub const ORDER_COLLISION_DEFER: &str = "E200";
    /// refund issuance failed at the gateway
    pub const REFUND_FAILED: &str = "E205";
}

/// Non-success response from the payment gateway.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[error("gateway error {code}: {message}")]
pub struct GatewayError {
    pub code: i32,
    pub message: String,
}

impl GatewayError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// True for the reserved multi-token business-state code.
    pub fn is_multi_token(&self) -> bool {
        self.code == MULTI_TOKEN_BALANCE
    }
}

/// Top-level error type for the reconciler
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(format!("Error converting: {:?}", error))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error.to_string())
    }
}

/// Result type alias for the reconciler
pub type AppResult<T> = Result<T, AppError>;
