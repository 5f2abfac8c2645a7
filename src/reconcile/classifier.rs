use std::sync::Arc;
use tracing::{error, warn};

use crate::error::AppResult;
use crate::store::models::{Flag, RetryPath};
use crate::store::Store;

/// Records and clears per-order error flags. A transient error blocks
/// automated processing until the tagged sync path succeeds again; a
/// hard error blocks both paths until cleared externally.
pub struct ErrorClassifier {
    store: Arc<dyn Store>,
}

impl ErrorClassifier {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Flag a retryable failure, scoped to the sync path allowed to
    /// retry it.
    pub async fn log_transient(
        &self,
        order_id: &str,
        retry: RetryPath,
        code: &str,
        message: &str,
    ) -> AppResult<()> {
        warn!(
            "order {}: transient error {} ({}): {}",
            order_id, code, retry, message
        );
        self.store
            .set_transient_error(order_id, Flag::Yes, Some(retry), Some(code))
            .await
    }

    /// Drop the transient flag after the tagged path succeeded.
    pub async fn clear_transient(&self, order_id: &str) -> AppResult<()> {
        self.store
            .set_transient_error(order_id, Flag::No, None, None)
            .await
    }

    /// Flag a permanent failure. Only manual intervention clears it.
    pub async fn log_hard(&self, order_id: &str, code: &str, message: &str) -> AppResult<()> {
        error!("order {}: hard error {}: {}", order_id, code, message);
        self.store.set_hard_error(order_id, Flag::Yes).await
    }
}
