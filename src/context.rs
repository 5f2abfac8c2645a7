use std::sync::Arc;

use crate::clock::Clock;
use crate::config::ReconcilerConfig;
use crate::gateway::GatewayClient;
use crate::store::Store;

/// Shared dependencies handed to every component: the local store, the
/// gateway client, a time source and the tuning config. The host builds
/// one of these and passes it to the jobs or the scheduler.
#[derive(Clone)]
pub struct ReconcileContext {
    pub store: Arc<dyn Store>,
    pub gateway: Arc<dyn GatewayClient>,
    pub clock: Arc<dyn Clock>,
    pub config: ReconcilerConfig,
}

impl ReconcileContext {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn GatewayClient>,
        clock: Arc<dyn Clock>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            clock,
            config,
        }
    }
}
