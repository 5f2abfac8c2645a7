//! Reconciles commerce order state against an external payment
//! gateway's ledger, across two independently-scheduled batch jobs that
//! may overlap in time. The host platform supplies the store and
//! gateway collaborators; this crate owns the guard conditions,
//! collision avoidance, error classification and settle/refund
//! completion verification between them.

pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod reconcile;
pub mod scheduler;
pub mod store;

#[cfg(test)]
mod testing;

pub use clock::{Clock, SystemClock};
pub use config::ReconcilerConfig;
pub use context::ReconcileContext;
pub use error::{AppError, AppResult, GatewayError};
pub use gateway::GatewayClient;
pub use reconcile::{OrdersJob, PaymentsJob, Reconciler, RetryJob};
pub use scheduler::JobScheduler;
pub use store::{MemoryStore, Store};
