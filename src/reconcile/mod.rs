pub mod classifier;
pub mod orders;
pub mod payments;
pub mod retry;
pub mod settlement;
pub mod sweeper;
pub mod sync;

pub use classifier::ErrorClassifier;
pub use orders::OrdersJob;
pub use payments::PaymentsJob;
pub use retry::RetryJob;
pub use settlement::SettlementManager;
pub use sweeper::TimeoutSweeper;
pub use sync::Reconciler;
