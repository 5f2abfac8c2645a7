use chrono::Duration;

/// Reconciler tuning knobs. Defaults match the gateway operator's
/// recommended cron setup; every value can be overridden from the
/// environment.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Window after a meta update during which the other job defers.
    pub collision_window: Duration,
    /// Cutoff after which an unpaid pending order is failed.
    pub await_payment_cutoff: Duration,
    /// Courtesy pause before each settle/refund call.
    pub issue_pacing: std::time::Duration,
    /// Interval between orders-job runs.
    pub orders_interval: std::time::Duration,
    /// Interval between payments-job runs.
    pub payments_interval: std::time::Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            collision_window: Duration::minutes(10),
            await_payment_cutoff: Duration::minutes(24 * 60),
            issue_pacing: std::time::Duration::from_millis(300),
            orders_interval: std::time::Duration::from_secs(300),
            payments_interval: std::time::Duration::from_secs(300),
        }
    }
}

impl ReconcilerConfig {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            collision_window: env_minutes(
                "RECONCILER_COLLISION_WINDOW_MINUTES",
                defaults.collision_window,
            )?,
            await_payment_cutoff: env_minutes(
                "RECONCILER_AWAIT_PAYMENT_MINUTES",
                defaults.await_payment_cutoff,
            )?,
            issue_pacing: env_millis("RECONCILER_ISSUE_PACING_MS", defaults.issue_pacing)?,
            orders_interval: env_secs("RECONCILER_ORDERS_INTERVAL_SECS", defaults.orders_interval)?,
            payments_interval: env_secs(
                "RECONCILER_PAYMENTS_INTERVAL_SECS",
                defaults.payments_interval,
            )?,
        })
    }
}

fn env_minutes(name: &str, default: Duration) -> Result<Duration, config::ConfigError> {
    match std::env::var(name) {
        Ok(raw) => {
            let minutes: i64 = raw
                .parse()
                .map_err(|_| config::ConfigError::Message(format!("{} must be an integer", name)))?;
            Ok(Duration::minutes(minutes))
        }
        Err(_) => Ok(default),
    }
}

fn env_millis(
    name: &str,
    default: std::time::Duration,
) -> Result<std::time::Duration, config::ConfigError> {
    match std::env::var(name) {
        Ok(raw) => {
            let millis: u64 = raw
                .parse()
                .map_err(|_| config::ConfigError::Message(format!("{} must be an integer", name)))?;
            Ok(std::time::Duration::from_millis(millis))
        }
        Err(_) => Ok(default),
    }
}

fn env_secs(
    name: &str,
    default: std::time::Duration,
) -> Result<std::time::Duration, config::ConfigError> {
    match std::env::var(name) {
        Ok(raw) => {
            let secs: u64 = raw
                .parse()
                .map_err(|_| config::ConfigError::Message(format!("{} must be an integer", name)))?;
            Ok(std::time::Duration::from_secs(secs))
        }
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReconcilerConfig::default();
        assert_eq!(config.collision_window, Duration::minutes(10));
        assert_eq!(config.await_payment_cutoff, Duration::minutes(1440));
        assert_eq!(config.issue_pacing, std::time::Duration::from_millis(300));
    }
}
