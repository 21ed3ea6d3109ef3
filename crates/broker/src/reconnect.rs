//! Startup reconnection loop.

use std::sync::Arc;
use std::time::Duration;

use crate::{Broker, BrokerError, Connector, Result};

/// How long to wait between connection attempts and when to give up.
///
/// The default retries every 5 seconds forever. [`ReconnectPolicy::exponential`]
/// gives a capped, growing delay and an optional attempt limit.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(5))
    }
}

impl ReconnectPolicy {
    /// Retries forever with a constant delay.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            multiplier: 1.0,
            max_delay: delay,
            max_attempts: None,
        }
    }

    /// Doubles the delay after every failure, capped at `max_delay`.
    pub fn exponential(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            multiplier: 2.0,
            max_delay,
            max_attempts: None,
        }
    }

    /// Limits the number of attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Delay to wait after the given failed attempt (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let delay_ms = self.initial_delay.as_millis() as f64 * factor;
        if !delay_ms.is_finite() || delay_ms >= self.max_delay.as_millis() as f64 {
            return self.max_delay;
        }
        Duration::from_millis(delay_ms as u64)
    }

    /// Returns true if another attempt is allowed after `attempts` failures.
    pub fn allows_attempt(&self, attempts: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempts < max)
    }
}

/// Connects through `connector`, retrying according to `policy`.
///
/// Runs once per component lifecycle, not per message. Returns
/// [`BrokerError::RetriesExhausted`] only when the policy is bounded.
pub async fn connect_with_retry(
    connector: &dyn Connector,
    policy: &ReconnectPolicy,
) -> Result<Arc<dyn Broker>> {
    let target = connector.describe();
    let mut failures: u32 = 0;

    loop {
        match connector.connect().await {
            Ok(broker) => {
                if failures > 0 {
                    tracing::info!(%target, attempts = failures + 1, "broker connection established after retry");
                } else {
                    tracing::info!(%target, "broker connection established");
                }
                metrics::counter!("broker_connections_total", "outcome" => "connected").increment(1);
                return Ok(broker);
            }
            Err(e) => {
                metrics::counter!("broker_connections_total", "outcome" => "failed").increment(1);
                let delay = policy.delay_for_attempt(failures);
                failures += 1;

                if !policy.allows_attempt(failures) {
                    tracing::error!(%target, attempts = failures, error = %e, "giving up on broker connection");
                    return Err(BrokerError::RetriesExhausted {
                        attempts: failures,
                        last_error: e.to_string(),
                    });
                }

                tracing::warn!(
                    %target,
                    attempt = failures,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "broker connection failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryBroker;

    #[test]
    fn default_policy_is_fixed_five_seconds_unbounded() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(5));
        assert!(policy.allows_attempt(u32::MAX - 1));
    }

    #[test]
    fn exponential_policy_is_capped() {
        let policy =
            ReconnectPolicy::exponential(Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(5000), Duration::from_secs(1));
    }

    #[test]
    fn bounded_policy_stops_at_max_attempts() {
        let policy = ReconnectPolicy::fixed(Duration::from_millis(1)).with_max_attempts(3);
        assert!(policy.allows_attempt(2));
        assert!(!policy.allows_attempt(3));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let broker = InMemoryBroker::new();
        broker.set_unavailable(true);

        let policy = ReconnectPolicy::fixed(Duration::from_secs(5)).with_max_attempts(3);
        let result = connect_with_retry(&broker, &policy).await;

        assert!(matches!(
            result,
            Err(BrokerError::RetriesExhausted { attempts: 3, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn connects_once_broker_comes_back() {
        let broker = InMemoryBroker::new();
        broker.set_unavailable(true);

        let restore = broker.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            restore.set_unavailable(false);
        });

        let handle = connect_with_retry(&broker, &ReconnectPolicy::default())
            .await
            .unwrap();
        assert!(handle.is_connected());
    }
}
