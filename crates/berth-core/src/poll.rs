//! Generic readiness polling.
//!
//! A cooperative sleep-loop on the invoking task: sleep, observe, test the
//! predicate, repeat. The sleep comes before every observation including
//! the first, so the first value is never an instantaneous snapshot taken
//! while the platform is still acknowledging the triggering request.
//!
//! Transport failures from an observation propagate immediately; only
//! status convergence is retried, never errors.

use std::time::Duration;

use crate::error::{DeployError, Result};

/// Polling cadence and optional deadline.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay before every observation
    pub interval: Duration,
    /// Upper bound on the total wait; `None` blocks until convergence
    pub deadline: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            interval: Duration::from_millis(3000),
            deadline: None,
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration, deadline: Option<Duration>) -> Self {
        PollConfig { interval, deadline }
    }
}

/// Repeatedly observe a fresh value until the predicate holds.
///
/// Invokes `indicator` with the attempt count before each observation so
/// callers can surface progress. Returns the first satisfying value, or
/// `TimedOut` once the configured deadline (if any) is exhausted.
pub async fn poll_until<T, F, Fut, P>(
    config: &PollConfig,
    mut poll: F,
    mut predicate: P,
    indicator: &mut dyn FnMut(u32),
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: FnMut(&T) -> bool,
{
    let mut waited = Duration::ZERO;
    let mut attempt: u32 = 0;

    loop {
        if let Some(deadline) = config.deadline
            && waited >= deadline
        {
            return Err(DeployError::TimedOut { waited });
        }

        tokio::time::sleep(config.interval).await;
        waited += config.interval;
        attempt += 1;
        indicator(attempt);

        let value = poll().await?;
        if predicate(&value) {
            return Ok(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn fast_config() -> PollConfig {
        PollConfig::new(Duration::from_millis(10), None)
    }

    #[tokio::test(start_paused = true)]
    async fn polls_at_least_once_even_when_immediately_satisfied() {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = calls.clone();
        let mut ticks = 0;

        let value = poll_until(
            &fast_config(),
            move || {
                let counted = counted.clone();
                async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                }
            },
            |v| *v == 42,
            &mut |_| ticks += 1,
        )
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(ticks, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_before_the_first_observation() {
        let start = Instant::now();

        poll_until(
            &fast_config(),
            || async { Ok(()) },
            |_| true,
            &mut |_| {},
        )
        .await
        .unwrap();

        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn returns_the_first_satisfying_value() {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = calls.clone();

        let value = poll_until(
            &fast_config(),
            move || {
                let counted = counted.clone();
                async move { Ok(counted.fetch_add(1, Ordering::SeqCst) + 1) }
            },
            |v| *v >= 3,
            &mut |_| {},
        )
        .await
        .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_produces_a_timed_out_error() {
        let config = PollConfig::new(Duration::from_millis(10), Some(Duration::from_millis(35)));

        let err = poll_until(
            &config,
            || async { Ok(0u32) },
            |_| false,
            &mut |_| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DeployError::TimedOut { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_propagate_instead_of_retrying() {
        let calls = Arc::new(AtomicU32::new(0));
        let counted = calls.clone();

        let err = poll_until(
            &fast_config(),
            move || {
                let counted = counted.clone();
                async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>(DeployError::Provider {
                        status: 503,
                        message: "throttled".to_string(),
                    })
                }
            },
            |_| true,
            &mut |_| {},
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DeployError::Provider { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
