// Eventual-consistency reconciliation
// The server acknowledges a write before indexing it; the only way to learn
// the write landed is to re-fetch the collection until it grows.

use std::future::Future;
use std::time::Duration;

use crate::error::ApiError;
use crate::models::Paragraph;

/// Bounds for one reconciliation poll
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            interval: Duration::from_millis(2000),
        }
    }
}

impl PollConfig {
    pub fn new(max_attempts: u32, interval_ms: u64) -> Self {
        Self {
            max_attempts,
            interval: Duration::from_millis(interval_ms),
        }
    }
}

/// Terminal state of a poll. `TimedOut` is not a failure: the write was
/// acknowledged, it just has not become visible inside the attempt budget.
#[derive(Debug)]
pub enum PollOutcome {
    Converged(Vec<Paragraph>),
    TimedOut { attempts: u32 },
}

impl PollOutcome {
    pub fn converged(&self) -> bool {
        matches!(self, PollOutcome::Converged(_))
    }
}

/// Re-fetch the collection until it holds more than `baseline` items or the
/// attempt budget runs out.
///
/// Constant interval, no jitter: the total window is short (a few seconds)
/// and contention is a single user's browser-equivalent session. A fetch
/// error spends an attempt and the loop carries on; transient failures while
/// the server is indexing are expected.
pub async fn poll_until_visible<F, Fut>(
    mut fetch: F,
    baseline: usize,
    config: &PollConfig,
) -> PollOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<Paragraph>, ApiError>>,
{
    for attempt in 1..=config.max_attempts {
        tokio::time::sleep(config.interval).await;

        match fetch().await {
            Ok(items) if items.len() > baseline => {
                tracing::debug!(
                    attempt,
                    count = items.len(),
                    baseline,
                    "write became visible"
                );
                return PollOutcome::Converged(items);
            }
            Ok(items) => {
                tracing::debug!(attempt, count = items.len(), baseline, "not yet visible");
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "poll fetch failed");
            }
        }
    }

    tracing::warn!(
        attempts = config.max_attempts,
        baseline,
        "write not visible after polling"
    );
    PollOutcome::TimedOut {
        attempts: config.max_attempts,
    }
}
