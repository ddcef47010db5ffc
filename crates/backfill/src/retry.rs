use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::FatalError;


/// Fixed-delay retry discipline for per-token fetch operations.
///
/// The batch job favors eventual completion over fast failure, so the
/// default policy retries without an attempt bound. A bounded policy
/// surfaces exhaustion as a fatal error instead of looping forever.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub delay: Duration,
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn unbounded(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    pub fn bounded(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts: Some(max_attempts),
        }
    }

    /// Runs `op` until it succeeds, sleeping the fixed delay between
    /// attempts. With an attempt bound, the last error is wrapped into
    /// [`FatalError::RetriesExhausted`].
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt = attempt.saturating_add(1);
                    if let Some(max) = self.max_attempts {
                        if attempt >= max {
                            return Err(FatalError::RetriesExhausted {
                                operation: operation.to_string(),
                                attempts: attempt,
                                source: err,
                            }
                            .into());
                        }
                    }
                    warn!(
                        error = format!("{:#}", err),
                        "{} failed, will retry in {} seconds",
                        operation,
                        self.delay.as_secs()
                    );
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}
