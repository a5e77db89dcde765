use std::time::Duration;
use log::warn;

use super::{ ChatClient, CompletionResponse, ProviderError };
use crate::cli::Args;

const MAX_BACKOFF: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts made after the first one.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn from_args(args: &Args) -> Self {
        Self {
            max_retries: args.chat_max_retries,
            initial_backoff: Duration::from_millis(args.chat_retry_backoff_ms),
            max_backoff: MAX_BACKOFF,
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based). Doubles each time up to `max_backoff`.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1u32 << exp).min(self.max_backoff)
    }
}

/// Calls the provider, retrying transient failures with exponential backoff.
/// Dropping the returned future cancels both the in-flight call and any pending sleep.
pub async fn complete_with_retry(
    client: &dyn ChatClient,
    contents: &[String],
    policy: &RetryPolicy
) -> Result<CompletionResponse, ProviderError> {
    let mut retry = 0;
    loop {
        match client.complete(contents).await {
            Ok(resp) => {
                return Ok(resp);
            }
            Err(e) if e.is_transient() && retry < policy.max_retries => {
                retry += 1;
                let delay = policy.backoff_for(retry);
                warn!(
                    "Provider call failed ({}), retry {}/{} after {:?}",
                    e,
                    retry,
                    policy.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return Err(e);
            }
        }
    }
}
