//! Shared LLM plumbing: completion options and retry with backoff.
//!
//! Both LLM-backed stages (vision transcription and context enrichment) go
//! through [`with_backoff`]. HTTP 429 / 503 errors are frequent under
//! concurrent load; the wait doubles per attempt (`backoff_ms * 2^attempt`),
//! so 500 ms base with 3 retries waits 500 ms → 1 s → 2 s.

use crate::config::ChunkingConfig;
use edgequake_llm::CompletionOptions;
use std::fmt::Display;
use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::warn;

/// Build `CompletionOptions` from the chunking config.
pub fn build_options(config: &ChunkingConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Outcome of a retried operation.
#[derive(Debug)]
pub struct Attempted<T> {
    pub value: T,
    /// Retries spent before success (0 = first try worked).
    pub retries: u32,
}

/// Run `op` up to `max_retries + 1` times, sleeping between attempts.
///
/// Returns the last error message once every attempt has failed.
pub async fn with_backoff<T, E, F, Fut>(
    label: &str,
    max_retries: u32,
    backoff_ms: u64,
    mut op: F,
) -> Result<Attempted<T>, String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let backoff = backoff_ms.saturating_mul(2u64.saturating_pow(attempt - 1));
            warn!("{label}: retry {attempt}/{max_retries} after {backoff}ms");
            sleep(Duration::from_millis(backoff)).await;
        }

        match op().await {
            Ok(value) => {
                return Ok(Attempted {
                    value,
                    retries: attempt,
                })
            }
            Err(e) => {
                let msg = e.to_string();
                warn!("{label}: attempt {} failed: {msg}", attempt + 1);
                last_err = Some(msg);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| "Unknown error".to_string()))
}
