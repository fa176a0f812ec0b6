//! Bounded waits and retries for cross-context calls.

use super::host::{Host, TabInfo, TabStatus};
use crate::config::RetryPolicy;
use crate::error::{RelayError, Result};
use crate::protocol::TabId;
use std::future::Future;
use std::time::Duration;

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempt budget is spent.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 0 {
                    log::info!("{} succeeded on attempt {}", what, attempt + 1);
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                let delay = policy.delay_after(attempt);
                log::warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {}ms",
                    what,
                    attempt + 1,
                    attempts,
                    e,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                log::error!("{} failed after {} attempt(s): {}", what, attempt + 1, e);
                return Err(e);
            }
        }
    }
}

/// Polls the tab until it reports load-complete, bounded by `timeout`.
pub async fn wait_until_complete(
    host: &dyn Host,
    tab: TabId,
    timeout: Duration,
    poll: Duration,
) -> Result<TabInfo> {
    tokio::time::timeout(timeout, poll_until_complete(host, tab, poll))
        .await
        .map_err(|_| RelayError::Timeout(timeout.as_millis() as u64))?
}

async fn poll_until_complete(host: &dyn Host, tab: TabId, poll: Duration) -> Result<TabInfo> {
    loop {
        match host.tab(tab).await? {
            None => return Err(RelayError::NotFound(format!("{} closed while loading", tab))),
            Some(info) if info.status == TabStatus::Complete => return Ok(info),
            Some(_) => {
                log::debug!("{} still loading", tab);
                tokio::time::sleep(poll).await;
            }
        }
    }
}
