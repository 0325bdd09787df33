//! Fixed-interval availability polling
//!
//! The server is usually started right before provisioning, so the first
//! calls may hit a closed port or a frontend that is still booting.

use crate::error::{Result, ZabbixError};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

/// Run `probe` every `poll_interval` until it succeeds or `max_wait` has elapsed.
///
/// Each failure is logged and swallowed. No backoff, no jitter.
pub async fn wait_until_ready<F, Fut, T>(
    mut probe: F,
    max_wait: Duration,
    poll_interval: Duration,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    info!("Waiting for the Zabbix API (up to {}s)...", max_wait.as_secs());
    let start = Instant::now();
    let mut attempts = 0u32;

    while start.elapsed() < max_wait {
        attempts += 1;
        match probe().await {
            Ok(value) => {
                info!("API available after {} attempt(s)", attempts);
                return Ok(value);
            }
            Err(e) => warn!(attempt = attempts, "API not ready: {}", e),
        }
        sleep(poll_interval).await;
    }

    Err(ZabbixError::Timeout {
        waited: start.elapsed(),
        attempts,
    })
}
