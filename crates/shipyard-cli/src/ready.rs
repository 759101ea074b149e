//! Waiting for freshly provisioned servers to accept connections.
//!
//! A bounded number of probes with exponential backoff between them: the
//! interval doubles after every failure, up to a cap.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct Backoff {
    remaining: u32,
    current: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self {
            remaining: attempts,
            current: interval,
            max: MAX_BACKOFF,
        }
    }

    /// Take one attempt. Returns the delay to wait after it fails, or `None`
    /// when no attempt is left.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        Some(delay)
    }
}

/// Run `probe` until it succeeds or `backoff` is exhausted. Returns the last
/// error on exhaustion.
pub async fn wait_until<F, Fut, E>(what: &str, mut backoff: Backoff, mut probe: F) -> Result<(), E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1u32;
    loop {
        let delay = backoff.next_delay();
        match probe().await {
            Ok(()) => {
                debug!(what, attempt, "ready");
                return Ok(());
            }
            Err(e) => match delay {
                Some(delay) if backoff.remaining > 0 => {
                    debug!(what, attempt, retry_in = ?delay, error = %e, "not ready yet");
                    tokio::time::sleep(delay).await;
                }
                _ => {
                    warn!(what, attempts = attempt, error = %e, "gave up waiting");
                    return Err(e);
                }
            },
        }
        attempt += 1;
    }
}
