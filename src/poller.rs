use std::time::Duration;

use log::{debug, info};
use tokio::time::{sleep, Instant};

use crate::error::AnalysisError;
use crate::remote::{FileState, MediaStore, RemoteFile};

/// Bounds for waiting on server-side processing of an uploaded file.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Multiplier applied to the interval after every check; 1.0 keeps it fixed.
    pub backoff: f64,
    pub max_interval: Duration,
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy {
            interval: Duration::from_secs(1),
            backoff: 1.0,
            max_interval: Duration::from_secs(10),
            max_attempts: 600,
            timeout: Duration::from_secs(600),
        }
    }
}

impl PollPolicy {
    fn next_interval(&self, current: Duration) -> Duration {
        // Non-finite or overflowing products fall back to the cap.
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff.max(1.0))
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }
}

/// Re-fetches `handle` until the service reports it active.
///
/// Fails on a `FAILED` state, or once `max_attempts` re-fetches or `timeout`
/// have been used up.
pub async fn wait_until_ready(
    store: &dyn MediaStore,
    mut handle: RemoteFile,
    policy: &PollPolicy,
) -> Result<RemoteFile, AnalysisError> {
    let started = Instant::now();
    let mut interval = policy.interval;
    let mut attempts = 0;

    loop {
        if handle.is_ready() {
            info!(
                "{} ready after {} check(s) in {:?} (expires {:?})",
                handle.name,
                attempts,
                started.elapsed(),
                handle.expiration_time
            );
            return Ok(handle);
        }
        if handle.state == FileState::Failed {
            return Err(AnalysisError::ProcessingFailed {
                message: handle
                    .error
                    .unwrap_or_else(|| "the service reported FAILED".to_string()),
                name: handle.name,
            });
        }

        if attempts >= policy.max_attempts
            || started.elapsed().saturating_add(interval) > policy.timeout
        {
            return Err(AnalysisError::PollTimeout {
                name: handle.name,
                attempts,
                elapsed: started.elapsed(),
            });
        }

        debug!("{} is {:?}; checking again in {:?}", handle.name, handle.state, interval);
        sleep(interval).await;
        attempts += 1;

        handle = store
            .get_file(&handle.name)
            .await
            .map_err(|source| AnalysisError::Poll {
                name: handle.name.clone(),
                source,
            })?;
        interval = policy.next_interval(interval);
    }
}
