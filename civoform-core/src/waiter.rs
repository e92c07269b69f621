//! Waiter - Poll until an asynchronous backend transition completes
//!
//! Civo accepts most mutations immediately and finishes them in the
//! background. Resources use [`StateChangeConf`] to wait for a status string
//! (`ACTIVE`, `attached`, `Ready`) and [`poll_until`] for conditions that are
//! not a single status, such as a node pool reaching its node count.

use std::future::Future;
use std::time::Duration;

use log::debug;
use tokio::time::{Instant, sleep};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("unexpected state '{state}', wanted one of: {}", expected.join(", "))]
    UnexpectedState { state: String, expected: Vec<String> },

    #[error("object not found after {checks} consecutive checks")]
    NotFound { checks: u32 },

    #[error("timeout after {timeout:?} (last state: '{}')", last_state.as_deref().unwrap_or("unknown"))]
    Timeout {
        timeout: Duration,
        last_state: Option<String>,
    },

    #[error("error while refreshing state: {0}")]
    Refresh(#[source] BoxError),
}

/// Wait for an object to move from one of `pending` into one of `target`
#[derive(Debug, Clone)]
pub struct StateChangeConf {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub timeout: Duration,
    /// Wait before the first refresh
    pub delay: Duration,
    /// Wait between refreshes
    pub min_timeout: Duration,
    /// Consecutive "not found" results tolerated before giving up
    pub not_found_checks: u32,
}

impl Default for StateChangeConf {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            target: Vec::new(),
            timeout: Duration::from_secs(20 * 60),
            delay: Duration::from_secs(5),
            min_timeout: Duration::from_secs(3),
            not_found_checks: 20,
        }
    }
}

impl StateChangeConf {
    pub fn new(pending: &[&str], target: &[&str]) -> Self {
        Self {
            pending: pending.iter().map(|s| s.to_string()).collect(),
            target: target.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    /// Poll `refresh` until it reports a target state.
    ///
    /// `refresh` yields `None` while the object cannot be found, otherwise
    /// the object together with its current status.
    pub async fn wait_for_state<T, E, F, Fut>(&self, mut refresh: F) -> Result<T, WaitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<(T, String)>, E>>,
        E: Into<BoxError>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut last_state: Option<String> = None;
        let mut not_found = 0u32;

        sleep(self.delay).await;

        loop {
            match refresh().await.map_err(|e| WaitError::Refresh(e.into()))? {
                None => {
                    not_found += 1;
                    debug!("waiting: object not found ({}/{})", not_found, self.not_found_checks);
                    if not_found >= self.not_found_checks {
                        return Err(WaitError::NotFound { checks: not_found });
                    }
                }
                Some((object, state)) => {
                    not_found = 0;
                    if self.target.iter().any(|t| *t == state) {
                        return Ok(object);
                    }
                    if !self.pending.iter().any(|p| *p == state) {
                        return Err(WaitError::UnexpectedState {
                            state,
                            expected: self.target.clone(),
                        });
                    }
                    debug!("waiting: state is '{}', want {:?}", state, self.target);
                    last_state = Some(state);
                }
            }

            if Instant::now() + self.min_timeout > deadline {
                return Err(WaitError::Timeout {
                    timeout: self.timeout,
                    last_state,
                });
            }
            sleep(self.min_timeout).await;
        }
    }
}

/// Call `check` every `interval` until it returns true or `timeout` passes
pub async fn poll_until<E, F, Fut>(
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> Result<(), WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: Into<BoxError>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if check().await.map_err(|e| WaitError::Refresh(e.into()))? {
            return Ok(());
        }
        if Instant::now() + interval > deadline {
            return Err(WaitError::Timeout {
                timeout,
                last_state: None,
            });
        }
        debug!("condition not met, retrying in {:?}", interval);
        sleep(interval).await;
    }
}
