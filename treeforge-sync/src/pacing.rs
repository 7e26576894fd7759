//! Rate pacing and transient-fault retry around any [`HostingClient`].
//!
//! [`PacedClient`] pauses before every write-class call (repository create,
//! branch create, file put) so a batch never bursts the host's secondary rate
//! limits, and repeats calls that failed with a retryable transport error.
//! Reads are not paced. Pauses go through a [`Sleeper`] so tests can observe
//! them without waiting.

use std::sync::Arc;
use std::time::Duration;

use treeforge_core::HostConfig;

use crate::error::HostError;
use crate::host::{HostingClient, RemoteFileHandle, RemoteRef, RepoRef, Visibility};

/// Something that can block the current thread.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Real wall-clock sleeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Bounded retry of transient failures with doubling backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        RetryPolicy {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(1u32 << attempt.min(16))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Pacing + retry decorator.
pub struct PacedClient<C> {
    inner: C,
    pacing: Duration,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl<C> PacedClient<C> {
    pub fn new(inner: C, pacing: Duration, retry: RetryPolicy) -> Self {
        PacedClient {
            inner,
            pacing,
            retry,
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    /// Pacing and retry settings taken from the host configuration.
    pub fn from_config(inner: C, config: &HostConfig) -> Self {
        let retry = RetryPolicy {
            max_retries: config.max_retries,
            backoff: config.retry_backoff(),
        };
        Self::new(inner, config.pacing(), retry)
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn call<T>(
        &self,
        op: &'static str,
        write: bool,
        f: impl Fn(&C) -> Result<T, HostError>,
    ) -> Result<T, HostError> {
        let mut attempt = 0;
        loop {
            if write && !self.pacing.is_zero() {
                self.sleeper.sleep(self.pacing);
            }
            match f(&self.inner) {
                Err(err) if err.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    attempt += 1;
                    tracing::warn!(
                        "{op}: {err}; retry {attempt}/{} in {}ms",
                        self.retry.max_retries,
                        delay.as_millis()
                    );
                    if !delay.is_zero() {
                        self.sleeper.sleep(delay);
                    }
                }
                other => return other,
            }
        }
    }
}

impl<C: HostingClient> HostingClient for PacedClient<C> {
    fn repository_exists(&self, name: &str) -> Result<bool, HostError> {
        self.call("repository_exists", false, |c| c.repository_exists(name))
    }

    fn default_branch(&self, repository: &str) -> Result<String, HostError> {
        self.call("default_branch", false, |c| c.default_branch(repository))
    }

    fn create_repository(
        &self,
        name: &str,
        description: &str,
        visibility: Visibility,
    ) -> Result<RepoRef, HostError> {
        self.call("create_repository", true, |c| {
            c.create_repository(name, description, visibility)
        })
    }

    fn get_branch_ref(&self, repository: &str, branch: &str) -> Result<RemoteRef, HostError> {
        self.call("get_branch_ref", false, |c| c.get_branch_ref(repository, branch))
    }

    fn create_branch_ref(
        &self,
        repository: &str,
        branch: &str,
        from_sha: &str,
    ) -> Result<(), HostError> {
        self.call("create_branch_ref", true, |c| {
            c.create_branch_ref(repository, branch, from_sha)
        })
    }

    fn get_file_handle(
        &self,
        repository: &str,
        path: &str,
        branch: &str,
    ) -> Result<RemoteFileHandle, HostError> {
        self.call("get_file_handle", false, |c| {
            c.get_file_handle(repository, path, branch)
        })
    }

    fn put_file(
        &self,
        repository: &str,
        path: &str,
        content: &[u8],
        branch: &str,
        prior: Option<&RemoteFileHandle>,
    ) -> Result<(), HostError> {
        self.call("put_file", true, |c| {
            c.put_file(repository, path, content, branch, prior)
        })
    }

    fn web_url(&self, repository: &str) -> String {
        self.inner.web_url(repository)
    }
}
