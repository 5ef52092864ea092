//! Configuration for mirroring and provisioning.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use researchhub_common::{Error, Result};

/// Default bound on a single provider call or token refresh.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(8);

/// Configuration for the access mirror, provisioner and browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Upper bound for each provider call.
    pub call_timeout: Duration,
    /// Visit providers concurrently instead of one after another.
    pub parallel_fanout: bool,
}

impl MirrorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-call timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Enable or disable concurrent per-provider fan-out.
    pub fn with_parallel_fanout(mut self, parallel: bool) -> Self {
        self.parallel_fanout = parallel;
        self
    }

    /// Run `call` under the per-call timeout.
    pub(crate) async fn bounded<T, F>(&self, what: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "{} exceeded {:?}",
                what, self.call_timeout
            ))),
        }
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            parallel_fanout: true,
        }
    }
}
