//! CLI configuration file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use researchhub_common::Provider;
use researchhub_credentials::OAuthClientConfig;
use researchhub_membership::DomainAllowList;
use researchhub_mirror::{MirrorConfig, DEFAULT_CALL_TIMEOUT};
use researchhub_storage::{DropboxConfig, GDriveConfig};

/// Settings loaded from the `--config` JSON file.
///
/// Every field is optional in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database holding users, projects, memberships and credentials.
    pub database: PathBuf,
    /// Domains invitations are restricted to. Empty allows any domain.
    pub allowed_domains: Vec<String>,
    /// Bound on every provider call and token refresh, in seconds.
    pub call_timeout_secs: u64,
    pub parallel_fanout: bool,
    /// OAuth client registrations keyed by provider (`gdrive`, `dropbox`).
    pub oauth: HashMap<Provider, OAuthClientConfig>,
    pub gdrive: GDriveConfig,
    pub dropbox: DropboxConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("researchhub.db"),
            allowed_domains: Vec::new(),
            call_timeout_secs: DEFAULT_CALL_TIMEOUT.as_secs(),
            parallel_fanout: true,
            oauth: HashMap::new(),
            gdrive: GDriveConfig::default(),
            dropbox: DropboxConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or use defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))?;

        if config.call_timeout_secs == 0 {
            anyhow::bail!("call_timeout_secs must be at least 1");
        }
        Ok(config)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Invitation policy built from `allowed_domains`.
    ///
    /// An empty list leaves invitations open to every domain, which is
    /// logged so operators notice it.
    pub fn email_policy(&self) -> DomainAllowList {
        let policy = DomainAllowList::new(&self.allowed_domains);
        if policy.is_unrestricted() {
            warn!("allowed_domains is empty; invitations accept any email domain");
        }
        policy
    }

    pub fn mirror(&self) -> MirrorConfig {
        MirrorConfig::new()
            .with_call_timeout(self.call_timeout())
            .with_parallel_fanout(self.parallel_fanout)
    }
}
