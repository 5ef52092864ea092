//! Outcome reports for best-effort provider work.

use std::time::Duration;

use researchhub_common::{ProjectId, Provider, UserId};

/// Direction of a mirror operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorAction {
    /// Grant the member writer access.
    Share,
    /// Take the member's access away.
    Revoke,
}

/// Why a provider was not called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The project owner has not connected this provider.
    NoCredential,
    /// No adapter is registered for the provider.
    NoAdapter,
    /// The project already has a folder on this provider.
    AlreadyLinked,
}

/// Result of the work done against one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOutcome {
    /// The provider accepted the change.
    Applied,
    /// The provider was already in the desired state.
    AlreadyInSync,
    Skipped(SkipReason),
    /// The call failed; the error was logged and absorbed.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReport {
    pub provider: Provider,
    pub outcome: ProviderOutcome,
}

/// Summary of one mirror or provisioning pass.
#[derive(Debug, Clone)]
pub struct MirrorReport {
    pub project_id: ProjectId,
    /// Member concerned, or the owner for provisioning.
    pub user_id: UserId,
    pub providers: Vec<ProviderReport>,
    /// Failure that stopped the pass before any provider was visited.
    pub error: Option<String>,
    pub duration: Duration,
}

impl MirrorReport {
    pub(crate) fn new(project_id: ProjectId, user_id: UserId) -> Self {
        Self {
            project_id,
            user_id,
            providers: Vec::new(),
            error: None,
            duration: Duration::ZERO,
        }
    }

    /// Providers that ended up in the desired state.
    pub fn succeeded(&self) -> usize {
        self.providers
            .iter()
            .filter(|r| {
                matches!(
                    r.outcome,
                    ProviderOutcome::Applied | ProviderOutcome::AlreadyInSync
                )
            })
            .count()
    }

    pub fn failed(&self) -> usize {
        self.providers
            .iter()
            .filter(|r| matches!(r.outcome, ProviderOutcome::Failed(_)))
            .count()
    }

    /// Whether any failure was absorbed during the pass.
    pub fn has_failures(&self) -> bool {
        self.error.is_some() || self.failed() > 0
    }

    pub fn outcome(&self, provider: Provider) -> Option<&ProviderOutcome> {
        self.providers
            .iter()
            .find(|r| r.provider == provider)
            .map(|r| &r.outcome)
    }
}
