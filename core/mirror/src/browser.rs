//! Read-only listing of a project's linked folders.

use std::sync::Arc;
use tracing::debug;

use researchhub_common::{Error, ProjectId, Provider, Result};
use researchhub_credentials::CredentialResolver;
use researchhub_membership::MembershipStore;
use researchhub_storage::{FileEntry, ProviderRegistry};

use crate::config::MirrorConfig;

/// Lists files in a project's provider folder for display.
///
/// Unlike the mirror, errors are returned to the caller.
pub struct FolderBrowser {
    store: Arc<dyn MembershipStore>,
    credentials: CredentialResolver,
    registry: ProviderRegistry,
    config: MirrorConfig,
}

impl FolderBrowser {
    pub fn new(
        store: Arc<dyn MembershipStore>,
        credentials: CredentialResolver,
        registry: ProviderRegistry,
        config: MirrorConfig,
    ) -> Self {
        Self {
            store,
            credentials,
            registry,
            config,
        }
    }

    /// # Errors
    /// - `NotFound` if the project does not exist or has no folder on `provider`
    /// - `FolderNotFound` if the linked folder is gone on the provider side
    /// - `Authentication` if the owner has not connected `provider`
    /// - Any provider error, including `Timeout`
    pub async fn list_files(&self, project_id: &ProjectId, provider: Provider) -> Result<Vec<FileEntry>> {
        let project = self
            .store
            .project(project_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Project {} not found", project_id)))?;

        let link = self
            .store
            .folder_links(project_id)
            .await?
            .into_iter()
            .find(|l| l.provider == provider)
            .ok_or_else(|| {
                Error::NotFound(format!("Project {} has no {} folder", project_id, provider))
            })?;

        let adapter = self
            .registry
            .get(provider)
            .ok_or_else(|| Error::InvalidInput(format!("No adapter registered for {}", provider)))?;

        let token = self
            .credentials
            .access_token(&project.owner_id, provider)
            .await?
            .ok_or_else(|| {
                Error::Authentication(format!(
                    "{} has not connected {}",
                    project.owner_id, provider
                ))
            })?;

        let entries = self
            .config
            .bounded("List files", adapter.list_files(&token, &link.handle()))
            .await?;

        debug!(project_id = %project_id, provider = %provider, count = entries.len(), "Listed folder");
        Ok(entries)
    }
}
