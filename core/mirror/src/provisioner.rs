//! Project folder provisioning at project creation.

use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use researchhub_common::{Error, Provider, Result};
use researchhub_credentials::CredentialResolver;
use researchhub_membership::{ExternalFolderLink, MembershipStore, Project};
use researchhub_storage::ProviderRegistry;

use crate::config::MirrorConfig;
use crate::report::{MirrorReport, ProviderOutcome, ProviderReport, SkipReason};

/// Creates a provider folder for a new project and records the link.
pub struct FolderProvisioner {
    store: Arc<dyn MembershipStore>,
    credentials: CredentialResolver,
    registry: ProviderRegistry,
    config: MirrorConfig,
}

impl FolderProvisioner {
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

    /// Create a folder on every provider the owner has connected.
    ///
    /// Never fails: a provider that errors is logged and reported, and the
    /// remaining providers are still attempted.
    pub async fn provision(&self, project: &Project) -> MirrorReport {
        let start = Instant::now();
        let mut report = MirrorReport::new(project.id.clone(), project.owner_id.clone());

        for provider in self.registry.providers() {
            let outcome = match self.provision_one(project, provider).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(
                        project_id = %project.id,
                        user_id = %project.owner_id,
                        provider = %provider,
                        error = %e,
                        "Folder provisioning failed"
                    );
                    ProviderOutcome::Failed(e.to_string())
                }
            };
            report.providers.push(ProviderReport { provider, outcome });
        }

        report.duration = start.elapsed();
        report
    }

    /// Create and link the project's folder on one provider.
    ///
    /// # Errors
    /// - `Conflict` if the project already has a folder on `provider`
    /// - `InvalidInput` if no adapter is registered for `provider`
    /// - `Authentication` if the owner has not connected `provider`
    /// - Any provider error from folder creation
    pub async fn link_folder(&self, project: &Project, provider: Provider) -> Result<ExternalFolderLink> {
        self.ensure_unlinked(project, provider).await?;

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

        let folder = self
            .config
            .bounded("Create folder", adapter.create_folder(&token, &project.title))
            .await?;

        let link = ExternalFolderLink::new(project.id.clone(), provider, folder);
        if let Err(e) = self.store.attach_folder_link(&link).await {
            // The provider folder exists but nothing points at it any more.
            warn!(
                project_id = %project.id,
                provider = %provider,
                folder_id = %link.folder_id,
                folder_url = %link.folder_url,
                error = %e,
                "Created folder could not be linked and is orphaned"
            );
            return Err(e);
        }

        info!(
            project_id = %project.id,
            provider = %provider,
            folder_id = %link.folder_id,
            "Linked project folder"
        );
        Ok(link)
    }

    async fn provision_one(&self, project: &Project, provider: Provider) -> Result<ProviderOutcome> {
        if self
            .store
            .folder_links(&project.id)
            .await?
            .iter()
            .any(|l| l.provider == provider)
        {
            return Ok(ProviderOutcome::Skipped(SkipReason::AlreadyLinked));
        }

        if self
            .credentials
            .store()
            .get(&project.owner_id, provider)
            .await?
            .is_none()
        {
            return Ok(ProviderOutcome::Skipped(SkipReason::NoCredential));
        }

        self.link_folder(project, provider).await?;
        Ok(ProviderOutcome::Applied)
    }

    async fn ensure_unlinked(&self, project: &Project, provider: Provider) -> Result<()> {
        let links = self.store.folder_links(&project.id).await?;
        if links.iter().any(|l| l.provider == provider) {
            return Err(Error::Conflict(format!(
                "Project {} already has a {} folder",
                project.id, provider
            )));
        }
        Ok(())
    }
}
