//! Access mirror: projects membership changes onto provider folder sharing.
//!
//! Mirroring is best-effort. The membership row is the source of truth and
//! has already been committed when the mirror runs; nothing here can fail
//! or roll back the transition. Provider failures are logged with
//! project, user and provider context and then dropped. There is no retry
//! queue: a missed share or revoke is corrected by the next lifecycle
//! event for that member or by [`AccessMirror::resync`].

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use researchhub_common::{Email, Error, ProjectId, Result, UserId};
use researchhub_credentials::CredentialResolver;
use researchhub_membership::{
    ExternalFolderLink, LifecycleEvent, LifecycleEventKind, LifecycleListener, MembershipStatus,
    MembershipStore, Project, UserDirectory,
};
use researchhub_storage::{PermissionLevel, ProviderRegistry};

use crate::config::MirrorConfig;
use crate::report::{MirrorAction, MirrorReport, ProviderOutcome, ProviderReport, SkipReason};

/// Everything needed to touch providers for one member.
struct MirrorPlan {
    project: Project,
    links: Vec<ExternalFolderLink>,
    user_id: UserId,
    email: Email,
}

/// Keeps provider folder permissions in step with membership status.
///
/// Sharing is done with the project owner's credentials, since the owner
/// created and owns the linked folders.
pub struct AccessMirror {
    store: Arc<dyn MembershipStore>,
    directory: Arc<dyn UserDirectory>,
    credentials: CredentialResolver,
    registry: ProviderRegistry,
    config: MirrorConfig,
}

impl AccessMirror {
    pub fn new(
        store: Arc<dyn MembershipStore>,
        directory: Arc<dyn UserDirectory>,
        credentials: CredentialResolver,
        registry: ProviderRegistry,
        config: MirrorConfig,
    ) -> Self {
        Self {
            store,
            directory,
            credentials,
            registry,
            config,
        }
    }

    /// Share every linked folder with a newly active member.
    pub async fn on_approved(&self, project_id: &ProjectId, user_id: &UserId) -> MirrorReport {
        self.mirror(project_id, user_id, MirrorAction::Share).await
    }

    /// Revoke a removed member's access to every linked folder.
    pub async fn on_removed(&self, project_id: &ProjectId, user_id: &UserId) -> MirrorReport {
        self.mirror(project_id, user_id, MirrorAction::Revoke).await
    }

    /// Re-apply the mirror for a member's current status.
    ///
    /// ACTIVE members are shared, REJECTED and LEFT members revoked.
    /// Returns `None` for a PENDING member, who has no external access
    /// either way.
    ///
    /// # Errors
    /// - `NotFound` if the member has no row on the project
    pub async fn resync(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
    ) -> Result<Option<MirrorReport>> {
        let membership = self
            .store
            .membership(project_id, user_id)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "No membership for {} on project {}",
                    user_id, project_id
                ))
            })?;

        let action = match membership.status {
            MembershipStatus::Active => MirrorAction::Share,
            MembershipStatus::Rejected | MembershipStatus::Left => MirrorAction::Revoke,
            MembershipStatus::Pending => return Ok(None),
        };

        info!(project_id = %project_id, user_id = %user_id, action = ?action, "Resyncing member access");
        Ok(Some(self.mirror(project_id, user_id, action).await))
    }

    async fn mirror(&self, project_id: &ProjectId, user_id: &UserId, action: MirrorAction) -> MirrorReport {
        let start = Instant::now();
        let mut report = MirrorReport::new(project_id.clone(), user_id.clone());

        let plan = match self.plan(project_id, user_id).await {
            Ok(plan) => plan,
            Err(e) => {
                warn!(
                    project_id = %project_id,
                    user_id = %user_id,
                    error = %e,
                    "Access mirror could not start"
                );
                report.error = Some(e.to_string());
                report.duration = start.elapsed();
                return report;
            }
        };

        if plan.links.is_empty() {
            debug!(project_id = %project_id, "No linked folders to mirror");
        }

        report.providers = if self.config.parallel_fanout {
            join_all(plan.links.iter().map(|link| self.apply(&plan, link, action))).await
        } else {
            let mut reports = Vec::with_capacity(plan.links.len());
            for link in &plan.links {
                reports.push(self.apply(&plan, link, action).await);
            }
            reports
        };
        report.duration = start.elapsed();

        info!(
            project_id = %project_id,
            user_id = %user_id,
            action = ?action,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Access mirror finished in {:?}",
            report.duration
        );
        report
    }

    async fn plan(&self, project_id: &ProjectId, user_id: &UserId) -> Result<MirrorPlan> {
        let project = self
            .store
            .project(project_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Project {} not found", project_id)))?;

        let links = self.store.folder_links(project_id).await?;

        let user = self
            .directory
            .user(user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("User {} not found", user_id)))?;

        Ok(MirrorPlan {
            project,
            links,
            user_id: user.id,
            email: user.email,
        })
    }

    /// Mirror onto one provider. Never fails; failures become the outcome.
    async fn apply(&self, plan: &MirrorPlan, link: &ExternalFolderLink, action: MirrorAction) -> ProviderReport {
        let provider = link.provider;
        let outcome = match self.call_provider(plan, link, action).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_provider_error() => {
                warn!(
                    project_id = %plan.project.id,
                    user_id = %plan.user_id,
                    provider = %provider,
                    action = ?action,
                    error = %e,
                    "Access mirror call failed"
                );
                ProviderOutcome::Failed(e.to_string())
            }
            Err(e) => {
                error!(
                    project_id = %plan.project.id,
                    user_id = %plan.user_id,
                    provider = %provider,
                    action = ?action,
                    error = %e,
                    "Access mirror aborted by local failure"
                );
                ProviderOutcome::Failed(e.to_string())
            }
        };

        ProviderReport { provider, outcome }
    }

    async fn call_provider(
        &self,
        plan: &MirrorPlan,
        link: &ExternalFolderLink,
        action: MirrorAction,
    ) -> Result<ProviderOutcome> {
        let provider = link.provider;
        let Some(adapter) = self.registry.get(provider) else {
            debug!(provider = %provider, "No adapter registered, skipping");
            return Ok(ProviderOutcome::Skipped(SkipReason::NoAdapter));
        };

        let Some(token) = self
            .credentials
            .access_token(&plan.project.owner_id, provider)
            .await?
        else {
            info!(
                project_id = %plan.project.id,
                owner = %plan.project.owner_id,
                provider = %provider,
                "Owner has no credential for linked provider, skipping"
            );
            return Ok(ProviderOutcome::Skipped(SkipReason::NoCredential));
        };

        let folder = link.handle();
        let result = match action {
            MirrorAction::Share => {
                self.config
                    .bounded(
                        "Share folder",
                        adapter.share_folder(&token, &folder, &plan.email, PermissionLevel::Writer),
                    )
                    .await
            }
            MirrorAction::Revoke => {
                self.config
                    .bounded(
                        "Revoke access",
                        adapter.revoke_access(&token, &folder, &plan.email),
                    )
                    .await
            }
        };

        match (action, result) {
            (_, Ok(())) => Ok(ProviderOutcome::Applied),
            (MirrorAction::Share, Err(Error::AlreadyShared(_))) => Ok(ProviderOutcome::AlreadyInSync),
            // A member the folder never had is already gone. A missing folder
            // (FolderNotFound) is not, and falls through as a failure.
            (MirrorAction::Revoke, Err(Error::NotFound(_))) => Ok(ProviderOutcome::AlreadyInSync),
            (_, Err(e)) => Err(e),
        }
    }
}

#[async_trait]
impl LifecycleListener for AccessMirror {
    async fn on_event(&self, event: &LifecycleEvent) {
        match event.kind {
            LifecycleEventKind::Approved => {
                self.on_approved(&event.project_id, &event.user_id).await;
            }
            LifecycleEventKind::Removed => {
                self.on_removed(&event.project_id, &event.user_id).await;
            }
            LifecycleEventKind::JoinRequested | LifecycleEventKind::Rejected => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{uid, Harness, Refresh};
    use researchhub_common::Provider;
    use researchhub_credentials::CredentialStore;
    use researchhub_membership::MembershipRole;
    use researchhub_storage::{FailureMode, Operation, ProviderCall};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn mirror(h: &Harness) -> Arc<AccessMirror> {
        Arc::new(AccessMirror::new(
            h.store.clone(),
            h.directory.clone(),
            h.resolver.clone(),
            h.registry.clone(),
            h.config.clone(),
        ))
    }

    #[tokio::test]
    async fn test_approve_shares_drive_folder_once() {
        let h = Harness::new(Refresh::Succeed("fresh")).await;
        h.connect(Provider::GoogleDrive, Some("r-bob")).await;
        let folder = h.link(Provider::GoogleDrive).await;
        let service = h.service().with_listener(mirror(&h));

        service.request_membership(&h.project.id, &uid("alice")).await.unwrap();
        let row = service.approve(&h.project.id, &uid("alice"), &uid("bob")).await.unwrap();

        assert_eq!(row.status, MembershipStatus::Active);
        assert_eq!(row.role, MembershipRole::Assistant);
        assert_eq!(
            h.drive.calls(),
            vec![ProviderCall::Share {
                folder_id: folder.folder_id.clone(),
                email: "alice@uni.edu".to_string(),
                level: PermissionLevel::Writer,
                token: "fresh".to_string(),
            }]
        );
        assert!(h.drive.members(&folder).contains_key(&Email::parse("alice@uni.edu").unwrap()));
    }

    #[tokio::test]
    async fn test_refreshed_token_is_persisted() {
        let h = Harness::new(Refresh::Succeed("fresh")).await;
        h.connect(Provider::GoogleDrive, Some("r-bob")).await;
        h.link(Provider::GoogleDrive).await;

        mirror(&h).on_approved(&h.project.id, &uid("alice")).await;

        let stored = h
            .credentials
            .get(&uid("bob"), Provider::GoogleDrive)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.access_token.expose(), "fresh");
        assert_eq!(h.refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unlinked_provider_gets_no_calls() {
        let h = Harness::new(Refresh::Succeed("fresh")).await;
        h.connect(Provider::GoogleDrive, None).await;
        h.connect(Provider::Dropbox, None).await;
        h.link(Provider::GoogleDrive).await;

        let report = mirror(&h).on_approved(&h.project.id, &uid("alice")).await;

        assert_eq!(h.dropbox.calls().len(), 0);
        assert_eq!(h.drive.call_count(Operation::Share), 1);
        assert_eq!(report.providers.len(), 1);
    }

    #[tokio::test]
    async fn test_share_failure_does_not_fail_approve() {
        let h = Harness::new(Refresh::Succeed("fresh")).await;
        h.connect(Provider::GoogleDrive, Some("r-bob")).await;
        h.link(Provider::GoogleDrive).await;
        h.drive.fail(Operation::Share, FailureMode::Unavailable);
        let service = h.service().with_listener(mirror(&h));

        service.request_membership(&h.project.id, &uid("alice")).await.unwrap();
        let row = service.approve(&h.project.id, &uid("alice"), &uid("bob")).await.unwrap();

        assert_eq!(row.status, MembershipStatus::Active);
        let stored = h.store.membership(&h.project.id, &uid("alice")).await.unwrap().unwrap();
        assert_eq!(stored.status, MembershipStatus::Active);
        assert_eq!(h.drive.call_count(Operation::Share), 1);
    }

    #[tokio::test]
    async fn test_failure_on_one_provider_does_not_stop_the_other() {
        for parallel in [true, false] {
            let mut h = Harness::new(Refresh::Succeed("fresh")).await;
            h.config = h.config.clone().with_parallel_fanout(parallel);
            h.connect(Provider::GoogleDrive, None).await;
            h.connect(Provider::Dropbox, None).await;
            h.link(Provider::GoogleDrive).await;
            let dropbox_folder = h.link(Provider::Dropbox).await;
            h.drive.fail(Operation::Share, FailureMode::Rejected);

            let report = mirror(&h).on_approved(&h.project.id, &uid("alice")).await;

            assert!(matches!(
                report.outcome(Provider::GoogleDrive),
                Some(ProviderOutcome::Failed(_))
            ));
            assert_eq!(report.outcome(Provider::Dropbox), Some(&ProviderOutcome::Applied));
            assert_eq!(h.dropbox.members(&dropbox_folder).len(), 1);
        }
    }

    #[tokio::test]
    async fn test_refresh_failure_revokes_with_stale_token() {
        let h = Harness::new(Refresh::Fail).await;
        h.connect(Provider::GoogleDrive, Some("r-bob")).await;
        h.link(Provider::GoogleDrive).await;
        let service = h.service().with_listener(mirror(&h));

        service
            .invite_members(&h.project.id, &["alice@uni.edu".to_string()], MembershipRole::CoAuthor, &uid("bob"))
            .await
            .unwrap();
        h.drive.fail(Operation::Revoke, FailureMode::Unavailable);

        let row = service
            .remove_member(&h.project.id, &uid("alice"), &uid("bob"))
            .await
            .unwrap();

        assert_eq!(row.status, MembershipStatus::Left);
        let revokes: Vec<ProviderCall> = h
            .drive
            .calls()
            .into_iter()
            .filter(|c| c.operation() == Operation::Revoke)
            .collect();
        assert_eq!(revokes.len(), 1);
        assert!(matches!(
            &revokes[0],
            ProviderCall::Revoke { token, email, .. } if token == "stale-gdrive" && email == "alice@uni.edu"
        ));
    }

    #[tokio::test]
    async fn test_hung_provider_times_out() {
        let h = Harness::new(Refresh::Succeed("fresh")).await;
        h.connect(Provider::GoogleDrive, None).await;
        h.link(Provider::GoogleDrive).await;
        h.drive.fail(Operation::Share, FailureMode::Hang(Duration::from_secs(30)));

        let report = mirror(&h).on_approved(&h.project.id, &uid("alice")).await;

        let Some(ProviderOutcome::Failed(message)) = report.outcome(Provider::GoogleDrive) else {
            panic!("expected failure, got {:?}", report.providers);
        };
        assert!(message.contains("exceeded"));
    }

    #[tokio::test]
    async fn test_idempotent_provider_errors_count_as_success() {
        let h = Harness::new(Refresh::Succeed("fresh")).await;
        h.connect(Provider::GoogleDrive, None).await;
        h.link(Provider::GoogleDrive).await;
        let mirror = mirror(&h);

        let revoke = mirror.on_removed(&h.project.id, &uid("alice")).await;
        assert_eq!(revoke.outcome(Provider::GoogleDrive), Some(&ProviderOutcome::AlreadyInSync));

        mirror.on_approved(&h.project.id, &uid("alice")).await;
        let again = mirror.on_approved(&h.project.id, &uid("alice")).await;
        assert_eq!(again.outcome(Provider::GoogleDrive), Some(&ProviderOutcome::AlreadyInSync));
        assert!(!again.has_failures());
    }

    #[tokio::test]
    async fn test_revoke_on_missing_folder_is_a_failure() {
        let h = Harness::new(Refresh::Succeed("fresh")).await;
        h.connect(Provider::Dropbox, None).await;
        let folder = h.link(Provider::Dropbox).await;
        let mirror = mirror(&h);

        let shared = mirror.on_approved(&h.project.id, &uid("alice")).await;
        assert_eq!(shared.outcome(Provider::Dropbox), Some(&ProviderOutcome::Applied));
        h.dropbox.delete_folder(&folder);

        let report = mirror.on_removed(&h.project.id, &uid("alice")).await;

        let Some(ProviderOutcome::Failed(message)) = report.outcome(Provider::Dropbox) else {
            panic!("expected failure, got {:?}", report.providers);
        };
        assert!(message.contains("Folder not found"));
        assert!(report.has_failures());
        assert_eq!(h.dropbox.call_count(Operation::Revoke), 1);
    }

    #[tokio::test]
    async fn test_missing_owner_credential_skips_provider() {
        let h = Harness::new(Refresh::Succeed("fresh")).await;
        h.link(Provider::GoogleDrive).await;

        let report = mirror(&h).on_approved(&h.project.id, &uid("alice")).await;

        assert_eq!(
            report.outcome(Provider::GoogleDrive),
            Some(&ProviderOutcome::Skipped(SkipReason::NoCredential))
        );
        assert!(h.drive.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_user_is_absorbed() {
        let h = Harness::new(Refresh::Succeed("fresh")).await;
        h.connect(Provider::GoogleDrive, None).await;
        h.link(Provider::GoogleDrive).await;

        let report = mirror(&h).on_approved(&h.project.id, &uid("ghost")).await;

        assert!(report.error.is_some());
        assert!(h.drive.calls().is_empty());
    }

    #[tokio::test]
    async fn test_reject_and_request_do_not_mirror() {
        let h = Harness::new(Refresh::Succeed("fresh")).await;
        h.connect(Provider::GoogleDrive, None).await;
        h.link(Provider::GoogleDrive).await;
        let service = h.service().with_listener(mirror(&h));

        service.request_membership(&h.project.id, &uid("alice")).await.unwrap();
        service.reject(&h.project.id, &uid("alice"), &uid("bob")).await.unwrap();

        assert!(h.drive.calls().is_empty());
    }

    #[tokio::test]
    async fn test_repeat_approve_does_not_mirror_twice() {
        let h = Harness::new(Refresh::Succeed("fresh")).await;
        h.connect(Provider::GoogleDrive, None).await;
        h.link(Provider::GoogleDrive).await;
        let service = h.service().with_listener(mirror(&h));

        service.request_membership(&h.project.id, &uid("alice")).await.unwrap();
        service.approve(&h.project.id, &uid("alice"), &uid("bob")).await.unwrap();
        service.approve(&h.project.id, &uid("alice"), &uid("bob")).await.unwrap();

        assert_eq!(h.drive.call_count(Operation::Share), 1);
    }

    #[tokio::test]
    async fn test_resync_follows_current_status() {
        let h = Harness::new(Refresh::Succeed("fresh")).await;
        h.connect(Provider::GoogleDrive, None).await;
        let folder = h.link(Provider::GoogleDrive).await;
        let mirror = mirror(&h);
        let service = h.service();

        service.request_membership(&h.project.id, &uid("alice")).await.unwrap();
        assert!(mirror.resync(&h.project.id, &uid("alice")).await.unwrap().is_none());

        service.approve(&h.project.id, &uid("alice"), &uid("bob")).await.unwrap();
        let report = mirror.resync(&h.project.id, &uid("alice")).await.unwrap().unwrap();
        assert_eq!(report.outcome(Provider::GoogleDrive), Some(&ProviderOutcome::Applied));
        assert_eq!(h.drive.members(&folder).len(), 1);

        service.remove_member(&h.project.id, &uid("alice"), &uid("bob")).await.unwrap();
        mirror.resync(&h.project.id, &uid("alice")).await.unwrap().unwrap();
        assert!(h.drive.members(&folder).is_empty());

        let missing = mirror.resync(&h.project.id, &uid("carol")).await;
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }
}
