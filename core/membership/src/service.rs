//! The membership state machine.
//!
//! Valid transitions:
//!
//! ```text
//! (none) ──request──▶ PENDING ──approve──▶ ACTIVE ──remove──▶ LEFT
//!                        │                   ▲                  │
//!                        └──reject──▶ REJECTED ──invite─────────┘
//! ```
//!
//! REJECTED and LEFT rows go back to PENDING on a fresh request, or
//! straight to ACTIVE on an invitation. Rows are never deleted.

use std::sync::Arc;
use tracing::{debug, info};

use researchhub_common::{Email, Error, ProjectId, Result, UserId};

use crate::collaborators::{EmailPolicy, NotificationKind, Notifier, UserDirectory};
use crate::events::{LifecycleEvent, LifecycleEventKind, LifecycleListener};
use crate::model::{Membership, MembershipRole, MembershipStatus, Project, Visibility};
use crate::store::{MembershipStore, TransitionOutcome};

/// Authoritative owner of project membership.
///
/// Every mutation is committed to the store before listeners are told
/// about it. Listeners run inline, in registration order.
#[derive(Clone)]
pub struct MembershipService {
    store: Arc<dyn MembershipStore>,
    directory: Arc<dyn UserDirectory>,
    notifier: Arc<dyn Notifier>,
    email_policy: Arc<dyn EmailPolicy>,
    listeners: Vec<Arc<dyn LifecycleListener>>,
}

impl MembershipService {
    pub fn new(
        store: Arc<dyn MembershipStore>,
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
        email_policy: Arc<dyn EmailPolicy>,
    ) -> Self {
        Self {
            store,
            directory,
            notifier,
            email_policy,
            listeners: Vec::new(),
        }
    }

    /// Register a listener for committed lifecycle events.
    pub fn with_listener(mut self, listener: Arc<dyn LifecycleListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn store(&self) -> &Arc<dyn MembershipStore> {
        &self.store
    }

    /// Create a project owned by `owner`.
    pub async fn create_project(
        &self,
        owner: &UserId,
        title: &str,
        visibility: Visibility,
    ) -> Result<Project> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::InvalidInput("Project title cannot be empty".to_string()));
        }

        let id = ProjectId::new(uuid::Uuid::new_v4().to_string())?;
        let project = Project::new(id, owner.clone(), title, visibility);
        self.store.create_project(&project).await?;

        info!(project_id = %project.id, owner = %owner, "Project created");
        Ok(project)
    }

    /// Ask to join a project.
    ///
    /// Reuses an existing REJECTED or LEFT row, resetting it to PENDING
    /// with the ASSISTANT role.
    ///
    /// # Errors
    /// - `NotFound` if the project does not exist
    /// - `Conflict` if the user owns the project, is already a member, or
    ///   already has a pending request
    pub async fn request_membership(&self, project_id: &ProjectId, user: &UserId) -> Result<Membership> {
        let project = self.project(project_id).await?;
        if project.is_owner(user) {
            return Err(Error::Conflict(
                "The project owner cannot request membership".to_string(),
            ));
        }

        let fresh = Membership::pending(project_id.clone(), user.clone());
        let membership = if self.store.insert_membership(&fresh).await? {
            fresh
        } else {
            match self
                .store
                .transition(
                    project_id,
                    user,
                    &[MembershipStatus::Rejected, MembershipStatus::Left],
                    MembershipStatus::Pending,
                    Some(MembershipRole::Assistant),
                )
                .await?
            {
                TransitionOutcome::Applied(m) => m,
                TransitionOutcome::Unchanged(_) => {
                    return Err(Error::Conflict("Request already pending".to_string()))
                }
                TransitionOutcome::Refused(m) if m.is_active() => {
                    return Err(Error::Conflict("Already a member".to_string()))
                }
                TransitionOutcome::Refused(m) => {
                    return Err(Error::Conflict(format!(
                        "Cannot request membership from status {}",
                        m.status
                    )))
                }
                TransitionOutcome::Missing => {
                    return Err(Error::NotFound(format!(
                        "Membership for {} on {} disappeared",
                        user, project_id
                    )))
                }
            }
        };

        info!(project_id = %project_id, user_id = %user, "Membership requested");
        self.publish(LifecycleEventKind::JoinRequested, project_id, user, user)
            .await;
        self.notifier
            .notify(&project.owner_id, NotificationKind::JoinRequest, project_id)
            .await;

        Ok(membership)
    }

    /// Approve a pending request. Approving an ACTIVE row is a no-op.
    ///
    /// # Errors
    /// - `Unauthorized` unless the actor is the owner, an active PI, or an admin
    /// - `NotFound` if the project or the request does not exist
    /// - `Conflict` if the row is REJECTED or LEFT
    pub async fn approve(
        &self,
        project_id: &ProjectId,
        user: &UserId,
        acting_user: &UserId,
    ) -> Result<Membership> {
        self.decide(
            project_id,
            user,
            acting_user,
            MembershipStatus::Pending,
            MembershipStatus::Active,
        )
        .await
    }

    /// Reject a pending request. Rejecting a REJECTED row is a no-op.
    pub async fn reject(
        &self,
        project_id: &ProjectId,
        user: &UserId,
        acting_user: &UserId,
    ) -> Result<Membership> {
        self.decide(
            project_id,
            user,
            acting_user,
            MembershipStatus::Pending,
            MembershipStatus::Rejected,
        )
        .await
    }

    /// Remove an active member. Removing a LEFT row is a no-op.
    ///
    /// # Errors
    /// - `Conflict` if `user` owns the project, whoever is asking
    pub async fn remove_member(
        &self,
        project_id: &ProjectId,
        user: &UserId,
        acting_user: &UserId,
    ) -> Result<Membership> {
        let project = self.project(project_id).await?;
        if project.is_owner(user) {
            return Err(Error::Conflict("Cannot remove the project owner".to_string()));
        }

        self.decide(
            project_id,
            user,
            acting_user,
            MembershipStatus::Active,
            MembershipStatus::Left,
        )
        .await
    }

    /// Add users directly as ACTIVE members.
    ///
    /// Malformed, disallowed or unknown emails are skipped, as are the
    /// owner, the acting user and users who are already active. Returns
    /// how many users were actually added.
    pub async fn invite_members(
        &self,
        project_id: &ProjectId,
        emails: &[String],
        role: MembershipRole,
        acting_user: &UserId,
    ) -> Result<usize> {
        let project = self.project(project_id).await?;
        self.authorize(&project, acting_user).await?;

        let mut added = 0;
        for raw in emails {
            let Ok(email) = Email::parse(raw) else {
                debug!(project_id = %project_id, email = %raw, "Skipping malformed email");
                continue;
            };
            if !self.email_policy.allows(&email) {
                debug!(project_id = %project_id, email = %email, "Skipping email outside allowed domains");
                continue;
            }
            let Some(invitee) = self.directory.find_by_email(&email).await? else {
                debug!(project_id = %project_id, email = %email, "Skipping unknown email");
                continue;
            };
            if &invitee.id == acting_user || project.is_owner(&invitee.id) {
                continue;
            }

            if self.activate(project_id, &invitee.id, role).await? {
                added += 1;
                info!(project_id = %project_id, user_id = %invitee.id, role = %role, "Member invited");
                self.publish(LifecycleEventKind::Approved, project_id, &invitee.id, acting_user)
                    .await;
                self.notifier
                    .notify(&invitee.id, NotificationKind::Invited, project_id)
                    .await;
            }
        }

        Ok(added)
    }

    /// Rows for a project, optionally filtered by status.
    pub async fn list_members(
        &self,
        project_id: &ProjectId,
        status: Option<MembershipStatus>,
    ) -> Result<Vec<Membership>> {
        let rows = self.store.memberships(project_id).await?;
        Ok(match status {
            Some(status) => rows.into_iter().filter(|m| m.status == status).collect(),
            None => rows,
        })
    }

    pub async fn membership(&self, project_id: &ProjectId, user: &UserId) -> Result<Option<Membership>> {
        self.store.membership(project_id, user).await
    }

    async fn project(&self, project_id: &ProjectId) -> Result<Project> {
        self.store
            .project(project_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Project {} not found", project_id)))
    }

    /// The owner, an active PI, or a global admin may manage membership.
    async fn authorize(&self, project: &Project, actor: &UserId) -> Result<()> {
        if project.is_owner(actor) {
            return Ok(());
        }

        if let Some(row) = self.store.membership(&project.id, actor).await? {
            if row.can_manage() {
                return Ok(());
            }
        }

        if let Some(user) = self.directory.user(actor).await? {
            if user.role.is_admin() {
                return Ok(());
            }
        }

        Err(Error::Unauthorized(format!(
            "{} may not manage members of project {}",
            actor, project.id
        )))
    }

    /// Create the row as ACTIVE or reactivate it. Returns whether anything changed.
    async fn activate(&self, project_id: &ProjectId, user: &UserId, role: MembershipRole) -> Result<bool> {
        let row = Membership::active(project_id.clone(), user.clone(), role);
        if self.store.insert_membership(&row).await? {
            return Ok(true);
        }

        let outcome = self
            .store
            .transition(
                project_id,
                user,
                &[
                    MembershipStatus::Pending,
                    MembershipStatus::Rejected,
                    MembershipStatus::Left,
                ],
                MembershipStatus::Active,
                Some(role),
            )
            .await?;
        Ok(matches!(outcome, TransitionOutcome::Applied(_)))
    }

    /// Shared path for approve, reject and remove.
    async fn decide(
        &self,
        project_id: &ProjectId,
        user: &UserId,
        acting_user: &UserId,
        from: MembershipStatus,
        to: MembershipStatus,
    ) -> Result<Membership> {
        let project = self.project(project_id).await?;
        self.authorize(&project, acting_user).await?;

        let outcome = self
            .store
            .transition(project_id, user, &[from], to, None)
            .await?;

        let membership = match outcome {
            TransitionOutcome::Applied(m) => m,
            TransitionOutcome::Unchanged(m) => {
                debug!(project_id = %project_id, user_id = %user, status = %to, "Transition already applied");
                return Ok(m);
            }
            TransitionOutcome::Refused(m) => {
                return Err(Error::Conflict(format!(
                    "Cannot move membership from {} to {}",
                    m.status, to
                )))
            }
            TransitionOutcome::Missing => {
                return Err(Error::NotFound(format!(
                    "No membership for {} on project {}",
                    user, project_id
                )))
            }
        };

        let (kind, notification) = match to {
            MembershipStatus::Active => (LifecycleEventKind::Approved, NotificationKind::JoinApproved),
            MembershipStatus::Rejected => (LifecycleEventKind::Rejected, NotificationKind::JoinRejected),
            _ => (LifecycleEventKind::Removed, NotificationKind::RemovedFromProject),
        };

        info!(
            project_id = %project_id,
            user_id = %user,
            acting_user = %acting_user,
            status = %to,
            "Membership updated"
        );
        self.publish(kind, project_id, user, acting_user).await;
        self.notifier.notify(user, notification, project_id).await;

        Ok(membership)
    }

    async fn publish(
        &self,
        kind: LifecycleEventKind,
        project_id: &ProjectId,
        user: &UserId,
        acting_user: &UserId,
    ) {
        let event = LifecycleEvent::new(kind, project_id.clone(), user.clone(), acting_user.clone());
        for listener in &self.listeners {
            listener.on_event(&event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{AllowAnyEmail, DomainAllowList, MemoryUserDirectory};
    use crate::model::{GlobalRole, User};
    use crate::store::MemoryMembershipStore;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<LifecycleEvent>>,
        notes: Mutex<Vec<(UserId, NotificationKind)>>,
    }

    #[async_trait]
    impl LifecycleListener for Recorder {
        async fn on_event(&self, event: &LifecycleEvent) {
            self.events.lock().await.push(event.clone());
        }
    }

    #[async_trait]
    impl Notifier for Recorder {
        async fn notify(&self, recipient: &UserId, kind: NotificationKind, _: &ProjectId) {
            self.notes.lock().await.push((recipient.clone(), kind));
        }
    }

    impl Recorder {
        async fn kinds(&self) -> Vec<LifecycleEventKind> {
            self.events.lock().await.iter().map(|e| e.kind).collect()
        }
    }

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    struct Fixture {
        service: MembershipService,
        recorder: Arc<Recorder>,
        project: Project,
    }

    async fn fixture_with_policy(policy: Arc<dyn EmailPolicy>) -> Fixture {
        let directory = Arc::new(MemoryUserDirectory::new());
        for (id, email, role) in [
            ("bob", "bob@uni.edu", GlobalRole::User),
            ("alice", "alice@uni.edu", GlobalRole::User),
            ("carol", "carol@uni.edu", GlobalRole::User),
            ("dave", "dave@gmail.com", GlobalRole::User),
            ("root", "root@uni.edu", GlobalRole::Admin),
        ] {
            directory
                .add(User {
                    id: uid(id),
                    email: Email::parse(email).unwrap(),
                    role,
                })
                .await
                .unwrap();
        }

        let recorder = Arc::new(Recorder::default());
        let service = MembershipService::new(
            Arc::new(MemoryMembershipStore::new()),
            directory,
            recorder.clone(),
            policy,
        )
        .with_listener(recorder.clone());

        let project = service
            .create_project(&uid("bob"), "Coral reefs", Visibility::Public)
            .await
            .unwrap();

        Fixture {
            service,
            recorder,
            project,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with_policy(Arc::new(AllowAnyEmail)).await
    }

    #[tokio::test]
    async fn test_request_then_approve() {
        let f = fixture().await;
        let pid = &f.project.id;

        let pending = f.service.request_membership(pid, &uid("alice")).await.unwrap();
        assert_eq!(pending.status, MembershipStatus::Pending);

        let active = f.service.approve(pid, &uid("alice"), &uid("bob")).await.unwrap();
        assert_eq!(active.status, MembershipStatus::Active);
        assert_eq!(active.role, MembershipRole::Assistant);

        assert_eq!(
            f.recorder.kinds().await,
            vec![LifecycleEventKind::JoinRequested, LifecycleEventKind::Approved]
        );
        let notes = f.recorder.notes.lock().await;
        assert_eq!(notes[0], (uid("bob"), NotificationKind::JoinRequest));
        assert_eq!(notes[1], (uid("alice"), NotificationKind::JoinApproved));
    }

    #[tokio::test]
    async fn test_owner_cannot_request() {
        let f = fixture().await;
        let result = f.service.request_membership(&f.project.id, &uid("bob")).await;
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn test_duplicate_request_conflicts() {
        let f = fixture().await;
        let pid = &f.project.id;
        f.service.request_membership(pid, &uid("alice")).await.unwrap();

        let again = f.service.request_membership(pid, &uid("alice")).await;
        assert!(matches!(again, Err(Error::Conflict(ref m)) if m.contains("pending")));

        f.service.approve(pid, &uid("alice"), &uid("bob")).await.unwrap();
        let member = f.service.request_membership(pid, &uid("alice")).await;
        assert!(matches!(member, Err(Error::Conflict(ref m)) if m.contains("member")));
    }

    #[tokio::test]
    async fn test_rerequest_reuses_row() {
        let f = fixture().await;
        let pid = &f.project.id;
        f.service.request_membership(pid, &uid("alice")).await.unwrap();
        f.service.reject(pid, &uid("alice"), &uid("bob")).await.unwrap();

        let again = f.service.request_membership(pid, &uid("alice")).await.unwrap();
        assert_eq!(again.status, MembershipStatus::Pending);
        assert_eq!(again.role, MembershipRole::Assistant);
        assert_eq!(f.service.list_members(pid, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rerequest_after_leaving_resets_role() {
        let f = fixture().await;
        let pid = &f.project.id;
        f.service
            .invite_members(pid, &["alice@uni.edu".to_string()], MembershipRole::CoAuthor, &uid("bob"))
            .await
            .unwrap();
        f.service.remove_member(pid, &uid("alice"), &uid("bob")).await.unwrap();

        let again = f.service.request_membership(pid, &uid("alice")).await.unwrap();
        assert_eq!(again.status, MembershipStatus::Pending);
        assert_eq!(again.role, MembershipRole::Assistant);
    }

    #[tokio::test]
    async fn test_unauthorized_actor() {
        let f = fixture().await;
        let pid = &f.project.id;
        f.service.request_membership(pid, &uid("alice")).await.unwrap();

        let result = f.service.approve(pid, &uid("alice"), &uid("carol")).await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));
        let row = f.service.membership(pid, &uid("alice")).await.unwrap().unwrap();
        assert_eq!(row.status, MembershipStatus::Pending);
    }

    #[tokio::test]
    async fn test_pi_and_admin_may_approve() {
        let f = fixture().await;
        let pid = &f.project.id;
        f.service
            .invite_members(pid, &["carol@uni.edu".to_string()], MembershipRole::Pi, &uid("bob"))
            .await
            .unwrap();

        f.service.request_membership(pid, &uid("alice")).await.unwrap();
        f.service.approve(pid, &uid("alice"), &uid("carol")).await.unwrap();

        f.service.remove_member(pid, &uid("alice"), &uid("root")).await.unwrap();
        let row = f.service.membership(pid, &uid("alice")).await.unwrap().unwrap();
        assert_eq!(row.status, MembershipStatus::Left);
    }

    #[tokio::test]
    async fn test_former_pi_loses_rights() {
        let f = fixture().await;
        let pid = &f.project.id;
        f.service
            .invite_members(pid, &["carol@uni.edu".to_string()], MembershipRole::Pi, &uid("bob"))
            .await
            .unwrap();
        f.service.remove_member(pid, &uid("carol"), &uid("bob")).await.unwrap();
        f.service.request_membership(pid, &uid("alice")).await.unwrap();

        let result = f.service.approve(pid, &uid("alice"), &uid("carol")).await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_owner_cannot_be_removed_even_by_admin() {
        let f = fixture().await;
        let pid = &f.project.id;
        for actor in ["bob", "root", "alice"] {
            let result = f.service.remove_member(pid, &uid("bob"), &uid(actor)).await;
            assert!(matches!(result, Err(Error::Conflict(_))), "actor {}", actor);
        }
    }

    #[tokio::test]
    async fn test_repeat_transition_is_silent_noop() {
        let f = fixture().await;
        let pid = &f.project.id;
        f.service.request_membership(pid, &uid("alice")).await.unwrap();
        f.service.approve(pid, &uid("alice"), &uid("bob")).await.unwrap();

        let again = f.service.approve(pid, &uid("alice"), &uid("bob")).await.unwrap();
        assert_eq!(again.status, MembershipStatus::Active);
        assert_eq!(
            f.recorder.kinds().await,
            vec![LifecycleEventKind::JoinRequested, LifecycleEventKind::Approved]
        );
    }

    #[tokio::test]
    async fn test_invalid_transitions() {
        let f = fixture().await;
        let pid = &f.project.id;

        let missing = f.service.approve(pid, &uid("alice"), &uid("bob")).await;
        assert!(matches!(missing, Err(Error::NotFound(_))));

        f.service.request_membership(pid, &uid("alice")).await.unwrap();
        let remove_pending = f.service.remove_member(pid, &uid("alice"), &uid("bob")).await;
        assert!(matches!(remove_pending, Err(Error::Conflict(_))));

        f.service.reject(pid, &uid("alice"), &uid("bob")).await.unwrap();
        let approve_rejected = f.service.approve(pid, &uid("alice"), &uid("bob")).await;
        assert!(matches!(approve_rejected, Err(Error::Conflict(_))));

        let unknown = f
            .service
            .approve(&ProjectId::new("nope").unwrap(), &uid("alice"), &uid("bob"))
            .await;
        assert!(matches!(unknown, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_double_approve() {
        let f = fixture().await;
        let pid = f.project.id.clone();
        f.service.request_membership(&pid, &uid("alice")).await.unwrap();

        let a = {
            let service = f.service.clone();
            let pid = pid.clone();
            tokio::spawn(async move { service.approve(&pid, &uid("alice"), &uid("bob")).await })
        };
        let b = {
            let service = f.service.clone();
            let pid = pid.clone();
            tokio::spawn(async move { service.approve(&pid, &uid("alice"), &uid("bob")).await })
        };

        let first = a.await.unwrap().unwrap();
        let second = b.await.unwrap().unwrap();
        assert_eq!(first.status, MembershipStatus::Active);
        assert_eq!(second.status, MembershipStatus::Active);

        let approvals = f
            .recorder
            .kinds()
            .await
            .into_iter()
            .filter(|k| *k == LifecycleEventKind::Approved)
            .count();
        assert_eq!(approvals, 1);
        let active = f
            .service
            .list_members(&pid, Some(MembershipStatus::Active))
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn test_invite_skips_malformed_email() {
        let f = fixture().await;
        let pid = &f.project.id;
        let count = f
            .service
            .invite_members(
                pid,
                &["alice@uni.edu".to_string(), "not-an-email".to_string()],
                MembershipRole::CoAuthor,
                &uid("bob"),
            )
            .await
            .unwrap();

        assert_eq!(count, 1);
        let row = f.service.membership(pid, &uid("alice")).await.unwrap().unwrap();
        assert_eq!(row.status, MembershipStatus::Active);
        assert_eq!(row.role, MembershipRole::CoAuthor);
    }

    #[tokio::test]
    async fn test_invite_respects_domain_allow_list() {
        let f = fixture_with_policy(Arc::new(DomainAllowList::new(["uni.edu"]))).await;
        let pid = &f.project.id;
        let count = f
            .service
            .invite_members(
                pid,
                &[
                    "alice@uni.edu".to_string(),
                    "carol@uni.edu".to_string(),
                    "dave@gmail.com".to_string(),
                ],
                MembershipRole::CoAuthor,
                &uid("bob"),
            )
            .await
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(
            f.service
                .list_members(pid, Some(MembershipStatus::Active))
                .await
                .unwrap()
                .len(),
            2
        );
        assert!(f.service.membership(pid, &uid("dave")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invite_skips_self_owner_unknown_and_active() {
        let f = fixture().await;
        let pid = &f.project.id;
        f.service
            .invite_members(pid, &["carol@uni.edu".to_string()], MembershipRole::Pi, &uid("bob"))
            .await
            .unwrap();

        let count = f
            .service
            .invite_members(
                pid,
                &[
                    "carol@uni.edu".to_string(),
                    "bob@uni.edu".to_string(),
                    "ghost@uni.edu".to_string(),
                    "alice@uni.edu".to_string(),
                    "alice@uni.edu".to_string(),
                ],
                MembershipRole::CoAuthor,
                &uid("carol"),
            )
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert!(f.service.membership(pid, &uid("bob")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invite_reactivates_left_and_pending_rows() {
        let f = fixture().await;
        let pid = &f.project.id;
        f.service.request_membership(pid, &uid("alice")).await.unwrap();
        f.service.request_membership(pid, &uid("carol")).await.unwrap();
        f.service.approve(pid, &uid("carol"), &uid("bob")).await.unwrap();
        f.service.remove_member(pid, &uid("carol"), &uid("bob")).await.unwrap();

        let count = f
            .service
            .invite_members(
                pid,
                &["alice@uni.edu".to_string(), "carol@uni.edu".to_string()],
                MembershipRole::CoAuthor,
                &uid("bob"),
            )
            .await
            .unwrap();

        assert_eq!(count, 2);
        for user in ["alice", "carol"] {
            let row = f.service.membership(pid, &uid(user)).await.unwrap().unwrap();
            assert_eq!(row.status, MembershipStatus::Active);
            assert_eq!(row.role, MembershipRole::CoAuthor);
        }
    }

    #[tokio::test]
    async fn test_invite_requires_authorization() {
        let f = fixture().await;
        let result = f
            .service
            .invite_members(
                &f.project.id,
                &["carol@uni.edu".to_string()],
                MembershipRole::CoAuthor,
                &uid("alice"),
            )
            .await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_create_project_rejects_blank_title() {
        let f = fixture().await;
        let result = f.service.create_project(&uid("bob"), "   ", Visibility::Private).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
