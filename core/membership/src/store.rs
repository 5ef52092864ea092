//! Membership persistence.
//!
//! Status changes go through [`MembershipStore::transition`], a
//! compare-and-set on the current status. Concurrent transitions of the
//! same row therefore commit at most once.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use researchhub_common::{Error, ProjectId, Provider, Result, UserId};

use crate::model::{ExternalFolderLink, Membership, MembershipRole, MembershipStatus, Project};

/// Result of a compare-and-set status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The row moved to the target status.
    Applied(Membership),
    /// The row was already in the target status; nothing was written.
    Unchanged(Membership),
    /// The row's current status is not an allowed source.
    Refused(Membership),
    /// No row exists for the pair.
    Missing,
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Insert a new project. Fails with `Conflict` when the id is taken.
    async fn create_project(&self, project: &Project) -> Result<()>;

    async fn project(&self, id: &ProjectId) -> Result<Option<Project>>;

    async fn membership(&self, project: &ProjectId, user: &UserId) -> Result<Option<Membership>>;

    /// All rows for a project, oldest first.
    async fn memberships(&self, project: &ProjectId) -> Result<Vec<Membership>>;

    /// Insert the row unless one already exists for the pair.
    ///
    /// Returns whether the row was inserted.
    async fn insert_membership(&self, membership: &Membership) -> Result<bool>;

    /// Move the row to `to` if its current status is one of `from`.
    ///
    /// `role`, when given, is written together with the status.
    async fn transition(
        &self,
        project: &ProjectId,
        user: &UserId,
        from: &[MembershipStatus],
        to: MembershipStatus,
        role: Option<MembershipRole>,
    ) -> Result<TransitionOutcome>;

    async fn folder_links(&self, project: &ProjectId) -> Result<Vec<ExternalFolderLink>>;

    /// Record a folder link. Fails with `Conflict` when the project is
    /// already linked on that provider.
    async fn attach_folder_link(&self, link: &ExternalFolderLink) -> Result<()>;
}

/// Decide a transition against the row's current state.
///
/// Shared by the store implementations so they agree on semantics.
pub(crate) fn plan_transition(
    current: &Membership,
    from: &[MembershipStatus],
    to: MembershipStatus,
) -> Option<TransitionOutcome> {
    if current.status == to {
        Some(TransitionOutcome::Unchanged(current.clone()))
    } else if !from.contains(&current.status) {
        Some(TransitionOutcome::Refused(current.clone()))
    } else {
        None
    }
}

#[derive(Default)]
struct Tables {
    projects: HashMap<ProjectId, Project>,
    memberships: HashMap<(ProjectId, UserId), Membership>,
    links: HashMap<(ProjectId, Provider), ExternalFolderLink>,
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryMembershipStore {
    tables: RwLock<Tables>,
}

impl MemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MembershipStore for MemoryMembershipStore {
    async fn create_project(&self, project: &Project) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.projects.contains_key(&project.id) {
            return Err(Error::Conflict(format!(
                "Project {} already exists",
                project.id
            )));
        }
        tables.projects.insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn project(&self, id: &ProjectId) -> Result<Option<Project>> {
        Ok(self.tables.read().await.projects.get(id).cloned())
    }

    async fn membership(&self, project: &ProjectId, user: &UserId) -> Result<Option<Membership>> {
        Ok(self
            .tables
            .read()
            .await
            .memberships
            .get(&(project.clone(), user.clone()))
            .cloned())
    }

    async fn memberships(&self, project: &ProjectId) -> Result<Vec<Membership>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Membership> = tables
            .memberships
            .values()
            .filter(|m| &m.project_id == project)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        Ok(rows)
    }

    async fn insert_membership(&self, membership: &Membership) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let key = (membership.project_id.clone(), membership.user_id.clone());
        if tables.memberships.contains_key(&key) {
            return Ok(false);
        }
        tables.memberships.insert(key, membership.clone());
        Ok(true)
    }

    async fn transition(
        &self,
        project: &ProjectId,
        user: &UserId,
        from: &[MembershipStatus],
        to: MembershipStatus,
        role: Option<MembershipRole>,
    ) -> Result<TransitionOutcome> {
        let mut tables = self.tables.write().await;
        let Some(row) = tables.memberships.get_mut(&(project.clone(), user.clone())) else {
            return Ok(TransitionOutcome::Missing);
        };

        if let Some(outcome) = plan_transition(row, from, to) {
            return Ok(outcome);
        }

        row.status = to;
        if let Some(role) = role {
            row.role = role;
        }
        row.updated_at = Utc::now();
        Ok(TransitionOutcome::Applied(row.clone()))
    }

    async fn folder_links(&self, project: &ProjectId) -> Result<Vec<ExternalFolderLink>> {
        let tables = self.tables.read().await;
        let mut links: Vec<ExternalFolderLink> = tables
            .links
            .values()
            .filter(|l| &l.project_id == project)
            .cloned()
            .collect();
        links.sort_by_key(|l| l.provider);
        Ok(links)
    }

    async fn attach_folder_link(&self, link: &ExternalFolderLink) -> Result<()> {
        let mut tables = self.tables.write().await;
        let key = (link.project_id.clone(), link.provider);
        if tables.links.contains_key(&key) {
            return Err(Error::Conflict(format!(
                "Project {} already has a {} folder",
                link.project_id, link.provider
            )));
        }
        tables.links.insert(key, link.clone());
        Ok(())
    }
}
