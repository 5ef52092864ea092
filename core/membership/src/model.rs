//! Project, membership and folder-link records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use researchhub_common::{Email, Error, ProjectId, Provider, Result, UserId};
use researchhub_storage::FolderHandle;

/// Who can discover a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl FromStr for Visibility {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(Error::InvalidInput(format!("Unknown visibility '{}'", other))),
        }
    }
}

/// A research project.
///
/// The owner is a separate relation from membership and never appears as
/// a membership row. Ownership is not changed by this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub owner_id: UserId,
    pub title: String,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(
        id: ProjectId,
        owner_id: UserId,
        title: impl Into<String>,
        visibility: Visibility,
    ) -> Self {
        Self {
            id,
            owner_id,
            title: title.into(),
            visibility,
            created_at: Utc::now(),
        }
    }

    pub fn is_owner(&self, user: &UserId) -> bool {
        &self.owner_id == user
    }
}

/// Membership lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipStatus {
    /// Join requested, awaiting a decision.
    Pending,
    /// Current member.
    Active,
    /// Join request declined.
    Rejected,
    /// Removed after having been a member.
    Left,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Pending => "PENDING",
            MembershipStatus::Active => "ACTIVE",
            MembershipStatus::Rejected => "REJECTED",
            MembershipStatus::Left => "LEFT",
        }
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(MembershipStatus::Pending),
            "ACTIVE" => Ok(MembershipStatus::Active),
            "REJECTED" => Ok(MembershipStatus::Rejected),
            "LEFT" => Ok(MembershipStatus::Left),
            other => Err(Error::InvalidInput(format!("Unknown status '{}'", other))),
        }
    }
}

/// Role held by a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipRole {
    /// Co-owner; may manage membership.
    Pi,
    /// Invited collaborator.
    CoAuthor,
    /// Default role for self-requested participants.
    Assistant,
}

impl MembershipRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipRole::Pi => "PI",
            MembershipRole::CoAuthor => "CO_AUTHOR",
            MembershipRole::Assistant => "ASSISTANT",
        }
    }
}

impl fmt::Display for MembershipRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "PI" => Ok(MembershipRole::Pi),
            "CO_AUTHOR" | "COAUTHOR" => Ok(MembershipRole::CoAuthor),
            "ASSISTANT" => Ok(MembershipRole::Assistant),
            other => Err(Error::InvalidInput(format!("Unknown role '{}'", other))),
        }
    }
}

/// The (project, user) relationship. At most one row exists per pair;
/// rows are never deleted, history is kept in `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub project_id: ProjectId,
    pub user_id: UserId,
    pub status: MembershipStatus,
    pub role: MembershipRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    /// A fresh join request.
    pub fn pending(project_id: ProjectId, user_id: UserId) -> Self {
        Self::with_status(project_id, user_id, MembershipStatus::Pending, MembershipRole::Assistant)
    }

    /// A membership created directly by invitation or co-owner addition.
    pub fn active(project_id: ProjectId, user_id: UserId, role: MembershipRole) -> Self {
        Self::with_status(project_id, user_id, MembershipStatus::Active, role)
    }

    fn with_status(
        project_id: ProjectId,
        user_id: UserId,
        status: MembershipStatus,
        role: MembershipRole,
    ) -> Self {
        let now = Utc::now();
        Self {
            project_id,
            user_id,
            status,
            role,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }

    /// Whether this row grants membership-management rights.
    pub fn can_manage(&self) -> bool {
        self.is_active() && self.role == MembershipRole::Pi
    }
}

/// Link between a project and its folder on one provider.
///
/// Created at most once per (project, provider).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalFolderLink {
    pub project_id: ProjectId,
    pub provider: Provider,
    pub folder_id: String,
    pub folder_url: String,
    pub linked_at: DateTime<Utc>,
}

impl ExternalFolderLink {
    pub fn new(project_id: ProjectId, provider: Provider, folder: FolderHandle) -> Self {
        Self {
            project_id,
            provider,
            folder_id: folder.folder_id,
            folder_url: folder.folder_url,
            linked_at: Utc::now(),
        }
    }

    /// The provider-facing folder identity.
    pub fn handle(&self) -> FolderHandle {
        FolderHandle {
            folder_id: self.folder_id.clone(),
            folder_url: self.folder_url.clone(),
        }
    }
}

/// Platform-wide role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalRole {
    User,
    Admin,
}

impl GlobalRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, GlobalRole::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GlobalRole::User => "user",
            GlobalRole::Admin => "admin",
        }
    }
}

impl FromStr for GlobalRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(GlobalRole::User),
            "admin" => Ok(GlobalRole::Admin),
            other => Err(Error::InvalidInput(format!("Unknown global role '{}'", other))),
        }
    }
}

/// A platform user as seen through the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub role: GlobalRole,
}
