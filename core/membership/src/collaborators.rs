//! External collaborators of the membership service: identity lookup,
//! notifications and email policy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use researchhub_common::{Email, Error, ProjectId, Result, UserId};

use crate::model::User;

/// Identity lookup.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user(&self, id: &UserId) -> Result<Option<User>>;

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>>;
}

/// In-memory user directory.
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<UserId, User>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user. Emails are unique across users.
    pub async fn add(&self, user: User) -> Result<()> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|u| u.email == user.email && u.id != user.id)
        {
            return Err(Error::Conflict(format!(
                "Email {} is already registered",
                user.email
            )));
        }
        users.insert(user.id.clone(), user);
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn user(&self, id: &UserId) -> Result<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| &u.email == email)
            .cloned())
    }
}

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Sent to the owner when someone asks to join.
    JoinRequest,
    JoinApproved,
    JoinRejected,
    RemovedFromProject,
    /// Sent to a user added directly by invitation.
    Invited,
}

/// Fire-and-forget notification sink.
///
/// Delivery failures stay inside the implementation.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient: &UserId, kind: NotificationKind, project_id: &ProjectId);
}

/// Notifier that only logs.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, recipient: &UserId, kind: NotificationKind, project_id: &ProjectId) {
        tracing::info!(
            recipient = %recipient,
            project_id = %project_id,
            kind = ?kind,
            "Notification queued"
        );
    }
}

/// Decides which email addresses may be invited.
pub trait EmailPolicy: Send + Sync {
    fn allows(&self, email: &Email) -> bool;
}

/// Accepts every syntactically valid address.
#[derive(Debug, Default, Clone)]
pub struct AllowAnyEmail;

impl EmailPolicy for AllowAnyEmail {
    fn allows(&self, _email: &Email) -> bool {
        true
    }
}

/// Accepts addresses whose domain is on the list (case-insensitive).
///
/// An empty list accepts everything.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DomainAllowList {
    domains: Vec<String>,
}

impl DomainAllowList {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|d| d.as_ref().trim().trim_start_matches('@').to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    /// True when no domain is configured, so every domain is allowed.
    pub fn is_unrestricted(&self) -> bool {
        self.domains.is_empty()
    }
}

impl EmailPolicy for DomainAllowList {
    fn allows(&self, email: &Email) -> bool {
        self.domains.is_empty() || self.domains.iter().any(|d| d == email.domain())
    }
}
