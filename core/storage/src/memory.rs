//! In-memory storage provider for testing.
//!
//! Records every call it receives and can be told to fail or hang on a
//! given operation, which is how mirror and provisioning behavior under
//! provider failure is exercised.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use uuid::Uuid;

use researchhub_common::{Email, Error, Provider, Result, SecretToken};

use crate::provider::{FileEntry, FolderHandle, PermissionLevel, StorageProvider};

/// Provider operation kinds, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateFolder,
    Share,
    Revoke,
    List,
}

/// How an injected failure behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Fail with `ProviderUnavailable`.
    Unavailable,
    /// Fail with `ProviderRejected`.
    Rejected,
    /// Sleep for the duration before proceeding normally.
    Hang(Duration),
}

/// A call received by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    CreateFolder {
        name: String,
        token: String,
    },
    Share {
        folder_id: String,
        email: String,
        level: PermissionLevel,
        token: String,
    },
    Revoke {
        folder_id: String,
        email: String,
        token: String,
    },
    List {
        folder_id: String,
        token: String,
    },
}

impl ProviderCall {
    pub fn operation(&self) -> Operation {
        match self {
            ProviderCall::CreateFolder { .. } => Operation::CreateFolder,
            ProviderCall::Share { .. } => Operation::Share,
            ProviderCall::Revoke { .. } => Operation::Revoke,
            ProviderCall::List { .. } => Operation::List,
        }
    }
}

#[derive(Debug, Default)]
struct MemoryFolder {
    name: String,
    members: HashMap<Email, PermissionLevel>,
    files: Vec<FileEntry>,
}

#[derive(Debug, Default)]
struct State {
    folders: HashMap<String, MemoryFolder>,
    calls: Vec<ProviderCall>,
    failures: HashMap<Operation, FailureMode>,
}

/// In-memory storage provider.
///
/// Folders, members and files live in memory and are lost on drop.
pub struct MemoryProvider {
    kind: Provider,
    state: Mutex<State>,
}

impl MemoryProvider {
    /// Create a new empty memory provider posing as `kind`.
    pub fn new(kind: Provider) -> Self {
        Self {
            kind,
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a folder directly, without recording a call.
    pub fn seed_folder(&self, name: &str) -> FolderHandle {
        let handle = self.new_handle();
        self.state().folders.insert(
            handle.folder_id.clone(),
            MemoryFolder {
                name: name.to_string(),
                ..MemoryFolder::default()
            },
        );
        handle
    }

    /// Place a file entry in a seeded folder.
    pub fn seed_file(&self, folder: &FolderHandle, entry: FileEntry) {
        if let Some(f) = self.state().folders.get_mut(&folder.folder_id) {
            f.files.push(entry);
        }
    }

    /// Make every subsequent call of `operation` fail according to `mode`.
    pub fn fail(&self, operation: Operation, mode: FailureMode) {
        self.state().failures.insert(operation, mode);
    }

    /// Remove all injected failures.
    pub fn heal(&self) {
        self.state().failures.clear();
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state().calls.clone()
    }

    /// Number of calls received for `operation`.
    pub fn call_count(&self, operation: Operation) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Current members of a folder.
    pub fn members(&self, folder: &FolderHandle) -> HashMap<Email, PermissionLevel> {
        self.state()
            .folders
            .get(&folder.folder_id)
            .map(|f| f.members.clone())
            .unwrap_or_default()
    }

    /// Name of a folder, if it exists.
    pub fn folder_name(&self, folder: &FolderHandle) -> Option<String> {
        self.state()
            .folders
            .get(&folder.folder_id)
            .map(|f| f.name.clone())
    }

    /// Delete a folder as if it were removed outside ResearchHub.
    pub fn delete_folder(&self, folder: &FolderHandle) {
        self.state().folders.remove(&folder.folder_id);
    }

    fn new_handle(&self) -> FolderHandle {
        let folder_id = Uuid::new_v4().to_string();
        FolderHandle {
            folder_url: format!("memory://{}/{}", self.kind, folder_id),
            folder_id,
        }
    }

    /// Record a call and apply any injected failure for it.
    async fn enter(&self, call: ProviderCall) -> Result<()> {
        let failure = {
            let mut state = self.state();
            let op = call.operation();
            state.calls.push(call);
            state.failures.get(&op).copied()
        };

        match failure {
            None => Ok(()),
            Some(FailureMode::Unavailable) => Err(Error::ProviderUnavailable(format!(
                "{} is unavailable",
                self.kind
            ))),
            Some(FailureMode::Rejected) => Err(Error::ProviderRejected(format!(
                "{} rejected the request",
                self.kind
            ))),
            Some(FailureMode::Hang(duration)) => {
                tokio::time::sleep(duration).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl StorageProvider for MemoryProvider {
    fn kind(&self) -> Provider {
        self.kind
    }

    async fn create_folder(&self, token: &SecretToken, name: &str) -> Result<FolderHandle> {
        self.enter(ProviderCall::CreateFolder {
            name: name.to_string(),
            token: token.expose().to_string(),
        })
        .await?;

        let mut state = self.state();
        if state.folders.values().any(|f| f.name == name) {
            return Err(Error::ProviderRejected(format!(
                "Folder '{}' already exists",
                name
            )));
        }

        let handle = self.new_handle();
        state.folders.insert(
            handle.folder_id.clone(),
            MemoryFolder {
                name: name.to_string(),
                ..MemoryFolder::default()
            },
        );
        Ok(handle)
    }

    async fn share_folder(
        &self,
        token: &SecretToken,
        folder: &FolderHandle,
        email: &Email,
        level: PermissionLevel,
    ) -> Result<()> {
        self.enter(ProviderCall::Share {
            folder_id: folder.folder_id.clone(),
            email: email.to_string(),
            level,
            token: token.expose().to_string(),
        })
        .await?;

        let mut state = self.state();
        let entry = state
            .folders
            .get_mut(&folder.folder_id)
            .ok_or_else(|| Error::FolderNotFound(folder.folder_id.clone()))?;

        if entry.members.get(email) == Some(&level) {
            return Err(Error::AlreadyShared(format!(
                "{} already has {} access",
                email, level
            )));
        }
        entry.members.insert(email.clone(), level);
        Ok(())
    }

    async fn revoke_access(
        &self,
        token: &SecretToken,
        folder: &FolderHandle,
        email: &Email,
    ) -> Result<()> {
        self.enter(ProviderCall::Revoke {
            folder_id: folder.folder_id.clone(),
            email: email.to_string(),
            token: token.expose().to_string(),
        })
        .await?;

        let mut state = self.state();
        let entry = state
            .folders
            .get_mut(&folder.folder_id)
            .ok_or_else(|| Error::FolderNotFound(folder.folder_id.clone()))?;

        entry
            .members
            .remove(email)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("{} is not a member", email)))
    }

    async fn list_files(
        &self,
        token: &SecretToken,
        folder: &FolderHandle,
    ) -> Result<Vec<FileEntry>> {
        self.enter(ProviderCall::List {
            folder_id: folder.folder_id.clone(),
            token: token.expose().to_string(),
        })
        .await?;

        self.state()
            .folders
            .get(&folder.folder_id)
            .map(|f| f.files.clone())
            .ok_or_else(|| Error::FolderNotFound(folder.folder_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> SecretToken {
        SecretToken::new("tok")
    }

    #[tokio::test]
    async fn test_share_and_revoke() {
        let provider = MemoryProvider::new(Provider::GoogleDrive);
        let folder = provider.seed_folder("P");
        let email = Email::parse("a@lab.edu").unwrap();

        provider
            .share_folder(&token(), &folder, &email, PermissionLevel::Writer)
            .await
            .unwrap();
        assert_eq!(
            provider.members(&folder).get(&email),
            Some(&PermissionLevel::Writer)
        );

        provider.revoke_access(&token(), &folder, &email).await.unwrap();
        assert!(provider.members(&folder).is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_share_reports_already_shared() {
        let provider = MemoryProvider::new(Provider::Dropbox);
        let folder = provider.seed_folder("P");
        let email = Email::parse("a@lab.edu").unwrap();

        provider
            .share_folder(&token(), &folder, &email, PermissionLevel::Writer)
            .await
            .unwrap();
        let again = provider
            .share_folder(&token(), &folder, &email, PermissionLevel::Writer)
            .await;
        assert!(matches!(again, Err(Error::AlreadyShared(_))));
    }

    #[tokio::test]
    async fn test_revoke_non_member_is_not_found() {
        let provider = MemoryProvider::new(Provider::GoogleDrive);
        let folder = provider.seed_folder("P");
        let email = Email::parse("a@lab.edu").unwrap();

        let result = provider.revoke_access(&token(), &folder, &email).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_revoke_on_deleted_folder_is_folder_not_found() {
        let provider = MemoryProvider::new(Provider::Dropbox);
        let folder = provider.seed_folder("P");
        let email = Email::parse("a@lab.edu").unwrap();
        provider
            .share_folder(&token(), &folder, &email, PermissionLevel::Reader)
            .await
            .unwrap();
        provider.delete_folder(&folder);

        let result = provider.revoke_access(&token(), &folder, &email).await;
        assert!(matches!(result, Err(Error::FolderNotFound(_))));
    }

    #[tokio::test]
    async fn test_injected_failure_still_records_call() {
        let provider = MemoryProvider::new(Provider::GoogleDrive);
        provider.fail(Operation::CreateFolder, FailureMode::Unavailable);

        let result = provider.create_folder(&token(), "P").await;
        assert!(matches!(result, Err(Error::ProviderUnavailable(_))));
        assert_eq!(provider.call_count(Operation::CreateFolder), 1);

        provider.heal();
        let handle = provider.create_folder(&token(), "P").await.unwrap();
        assert_eq!(provider.folder_name(&handle).as_deref(), Some("P"));
    }

    #[tokio::test]
    async fn test_create_folder_name_collision() {
        let provider = MemoryProvider::new(Provider::Dropbox);
        provider.create_folder(&token(), "P").await.unwrap();
        let result = provider.create_folder(&token(), "P").await;
        assert!(matches!(result, Err(Error::ProviderRejected(_))));
    }
}
