//! Storage provider trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use researchhub_common::{Email, Provider, Result, SecretToken};

/// Identity of a provider folder as recorded on the project.
///
/// Providers differ in how they address a folder afterwards: some use the
/// opaque id, others derive a path from the URL. Adapters pick whichever
/// field they need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderHandle {
    /// Provider-specific folder identifier.
    pub folder_id: String,
    /// Browser URL for the folder.
    pub folder_url: String,
}

/// Access level granted when sharing a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    /// Read-only access.
    Reader,
    /// Read/write access (Drive "writer", Dropbox "editor").
    Writer,
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionLevel::Reader => f.write_str("reader"),
            PermissionLevel::Writer => f.write_str("writer"),
        }
    }
}

/// An entry listed from a provider folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Provider-specific identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Whether this is a folder.
    pub is_folder: bool,
    /// Size in bytes (None for folders).
    pub size: Option<u64>,
    /// Last modification time, if the provider reports one.
    pub modified: Option<DateTime<Utc>>,
}

/// Uniform capability surface over external storage providers.
///
/// Every call takes the access token to use explicitly; adapters hold no
/// credentials of their own. Implementations must bound every network
/// call with a timeout.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Which provider this adapter talks to.
    fn kind(&self) -> Provider;

    /// Create a folder named `name`.
    ///
    /// # Errors
    /// - `ProviderUnavailable` on network or server failure
    /// - `ProviderRejected` if the provider refuses (e.g. name collision)
    async fn create_folder(&self, token: &SecretToken, name: &str) -> Result<FolderHandle>;

    /// Grant `email` access to the folder at `level`.
    ///
    /// # Errors
    /// - `ProviderUnavailable` on network or server failure
    /// - `NotFound` if the folder is missing or was moved out of band
    /// - `AlreadyShared` if the email already has access (callers treat this as success)
    async fn share_folder(
        &self,
        token: &SecretToken,
        folder: &FolderHandle,
        email: &Email,
        level: PermissionLevel,
    ) -> Result<()>;

    /// Remove `email`'s access to the folder.
    ///
    /// # Errors
    /// - `NotFound` if the email was never a member (callers treat this as success)
    async fn revoke_access(
        &self,
        token: &SecretToken,
        folder: &FolderHandle,
        email: &Email,
    ) -> Result<()>;

    /// List the folder's direct children. Read-only.
    async fn list_files(&self, token: &SecretToken, folder: &FolderHandle)
        -> Result<Vec<FileEntry>>;
}
