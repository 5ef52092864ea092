//! Dropbox storage provider implementation.

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use researchhub_common::{Email, Error, Provider, Result, SecretToken};

use crate::provider::{FileEntry, FolderHandle, PermissionLevel, StorageProvider};

use super::client::{DropboxClient, DropboxEntry, DROPBOX_API_BASE};

/// Canonical browser URL prefix; the folder path follows it.
const WEB_HOME_BASE: &str = "https://www.dropbox.com/home";

/// Dropbox provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropboxConfig {
    /// RPC API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Browser URL prefix that folder URLs are built from and parsed against.
    #[serde(default = "default_web_base")]
    pub web_base: String,
    /// Folder under which project folders are created.
    #[serde(default = "default_root_path")]
    pub root_path: String,
}

fn default_api_base() -> String {
    DROPBOX_API_BASE.to_string()
}

fn default_web_base() -> String {
    WEB_HOME_BASE.to_string()
}

fn default_root_path() -> String {
    "/ResearchHub".to_string()
}

impl Default for DropboxConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            web_base: default_web_base(),
            root_path: default_root_path(),
        }
    }
}

/// Dropbox storage provider.
///
/// Folders are addressed by path. The path is recovered from the stored
/// folder URL by stripping the canonical web prefix, so a folder renamed
/// out of band surfaces as `FolderNotFound`. Sharing first promotes the folder
/// to a shared folder, then manages members on the shared folder id.
pub struct DropboxProvider {
    config: DropboxConfig,
    client: DropboxClient,
}

impl DropboxProvider {
    /// Create a new Dropbox provider.
    pub fn new(config: DropboxConfig, timeout: Duration) -> Result<Self> {
        let client = DropboxClient::new(config.api_base.clone(), timeout)?;
        Ok(Self { config, client })
    }

    fn access_level(level: PermissionLevel) -> &'static str {
        match level {
            PermissionLevel::Reader => "viewer",
            PermissionLevel::Writer => "editor",
        }
    }

    /// Build the browser URL for a folder path.
    fn folder_url(&self, path: &str) -> Result<String> {
        let mut url = Url::parse(&self.config.web_base)
            .map_err(|e| Error::InvalidInput(format!("Invalid Dropbox web base: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::InvalidInput("Dropbox web base cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url.to_string())
    }

    /// Recover the folder path from a handle.
    fn folder_path(&self, folder: &FolderHandle) -> Result<String> {
        let prefix = self.config.web_base.trim_end_matches('/');
        let encoded = folder.folder_url.strip_prefix(prefix).ok_or_else(|| {
            Error::InvalidInput(format!(
                "Folder URL {} is not under {}",
                folder.folder_url, prefix
            ))
        })?;
        let decoded = percent_decode_str(encoded)
            .decode_utf8()
            .map_err(|e| Error::InvalidInput(format!("Folder URL is not UTF-8: {}", e)))?;

        let path = decoded.trim_end_matches('/');
        if path.is_empty() || !path.starts_with('/') {
            return Err(Error::InvalidInput(format!(
                "Folder URL {} carries no path",
                folder.folder_url
            )));
        }
        Ok(path.to_string())
    }

    /// Turn a project title into a single path segment.
    ///
    /// URL parsing collapses `.` and `..` segments, which would point the
    /// stored folder URL at the parent folder, so dot-only names are replaced.
    fn folder_name(name: &str) -> String {
        let name = name.trim().replace(['/', '\\'], "-");
        if name.is_empty() {
            "Untitled".to_string()
        } else if name.chars().all(|c| c == '.') {
            "-".repeat(name.len())
        } else {
            name
        }
    }

    /// Resolve (or create) the shared folder id for a path.
    async fn ensure_shared(&self, token: &SecretToken, path: &str) -> Result<String> {
        let entry = self.client.get_metadata(token, path).await?;
        if let Some(id) = entry.shared_folder_id() {
            return Ok(id.to_string());
        }

        match self.client.share_folder(token, path).await {
            Ok(id) => Ok(id),
            Err(Error::AlreadyShared(_)) => {
                // Raced with another share; the metadata now carries the id.
                let entry = self.client.get_metadata(token, path).await?;
                entry.shared_folder_id().map(String::from).ok_or_else(|| {
                    Error::ProviderUnavailable(format!("{} is shared but has no id", path))
                })
            }
            Err(e) => Err(e),
        }
    }

    fn to_entry(entry: DropboxEntry) -> FileEntry {
        FileEntry {
            is_folder: entry.is_folder(),
            id: entry
                .id
                .clone()
                .or_else(|| entry.path_display.clone())
                .unwrap_or_else(|| entry.name.clone()),
            name: entry.name,
            size: entry.size,
            modified: entry.server_modified,
        }
    }
}

#[async_trait]
impl StorageProvider for DropboxProvider {
    fn kind(&self) -> Provider {
        Provider::Dropbox
    }

    async fn create_folder(&self, token: &SecretToken, name: &str) -> Result<FolderHandle> {
        let path = format!(
            "{}/{}",
            self.config.root_path.trim_end_matches('/'),
            Self::folder_name(name)
        );

        let entry = self.client.create_folder(token, &path).await?;
        let display_path = entry.path_display.clone().unwrap_or(path);

        debug!(path = %display_path, "Created Dropbox folder");

        Ok(FolderHandle {
            folder_id: entry.id.unwrap_or_else(|| display_path.clone()),
            folder_url: self.folder_url(&display_path)?,
        })
    }

    async fn share_folder(
        &self,
        token: &SecretToken,
        folder: &FolderHandle,
        email: &Email,
        level: PermissionLevel,
    ) -> Result<()> {
        let path = self.folder_path(folder)?;
        let shared_folder_id = self.ensure_shared(token, &path).await?;

        self.client
            .add_folder_member(
                token,
                &shared_folder_id,
                email.as_str(),
                Self::access_level(level),
            )
            .await
    }

    async fn revoke_access(
        &self,
        token: &SecretToken,
        folder: &FolderHandle,
        email: &Email,
    ) -> Result<()> {
        let path = self.folder_path(folder)?;
        let entry = self.client.get_metadata(token, &path).await?;

        // A folder that was never shared has no members to remove.
        let shared_folder_id = entry.shared_folder_id().ok_or_else(|| {
            Error::NotFound(format!("{} is not shared with {}", path, email))
        })?;

        self.client
            .remove_folder_member(token, shared_folder_id, email.as_str())
            .await
    }

    async fn list_files(
        &self,
        token: &SecretToken,
        folder: &FolderHandle,
    ) -> Result<Vec<FileEntry>> {
        let path = self.folder_path(folder)?;
        let entries = self.client.list_folder(token, &path).await?;
        Ok(entries
            .into_iter()
            .filter(|e| e.tag.as_deref() != Some("deleted"))
            .map(Self::to_entry)
            .collect())
    }
}
