//! Dropbox API client.

use chrono::{DateTime, Utc};
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use researchhub_common::{Error, Result, SecretToken};

use crate::http::{build_client, status_error, transport_error};

/// Dropbox RPC API base URL.
pub const DROPBOX_API_BASE: &str = "https://api.dropboxapi.com/2";

/// Folder or file metadata returned by the files endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropboxEntry {
    /// Entry kind: "file", "folder" or "deleted".
    #[serde(rename = ".tag", default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub path_display: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub server_modified: Option<DateTime<Utc>>,
    /// Present on folders that are (inside) a shared folder.
    #[serde(default)]
    pub sharing_info: Option<SharingInfo>,
    /// Present on folders that are themselves a shared folder.
    #[serde(default)]
    pub shared_folder_id: Option<String>,
}

impl DropboxEntry {
    pub fn is_folder(&self) -> bool {
        self.tag.as_deref() == Some("folder")
    }

    /// The shared folder id, if this folder is shared.
    pub fn shared_folder_id(&self) -> Option<&str> {
        self.shared_folder_id.as_deref().or_else(|| {
            self.sharing_info
                .as_ref()
                .and_then(|info| info.shared_folder_id.as_deref())
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharingInfo {
    #[serde(default)]
    pub shared_folder_id: Option<String>,
    #[serde(default)]
    pub parent_shared_folder_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateFolderResponse {
    metadata: DropboxEntry,
}

#[derive(Debug, Deserialize)]
struct ListFolderResponse {
    entries: Vec<DropboxEntry>,
    cursor: String,
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct ShareFolderResponse {
    #[serde(rename = ".tag", default)]
    tag: Option<String>,
    #[serde(default)]
    shared_folder_id: Option<String>,
}

/// Dropbox RPC client.
///
/// Every endpoint is a JSON POST; application errors come back as HTTP 409
/// with an `error_summary` describing the failure path.
pub struct DropboxClient {
    http: Client,
    api_base: String,
}

impl DropboxClient {
    /// Create a new Dropbox client.
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: build_client(timeout)?,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    async fn rpc<T: DeserializeOwned>(
        &self,
        token: &SecretToken,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}/{}", self.api_base, endpoint);

        let response = self
            .http
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", token.expose()))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(endpoint, e))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| Error::ProviderUnavailable(format!("Failed to parse response: {}", e)));
        }

        let text = response.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT {
            Err(classify_endpoint_error(&text))
        } else {
            Err(status_error(status, &text))
        }
    }

    /// Create a folder at `path` without auto-renaming.
    pub async fn create_folder(&self, token: &SecretToken, path: &str) -> Result<DropboxEntry> {
        let response: CreateFolderResponse = self
            .rpc(
                token,
                "files/create_folder_v2",
                serde_json::json!({ "path": path, "autorename": false }),
            )
            .await?;
        Ok(response.metadata)
    }

    /// Get metadata for a path.
    pub async fn get_metadata(&self, token: &SecretToken, path: &str) -> Result<DropboxEntry> {
        self.rpc(token, "files/get_metadata", serde_json::json!({ "path": path }))
            .await
    }

    /// Turn the folder at `path` into a shared folder and return its id.
    pub async fn share_folder(&self, token: &SecretToken, path: &str) -> Result<String> {
        let response: ShareFolderResponse = self
            .rpc(
                token,
                "sharing/share_folder",
                serde_json::json!({ "path": path, "force_async": false }),
            )
            .await?;

        response.shared_folder_id.ok_or_else(|| {
            Error::ProviderUnavailable(format!(
                "Sharing of {} did not complete synchronously ({})",
                path,
                response.tag.unwrap_or_default()
            ))
        })
    }

    /// Add a member by email to a shared folder.
    pub async fn add_folder_member(
        &self,
        token: &SecretToken,
        shared_folder_id: &str,
        email: &str,
        access_level: &str,
    ) -> Result<()> {
        let _: serde_json::Value = self
            .rpc(
                token,
                "sharing/add_folder_member",
                serde_json::json!({
                    "shared_folder_id": shared_folder_id,
                    "members": [{
                        "member": { ".tag": "email", "email": email },
                        "access_level": { ".tag": access_level }
                    }],
                    "quiet": true
                }),
            )
            .await?;
        Ok(())
    }

    /// Remove a member by email from a shared folder.
    pub async fn remove_folder_member(
        &self,
        token: &SecretToken,
        shared_folder_id: &str,
        email: &str,
    ) -> Result<()> {
        let _: serde_json::Value = self
            .rpc(
                token,
                "sharing/remove_folder_member",
                serde_json::json!({
                    "shared_folder_id": shared_folder_id,
                    "member": { ".tag": "email", "email": email },
                    "leave_a_copy": false
                }),
            )
            .await?;
        Ok(())
    }

    /// List the direct children of `path`, following pagination cursors.
    pub async fn list_folder(&self, token: &SecretToken, path: &str) -> Result<Vec<DropboxEntry>> {
        let mut page: ListFolderResponse = self
            .rpc(token, "files/list_folder", serde_json::json!({ "path": path }))
            .await?;
        let mut entries = std::mem::take(&mut page.entries);

        while page.has_more {
            page = self
                .rpc(
                    token,
                    "files/list_folder/continue",
                    serde_json::json!({ "cursor": page.cursor }),
                )
                .await?;
            entries.append(&mut page.entries);
        }

        Ok(entries)
    }
}

/// Map a 409 endpoint error body to the error taxonomy.
///
/// Dropbox reports application errors as a slash-separated
/// `error_summary`, e.g. `path/conflict/folder/..` or
/// `member_error/not_a_member/..`. Only a missing member is `NotFound`;
/// a missing path is `FolderNotFound`.
pub(crate) fn classify_endpoint_error(body: &str) -> Error {
    let summary = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error_summary").and_then(|s| s.as_str()).map(String::from))
        .unwrap_or_else(|| body.to_string());

    if summary.contains("not_a_member") {
        Error::NotFound(summary)
    } else if summary.contains("not_found") {
        Error::FolderNotFound(summary)
    } else if summary.contains("already_shared") || summary.contains("already_member") {
        Error::AlreadyShared(summary)
    } else if summary.contains("conflict") {
        Error::ProviderRejected(format!("Name collision: {}", summary))
    } else {
        Error::ProviderRejected(summary)
    }
}
