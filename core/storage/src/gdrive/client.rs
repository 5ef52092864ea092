//! Google Drive API client.

use chrono::{DateTime, Utc};
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use researchhub_common::{Error, Result, SecretToken};

use crate::http::{build_client, handle_response, status_error, transport_error};

/// Google Drive API base URL.
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// MIME type Drive uses for folders.
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

const FILE_FIELDS: &str = "id,name,mimeType,size,modifiedTime,webViewLink";

/// Google Drive file metadata from API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID.
    pub id: String,
    /// File name.
    pub name: String,
    /// MIME type.
    pub mime_type: String,
    /// File size in bytes (only for files, not folders).
    #[serde(default)]
    pub size: Option<String>,
    /// Modified time.
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
    /// Browser link.
    #[serde(default)]
    pub web_view_link: Option<String>,
}

impl DriveFile {
    /// Check if this is a folder.
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    /// Get size as u64.
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_ref().and_then(|s| s.parse().ok())
    }
}

/// A sharing permission on a Drive file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrivePermission {
    pub id: String,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PermissionListResponse {
    #[serde(default)]
    permissions: Vec<DrivePermission>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Google Drive API client.
///
/// Stateless with respect to credentials: every call takes the bearer token.
pub struct DriveClient {
    http: Client,
    api_base: Url,
}

impl DriveClient {
    /// Create a new Drive client.
    pub fn new(api_base: impl AsRef<str>, timeout: Duration) -> Result<Self> {
        let api_base = Url::parse(api_base.as_ref())
            .map_err(|e| Error::InvalidInput(format!("Invalid Drive API base: {}", e)))?;
        if api_base.cannot_be_a_base() {
            return Err(Error::InvalidInput(format!(
                "Drive API base {} cannot hold a path",
                api_base
            )));
        }

        Ok(Self {
            http: build_client(timeout)?,
            api_base,
        })
    }

    /// Build an endpoint URL, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                Error::InvalidInput(format!("Drive API base {} cannot hold a path", self.api_base))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn auth_header(token: &SecretToken) -> String {
        format!("Bearer {}", token.expose())
    }

    /// Create a folder, optionally under `parent_id`.
    pub async fn create_folder(
        &self,
        token: &SecretToken,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<DriveFile> {
        let url = self.endpoint(&["files"])?;

        let mut metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE
        });

        if let Some(parent) = parent_id {
            metadata["parents"] = serde_json::json!([parent]);
        }

        let response = self
            .http
            .post(url)
            .header(header::AUTHORIZATION, Self::auth_header(token))
            .query(&[("fields", FILE_FIELDS)])
            .json(&metadata)
            .send()
            .await
            .map_err(|e| transport_error("Failed to create folder", e))?;

        handle_response(response).await
    }

    /// Add a user permission to a file or folder.
    pub async fn create_permission(
        &self,
        token: &SecretToken,
        file_id: &str,
        email: &str,
        role: &str,
    ) -> Result<DrivePermission> {
        let url = self.endpoint(&["files", file_id, "permissions"])?;

        let body = serde_json::json!({
            "type": "user",
            "role": role,
            "emailAddress": email,
        });

        let response = self
            .http
            .post(url)
            .header(header::AUTHORIZATION, Self::auth_header(token))
            .query(&[
                ("sendNotificationEmail", "false"),
                ("fields", "id,emailAddress,role"),
            ])
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("Failed to create permission", e))?;

        handle_response(response).await
    }

    /// List every permission on a file or folder.
    pub async fn list_permissions(
        &self,
        token: &SecretToken,
        file_id: &str,
    ) -> Result<Vec<DrivePermission>> {
        let mut all = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = self.endpoint(&["files", file_id, "permissions"])?;

            let mut request = self
                .http
                .get(url)
                .header(header::AUTHORIZATION, Self::auth_header(token))
                .query(&[(
                    "fields",
                    "permissions(id,emailAddress,role),nextPageToken",
                )]);

            if let Some(page) = &page_token {
                request = request.query(&[("pageToken", page.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| transport_error("Failed to list permissions", e))?;

            let page: PermissionListResponse = handle_response(response).await?;
            all.extend(page.permissions);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(all)
    }

    /// Delete a permission by id.
    pub async fn delete_permission(
        &self,
        token: &SecretToken,
        file_id: &str,
        permission_id: &str,
    ) -> Result<()> {
        let url = self.endpoint(&["files", file_id, "permissions", permission_id])?;

        let response = self
            .http
            .delete(url)
            .header(header::AUTHORIZATION, Self::auth_header(token))
            .send()
            .await
            .map_err(|e| transport_error("Failed to delete permission", e))?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT || status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(status_error(status, &body))
        }
    }

    /// List files in a folder.
    pub async fn list_folder(&self, token: &SecretToken, folder_id: &str) -> Result<Vec<DriveFile>> {
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;
        let fields = format!("files({}),nextPageToken", FILE_FIELDS);

        loop {
            let url = self.endpoint(&["files"])?;
            let query = parents_query(folder_id);

            let mut request = self
                .http
                .get(url)
                .header(header::AUTHORIZATION, Self::auth_header(token))
                .query(&[
                    ("q", query.as_str()),
                    ("fields", fields.as_str()),
                    ("pageSize", "1000"),
                ]);

            if let Some(page) = &page_token {
                request = request.query(&[("pageToken", page.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| transport_error("Failed to list folder", e))?;

            let list_response: FileListResponse = handle_response(response).await?;
            all_files.extend(list_response.files);

            match list_response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        if all_files.is_empty() {
            // An empty listing is indistinguishable from a missing folder in
            // the query API, so confirm the folder still exists.
            self.get_file(token, folder_id).await?;
        }

        Ok(all_files)
    }

    /// Get file metadata by ID.
    pub async fn get_file(&self, token: &SecretToken, file_id: &str) -> Result<DriveFile> {
        let url = self.endpoint(&["files", file_id])?;

        let response = self
            .http
            .get(url)
            .header(header::AUTHORIZATION, Self::auth_header(token))
            .query(&[("fields", FILE_FIELDS)])
            .send()
            .await
            .map_err(|e| transport_error("Failed to get file", e))?;

        handle_response(response).await.map_err(|e| match e {
            Error::NotFound(_) => Error::NotFound(format!("Drive file {} not found", file_id)),
            other => other,
        })
    }
}

/// Search expression for the non-trashed children of `folder_id`.
fn parents_query(folder_id: &str) -> String {
    let escaped = folder_id.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}' in parents and trashed = false", escaped)
}
