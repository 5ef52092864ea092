//! Google Drive storage provider implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use researchhub_common::{Email, Error, Provider, Result, SecretToken};

use crate::provider::{FileEntry, FolderHandle, PermissionLevel, StorageProvider};

use super::client::{DriveClient, DriveFile, DRIVE_API_BASE};

/// Browser URL prefix for Drive folders.
const FOLDER_URL_BASE: &str = "https://drive.google.com/drive/folders";

/// Google Drive provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GDriveConfig {
    /// Drive API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Optional folder under which project folders are created.
    #[serde(default)]
    pub parent_folder_id: Option<String>,
}

fn default_api_base() -> String {
    DRIVE_API_BASE.to_string()
}

impl Default for GDriveConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            parent_folder_id: None,
        }
    }
}

/// Google Drive storage provider.
///
/// Folders are addressed by their stable file id; sharing goes through the
/// separate permissions collection on that id.
pub struct GDriveProvider {
    config: GDriveConfig,
    client: DriveClient,
}

impl GDriveProvider {
    /// Create a new Google Drive provider.
    ///
    /// # Errors
    /// - HTTP client construction failure
    pub fn new(config: GDriveConfig, timeout: Duration) -> Result<Self> {
        let client = DriveClient::new(config.api_base.clone(), timeout)?;
        Ok(Self { config, client })
    }

    fn role_for(level: PermissionLevel) -> &'static str {
        match level {
            PermissionLevel::Reader => "reader",
            PermissionLevel::Writer => "writer",
        }
    }

    /// A 404 on the folder itself means it was deleted or lost out of band.
    fn folder_missing(folder: &FolderHandle) -> impl FnOnce(Error) -> Error + '_ {
        move |e| match e {
            Error::NotFound(_) => {
                Error::FolderNotFound(format!("Drive folder {}", folder.folder_id))
            }
            other => other,
        }
    }

    /// Convert DriveFile to FileEntry.
    fn to_entry(file: DriveFile) -> FileEntry {
        FileEntry {
            size: file.size_bytes(),
            is_folder: file.is_folder(),
            modified: file.modified_time,
            id: file.id,
            name: file.name,
        }
    }
}

#[async_trait]
impl StorageProvider for GDriveProvider {
    fn kind(&self) -> Provider {
        Provider::GoogleDrive
    }

    async fn create_folder(&self, token: &SecretToken, name: &str) -> Result<FolderHandle> {
        let folder = self
            .client
            .create_folder(token, name, self.config.parent_folder_id.as_deref())
            .await?;

        let folder_url = folder
            .web_view_link
            .clone()
            .unwrap_or_else(|| format!("{}/{}", FOLDER_URL_BASE, folder.id));

        debug!(folder_id = %folder.id, "Created Drive folder");

        Ok(FolderHandle {
            folder_id: folder.id,
            folder_url,
        })
    }

    async fn share_folder(
        &self,
        token: &SecretToken,
        folder: &FolderHandle,
        email: &Email,
        level: PermissionLevel,
    ) -> Result<()> {
        self.client
            .create_permission(token, &folder.folder_id, email.as_str(), Self::role_for(level))
            .await
            .map_err(Self::folder_missing(folder))?;
        Ok(())
    }

    async fn revoke_access(
        &self,
        token: &SecretToken,
        folder: &FolderHandle,
        email: &Email,
    ) -> Result<()> {
        let permissions = self
            .client
            .list_permissions(token, &folder.folder_id)
            .await
            .map_err(Self::folder_missing(folder))?;

        let permission = permissions
            .into_iter()
            .find(|p| {
                p.email_address
                    .as_deref()
                    .is_some_and(|addr| addr.eq_ignore_ascii_case(email.as_str()))
            })
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "{} has no access to Drive folder {}",
                    email, folder.folder_id
                ))
            })?;

        self.client
            .delete_permission(token, &folder.folder_id, &permission.id)
            .await
    }

    async fn list_files(
        &self,
        token: &SecretToken,
        folder: &FolderHandle,
    ) -> Result<Vec<FileEntry>> {
        let files = self
            .client
            .list_folder(token, &folder.folder_id)
            .await
            .map_err(Self::folder_missing(folder))?;
        Ok(files.into_iter().map(Self::to_entry).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> GDriveProvider {
        let config = GDriveConfig {
            api_base: server.uri(),
            parent_folder_id: None,
        };
        GDriveProvider::new(config, Duration::from_secs(5)).unwrap()
    }

    fn handle() -> FolderHandle {
        FolderHandle {
            folder_id: "fold1".to_string(),
            folder_url: format!("{}/fold1", FOLDER_URL_BASE),
        }
    }

    fn token() -> SecretToken {
        SecretToken::new("owner-token")
    }

    #[tokio::test]
    async fn test_create_folder_uses_web_view_link() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/files"))
            .and(header("authorization", "Bearer owner-token"))
            .and(body_partial_json(serde_json::json!({
                "name": "Protein Folding",
                "mimeType": "application/vnd.google-apps.folder"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "fold1",
                "name": "Protein Folding",
                "mimeType": "application/vnd.google-apps.folder",
                "webViewLink": "https://drive.google.com/drive/folders/fold1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let created = provider(&server)
            .create_folder(&token(), "Protein Folding")
            .await
            .unwrap();

        assert_eq!(created, handle());
    }

    #[tokio::test]
    async fn test_share_folder_grants_writer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/files/fold1/permissions"))
            .and(query_param("sendNotificationEmail", "false"))
            .and(body_partial_json(serde_json::json!({
                "type": "user",
                "role": "writer",
                "emailAddress": "alice@lab.edu"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "perm-1",
                "emailAddress": "alice@lab.edu",
                "role": "writer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let email = Email::parse("alice@lab.edu").unwrap();
        provider(&server)
            .share_folder(&token(), &handle(), &email, PermissionLevel::Writer)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_share_missing_folder_is_folder_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/files/fold1/permissions"))
            .respond_with(ResponseTemplate::new(404).set_body_string("File not found"))
            .mount(&server)
            .await;

        let email = Email::parse("alice@lab.edu").unwrap();
        let result = provider(&server)
            .share_folder(&token(), &handle(), &email, PermissionLevel::Writer)
            .await;

        assert!(matches!(result, Err(Error::FolderNotFound(_))));
    }

    #[tokio::test]
    async fn test_revoke_deletes_matching_permission() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/fold1/permissions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "permissions": [
                    {"id": "perm-owner", "emailAddress": "bob@lab.edu", "role": "owner"},
                    {"id": "perm-1", "emailAddress": "Alice@Lab.edu", "role": "writer"}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/files/fold1/permissions/perm-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let email = Email::parse("alice@lab.edu").unwrap();
        provider(&server)
            .revoke_access(&token(), &handle(), &email)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_revoke_unknown_member_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/fold1/permissions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "permissions": [
                    {"id": "perm-owner", "emailAddress": "bob@lab.edu", "role": "owner"}
                ]
            })))
            .mount(&server)
            .await;

        let email = Email::parse("alice@lab.edu").unwrap();
        let result = provider(&server)
            .revoke_access(&token(), &handle(), &email)
            .await;

        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_revoke_on_deleted_folder_is_folder_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/fold1/permissions"))
            .respond_with(ResponseTemplate::new(404).set_body_string("File not found"))
            .mount(&server)
            .await;

        let email = Email::parse("alice@lab.edu").unwrap();
        let result = provider(&server)
            .revoke_access(&token(), &handle(), &email)
            .await;

        assert!(matches!(result, Err(Error::FolderNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_files_maps_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": [
                    {"id": "f1", "name": "draft.tex", "mimeType": "text/x-tex", "size": "2048"},
                    {"id": "f2", "name": "figures", "mimeType": "application/vnd.google-apps.folder"}
                ]
            })))
            .mount(&server)
            .await;

        let entries = provider(&server)
            .list_files(&token(), &handle())
            .await
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].size, Some(2048));
        assert!(entries[1].is_folder);
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/files"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = provider(&server).create_folder(&token(), "X").await;
        assert!(matches!(result, Err(Error::ProviderUnavailable(_))));
    }
}
