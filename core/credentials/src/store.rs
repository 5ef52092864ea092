//! Per-user, per-provider OAuth credential storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use researchhub_common::{Error, Provider, Result, SecretToken, UserId};

/// OAuth token pair for one user on one provider.
///
/// Expiry is deliberately not tracked: staleness is discovered by
/// refreshing before use or by the provider rejecting the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Access token for API requests.
    pub access_token: SecretToken,
    /// Refresh token, when the provider issued one.
    pub refresh_token: Option<SecretToken>,
    /// When the access token was last written.
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(access_token: SecretToken, refresh_token: Option<SecretToken>) -> Self {
        Self {
            access_token,
            refresh_token,
            updated_at: Utc::now(),
        }
    }
}

/// Keyed credential store shared by every call path that touches a provider.
///
/// Writes are last-writer-wins per (user, provider) row; no cross-row
/// locking is performed.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch the credential for (user, provider), if connected.
    async fn get(&self, user: &UserId, provider: Provider) -> Result<Option<Credential>>;

    /// Insert or replace the credential for (user, provider).
    async fn set(&self, user: &UserId, provider: Provider, credential: Credential) -> Result<()>;

    /// Overwrite the access token after a refresh. A rotated refresh token
    /// replaces the stored one; `None` keeps it.
    ///
    /// # Errors
    /// - `NotFound` if no credential exists for (user, provider)
    async fn update_access_token(
        &self,
        user: &UserId,
        provider: Provider,
        access_token: SecretToken,
        refresh_token: Option<SecretToken>,
    ) -> Result<()>;

    /// Disconnect a provider for a user. Removing a missing row is a no-op.
    async fn remove(&self, user: &UserId, provider: Provider) -> Result<()>;
}

/// In-memory credential store.
#[derive(Default)]
pub struct MemoryCredentialStore {
    rows: RwLock<HashMap<(UserId, Provider), Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, user: &UserId, provider: Provider) -> Result<Option<Credential>> {
        Ok(self.rows.read().await.get(&(user.clone(), provider)).cloned())
    }

    async fn set(&self, user: &UserId, provider: Provider, credential: Credential) -> Result<()> {
        self.rows
            .write()
            .await
            .insert((user.clone(), provider), credential);
        Ok(())
    }

    async fn update_access_token(
        &self,
        user: &UserId,
        provider: Provider,
        access_token: SecretToken,
        refresh_token: Option<SecretToken>,
    ) -> Result<()> {
        let mut rows = self.rows.write().await;
        let row = rows.get_mut(&(user.clone(), provider)).ok_or_else(|| {
            Error::NotFound(format!("No {} credential for user {}", provider, user))
        })?;

        row.access_token = access_token;
        if let Some(rotated) = refresh_token {
            row.refresh_token = Some(rotated);
        }
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn remove(&self, user: &UserId, provider: Provider) -> Result<()> {
        self.rows.write().await.remove(&(user.clone(), provider));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn user() -> UserId {
        UserId::new("bob").unwrap()
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryCredentialStore::new();
        assert!(store.get(&user(), Provider::GoogleDrive).await.unwrap().is_none());

        store
            .set(
                &user(),
                Provider::GoogleDrive,
                Credential::new(SecretToken::new("a1"), Some(SecretToken::new("r1"))),
            )
            .await
            .unwrap();

        let cred = store.get(&user(), Provider::GoogleDrive).await.unwrap().unwrap();
        assert_eq!(cred.access_token.expose(), "a1");
        assert!(store.get(&user(), Provider::Dropbox).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_keeps_refresh_token_unless_rotated() {
        let store = MemoryCredentialStore::new();
        store
            .set(
                &user(),
                Provider::Dropbox,
                Credential::new(SecretToken::new("a1"), Some(SecretToken::new("r1"))),
            )
            .await
            .unwrap();

        store
            .update_access_token(&user(), Provider::Dropbox, SecretToken::new("a2"), None)
            .await
            .unwrap();
        let cred = store.get(&user(), Provider::Dropbox).await.unwrap().unwrap();
        assert_eq!(cred.access_token.expose(), "a2");
        assert_eq!(cred.refresh_token.unwrap().expose(), "r1");

        store
            .update_access_token(
                &user(),
                Provider::Dropbox,
                SecretToken::new("a3"),
                Some(SecretToken::new("r2")),
            )
            .await
            .unwrap();
        let cred = store.get(&user(), Provider::Dropbox).await.unwrap().unwrap();
        assert_eq!(cred.refresh_token.unwrap().expose(), "r2");
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let store = MemoryCredentialStore::new();
        let result = store
            .update_access_token(&user(), Provider::Dropbox, SecretToken::new("a"), None)
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_updates_last_writer_wins() {
        let store = Arc::new(MemoryCredentialStore::new());
        store
            .set(
                &user(),
                Provider::GoogleDrive,
                Credential::new(SecretToken::new("a0"), Some(SecretToken::new("r"))),
            )
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update_access_token(
                        &user(),
                        Provider::GoogleDrive,
                        SecretToken::new(format!("a{}", i + 1)),
                        None,
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let cred = store.get(&user(), Provider::GoogleDrive).await.unwrap().unwrap();
        assert!(cred.access_token.expose().starts_with('a'));
        assert_ne!(cred.access_token.expose(), "a0");
    }
}
