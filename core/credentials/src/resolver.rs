//! Opportunistic refresh-before-use of stored credentials.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use researchhub_common::{Error, Provider, Result, SecretToken, UserId};

use crate::refresher::TokenRefresher;
use crate::store::CredentialStore;

/// Resolves a usable access token for (user, provider).
///
/// When the stored credential has a refresh token, a refresh is attempted
/// before every use and the result persisted. A failed or timed-out
/// refresh falls back to the stored access token instead of aborting;
/// the provider call that follows decides whether it was still valid.
#[derive(Clone)]
pub struct CredentialResolver {
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    refresh_timeout: Duration,
}

impl CredentialResolver {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn TokenRefresher>,
        refresh_timeout: Duration,
    ) -> Self {
        Self {
            store,
            refresher,
            refresh_timeout,
        }
    }

    /// The underlying credential store.
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Get an access token for (user, provider), refreshing first when possible.
    ///
    /// Returns `Ok(None)` when the user has not connected the provider.
    ///
    /// # Errors
    /// - Credential store read failure
    pub async fn access_token(
        &self,
        user: &UserId,
        provider: Provider,
    ) -> Result<Option<SecretToken>> {
        let Some(credential) = self.store.get(user, provider).await? else {
            return Ok(None);
        };

        let Some(refresh_token) = credential.refresh_token.as_ref() else {
            return Ok(Some(credential.access_token.clone()));
        };

        let refreshed = match tokio::time::timeout(
            self.refresh_timeout,
            self.refresher.refresh(provider, refresh_token),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "Token refresh exceeded {:?}",
                self.refresh_timeout
            ))),
        };

        match refreshed {
            Ok(fresh) => {
                debug!(user_id = %user, provider = %provider, "Persisting refreshed access token");
                if let Err(e) = self
                    .store
                    .update_access_token(
                        user,
                        provider,
                        fresh.access_token.clone(),
                        fresh.refresh_token.clone(),
                    )
                    .await
                {
                    warn!(
                        user_id = %user,
                        provider = %provider,
                        error = %e,
                        "Failed to persist refreshed token; using it for this call only"
                    );
                }
                Ok(Some(fresh.access_token))
            }
            Err(e) => {
                warn!(
                    user_id = %user,
                    provider = %provider,
                    error = %e,
                    "Token refresh failed; falling back to stored access token"
                );
                Ok(Some(credential.access_token.clone()))
            }
        }
    }
}
