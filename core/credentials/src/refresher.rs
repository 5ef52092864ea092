//! OAuth2 access-token refresh.

use async_trait::async_trait;
use oauth2::basic::BasicClient;
use oauth2::{
    ClientId, ClientSecret, EndpointNotSet, EndpointSet, RefreshToken, RequestTokenError,
    TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use researchhub_common::{Error, Provider, Result, SecretToken};

/// Google OAuth2 token endpoint.
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Dropbox OAuth2 token endpoint.
const DROPBOX_TOKEN_URL: &str = "https://api.dropboxapi.com/oauth2/token";

/// Result of a successful refresh.
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    /// The new access token.
    pub access_token: SecretToken,
    /// A rotated refresh token, when the provider issued one.
    pub refresh_token: Option<SecretToken>,
}

/// Exchanges a refresh token for a fresh access token.
///
/// Stateless with respect to the caller: persisting the result back into
/// the credential store is the caller's job.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, provider: Provider, refresh_token: &SecretToken)
        -> Result<RefreshedToken>;
}

/// OAuth2 client registration for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthClientConfig {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Token endpoint; defaults to the provider's public endpoint.
    #[serde(default)]
    pub token_url: Option<String>,
}

impl OAuthClientConfig {
    fn token_url_for(&self, provider: Provider) -> String {
        self.token_url.clone().unwrap_or_else(|| {
            match provider {
                Provider::GoogleDrive => GOOGLE_TOKEN_URL,
                Provider::Dropbox => DROPBOX_TOKEN_URL,
            }
            .to_string()
        })
    }
}

type RefreshClient =
    BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Token refresher backed by the `oauth2` crate.
pub struct OAuthRefresher {
    clients: HashMap<Provider, RefreshClient>,
    http: oauth2::reqwest::Client,
}

impl OAuthRefresher {
    /// Create a refresher for the given provider registrations.
    ///
    /// Every token request is bounded by `timeout`.
    pub fn new(configs: HashMap<Provider, OAuthClientConfig>, timeout: Duration) -> Result<Self> {
        let mut clients = HashMap::new();

        for (provider, config) in configs {
            let token_url = TokenUrl::new(config.token_url_for(provider))
                .map_err(|e| Error::InvalidInput(format!("Invalid token URL: {}", e)))?;

            let mut client =
                BasicClient::new(ClientId::new(config.client_id.clone())).set_token_uri(token_url);
            if let Some(secret) = &config.client_secret {
                client = client.set_client_secret(ClientSecret::new(secret.clone()));
            }

            clients.insert(provider, client);
        }

        // Following redirects on token requests would leak the refresh token.
        let http = oauth2::reqwest::ClientBuilder::new()
            .redirect(oauth2::reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| Error::ProviderUnavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { clients, http })
    }

    /// Providers this refresher has a client registration for.
    pub fn providers(&self) -> Vec<Provider> {
        self.clients.keys().copied().collect()
    }
}

#[async_trait]
impl TokenRefresher for OAuthRefresher {
    async fn refresh(
        &self,
        provider: Provider,
        refresh_token: &SecretToken,
    ) -> Result<RefreshedToken> {
        let client = self.clients.get(&provider).ok_or_else(|| {
            Error::Authentication(format!("No OAuth client configured for {}", provider))
        })?;

        let token_result = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.expose().to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| match e {
                RequestTokenError::ServerResponse(resp) => {
                    Error::Authentication(format!("Token refresh rejected: {}", resp))
                }
                other => Error::ProviderUnavailable(format!("Token refresh failed: {}", other)),
            })?;

        debug!(provider = %provider, "Refreshed access token");

        Ok(RefreshedToken {
            access_token: SecretToken::new(token_result.access_token().secret().clone()),
            refresh_token: token_result
                .refresh_token()
                .map(|t| SecretToken::new(t.secret().clone())),
        })
    }
}
