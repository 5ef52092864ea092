//! OAuth credential storage and refresh for ResearchHub.
//!
//! - [`CredentialStore`]: keyed (user, provider) token storage, passed
//!   explicitly to every consumer rather than held as ambient state
//! - [`TokenRefresher`]: stateless refresh-token exchange
//! - [`CredentialResolver`]: refresh-before-use with fallback to the stored token

pub mod refresher;
pub mod resolver;
pub mod sqlite;
pub mod store;

pub use refresher::{OAuthClientConfig, OAuthRefresher, RefreshedToken, TokenRefresher};
pub use resolver::CredentialResolver;
pub use sqlite::SqliteCredentialStore;
pub use store::{Credential, CredentialStore, MemoryCredentialStore};
