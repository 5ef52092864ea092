//! Dropbox storage provider for ResearchHub.
//!
//! Folders are addressed by path, recovered from the canonical web URL
//! stored on the project. Members are managed on the shared-folder id
//! obtained by promoting the folder to a shared folder on first share.

pub mod client;
pub mod provider;

pub use client::{DropboxClient, DropboxEntry};
pub use provider::{DropboxConfig, DropboxProvider};
