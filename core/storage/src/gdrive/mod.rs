//! Google Drive storage provider for ResearchHub.
//!
//! This module provides a storage backend using Google Drive with:
//! - Folders addressed by stable file id
//! - Sharing through the separate per-file permissions collection
//! - Paginated folder and permission listing

pub mod client;
pub mod provider;

pub use client::{DriveClient, DriveFile, DrivePermission};
pub use provider::{GDriveConfig, GDriveProvider};
