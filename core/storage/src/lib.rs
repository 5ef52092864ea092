//! Storage provider adapters for ResearchHub.
//!
//! This module provides a trait-based interface over the external
//! document stores a project can be linked to (a Drive-like service and a
//! Dropbox-like service) and a registry for resolving adapters by
//! provider kind.
//!
//! # Design Principles
//! - Provider isolation: addressing schemes (id vs. path) stay inside each adapter
//! - Stateless adapters: the caller supplies the access token on every call
//! - Bounded calls: every HTTP request carries a timeout
//! - Unified error semantics: consistent error types across providers

pub mod dropbox;
pub mod gdrive;
mod http;
pub mod memory;
pub mod provider;
pub mod registry;

pub use dropbox::{DropboxConfig, DropboxProvider};
pub use gdrive::{GDriveConfig, GDriveProvider};
pub use memory::{FailureMode, MemoryProvider, Operation, ProviderCall};
pub use provider::{FileEntry, FolderHandle, PermissionLevel, StorageProvider};
pub use registry::{create_default_registry, ProviderRegistry};
