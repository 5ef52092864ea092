//! ResearchHub access mirroring.
//!
//! This module reflects membership decisions into external storage
//! providers, including:
//! - [`AccessMirror`]: shares or revokes linked folders after a membership
//!   transition commits
//! - [`FolderProvisioner`]: creates and links a folder per connected
//!   provider when a project is created
//! - [`FolderBrowser`]: lists a linked folder for display
//!
//! All provider work uses the project owner's credentials, refreshed
//! opportunistically before each call, and every call is bounded by
//! [`MirrorConfig::call_timeout`].

pub mod browser;
pub mod config;
pub mod orchestrator;
pub mod provisioner;
pub mod report;

#[cfg(test)]
mod testing;

pub use browser::FolderBrowser;
pub use config::{MirrorConfig, DEFAULT_CALL_TIMEOUT};
pub use orchestrator::AccessMirror;
pub use provisioner::FolderProvisioner;
pub use report::{MirrorAction, MirrorReport, ProviderOutcome, ProviderReport, SkipReason};
