//! Project membership lifecycle for ResearchHub.
//!
//! [`MembershipService`] is the single writer of membership state. It
//! commits each transition through a [`MembershipStore`] and then hands a
//! [`LifecycleEvent`] to every registered [`LifecycleListener`], such as
//! the access mirror or the [`ActivityLog`].

pub mod collaborators;
pub mod events;
pub mod model;
pub mod service;
pub mod sqlite;
pub mod store;

pub use collaborators::{
    AllowAnyEmail, DomainAllowList, EmailPolicy, MemoryUserDirectory, NotificationKind, Notifier,
    TracingNotifier, UserDirectory,
};
pub use events::{
    ActivityLog, ActivityRecorder, LifecycleEvent, LifecycleEventKind, LifecycleListener,
    TracingActivityRecorder,
};
pub use model::{
    ExternalFolderLink, GlobalRole, Membership, MembershipRole, MembershipStatus, Project, User,
    Visibility,
};
pub use service::MembershipService;
pub use sqlite::SqliteMembershipStore;
pub use store::{MemoryMembershipStore, MembershipStore, TransitionOutcome};
