//! Membership lifecycle events and their listeners.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use researchhub_common::{ProjectId, UserId};

/// Kind of lifecycle transition that was committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEventKind {
    JoinRequested,
    Approved,
    Rejected,
    Removed,
}

impl LifecycleEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEventKind::JoinRequested => "join_requested",
            LifecycleEventKind::Approved => "approved",
            LifecycleEventKind::Rejected => "rejected",
            LifecycleEventKind::Removed => "removed",
        }
    }
}

impl fmt::Display for LifecycleEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A committed membership transition.
///
/// Events are only published after the store has accepted the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub kind: LifecycleEventKind,
    pub project_id: ProjectId,
    /// The member whose status changed.
    pub user_id: UserId,
    /// The user who performed the transition.
    pub acting_user_id: UserId,
    pub timestamp: DateTime<Utc>,
}

impl LifecycleEvent {
    pub fn new(
        kind: LifecycleEventKind,
        project_id: ProjectId,
        user_id: UserId,
        acting_user_id: UserId,
    ) -> Self {
        Self {
            kind,
            project_id,
            user_id,
            acting_user_id,
            timestamp: Utc::now(),
        }
    }

    fn describe(&self) -> String {
        match self.kind {
            LifecycleEventKind::JoinRequested => format!("{} requested to join", self.user_id),
            LifecycleEventKind::Approved => format!("{} approved {}", self.acting_user_id, self.user_id),
            LifecycleEventKind::Rejected => format!("{} rejected {}", self.acting_user_id, self.user_id),
            LifecycleEventKind::Removed => format!("{} removed {}", self.acting_user_id, self.user_id),
        }
    }
}

/// Observer of committed lifecycle events.
///
/// Listeners cannot fail the transition that produced the event; anything
/// that goes wrong inside `on_event` must be handled there.
#[async_trait]
pub trait LifecycleListener: Send + Sync {
    async fn on_event(&self, event: &LifecycleEvent);
}

/// Persists activity entries for the project feed.
#[async_trait]
pub trait ActivityRecorder: Send + Sync {
    async fn record(&self, project_id: &ProjectId, actor: &UserId, action: &str, message: String);
}

/// Activity recorder that writes entries to the tracing log.
#[derive(Debug, Default, Clone)]
pub struct TracingActivityRecorder;

#[async_trait]
impl ActivityRecorder for TracingActivityRecorder {
    async fn record(&self, project_id: &ProjectId, actor: &UserId, action: &str, message: String) {
        tracing::info!(
            project_id = %project_id,
            actor = %actor,
            action,
            "{}",
            message
        );
    }
}

/// Listener that turns lifecycle events into activity entries.
pub struct ActivityLog {
    recorder: Arc<dyn ActivityRecorder>,
}

impl ActivityLog {
    pub fn new(recorder: Arc<dyn ActivityRecorder>) -> Self {
        Self { recorder }
    }
}

#[async_trait]
impl LifecycleListener for ActivityLog {
    async fn on_event(&self, event: &LifecycleEvent) {
        self.recorder
            .record(
                &event.project_id,
                &event.acting_user_id,
                event.kind.as_str(),
                event.describe(),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Captured {
        entries: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl ActivityRecorder for Captured {
        async fn record(&self, project_id: &ProjectId, actor: &UserId, action: &str, message: String) {
            self.entries
                .lock()
                .await
                .push((format!("{}:{}", project_id, actor), action.to_string(), message));
        }
    }

    #[tokio::test]
    async fn test_activity_log_records_acting_user() {
        let captured = Arc::new(Captured::default());
        let log = ActivityLog::new(captured.clone());

        let event = LifecycleEvent::new(
            LifecycleEventKind::Approved,
            ProjectId::new("p1").unwrap(),
            UserId::new("alice").unwrap(),
            UserId::new("bob").unwrap(),
        );
        log.on_event(&event).await;

        let entries = captured.entries.lock().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "p1:bob");
        assert_eq!(entries[0].1, "approved");
        assert_eq!(entries[0].2, "bob approved alice");
    }
}
