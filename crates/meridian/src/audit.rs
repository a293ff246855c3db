//! Audit trail for hierarchy changes.
//!
//! [`AuditLog`] is the sink contract. [`TracingAuditLog`] emits each entry as
//! a structured `info` event under the `meridian::audit` target, so
//! deployments route it with the usual `RUST_LOG` filter.
//! [`MemoryAuditLog`] keeps entries in memory for inspection.

use crate::domain::IssueId;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::Mutex;
use tracing::info;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// An issue was placed under a (new) parent.
    Reparent,

    /// An issue's parent was removed.
    ClearParent,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reparent => write!(f, "reparent"),
            Self::ClearParent => write!(f, "clear_parent"),
        }
    }
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Kind of change
    pub action: AuditAction,

    /// The issue that moved
    pub issue_id: IssueId,

    /// Parent before the change
    pub previous_parent: Option<IssueId>,

    /// Parent after the change
    pub new_parent: Option<IssueId>,

    /// When the change was persisted
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    /// An entry for moving `issue_id` from `previous_parent` to `new_parent`.
    #[must_use]
    pub fn parent_change(
        issue_id: IssueId,
        previous_parent: Option<IssueId>,
        new_parent: Option<IssueId>,
    ) -> Self {
        let action = if new_parent.is_some() {
            AuditAction::Reparent
        } else {
            AuditAction::ClearParent
        };
        Self {
            action,
            issue_id,
            previous_parent,
            new_parent,
            at: Utc::now(),
        }
    }
}

/// Audit sink.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Record one entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink could not store the entry.
    async fn record(&self, entry: AuditEntry) -> Result<()>;
}

/// Emits entries as tracing events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLog;

#[async_trait]
impl AuditLog for TracingAuditLog {
    async fn record(&self, entry: AuditEntry) -> Result<()> {
        let previous = entry.previous_parent.as_ref().map(IssueId::as_str);
        let new = entry.new_parent.as_ref().map(IssueId::as_str);
        info!(
            target: "meridian::audit",
            action = %entry.action,
            issue_id = %entry.issue_id,
            previous_parent = previous,
            new_parent = new,
            at = %entry.at,
            "Hierarchy changed"
        );
        Ok(())
    }
}

/// Keeps entries in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    /// An empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries recorded so far, oldest first.
    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn record(&self, entry: AuditEntry) -> Result<()> {
        self.entries.lock().await.push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_follows_new_parent() {
        let moved = AuditEntry::parent_change("a".into(), None, Some("b".into()));
        assert_eq!(moved.action, AuditAction::Reparent);

        let cleared = AuditEntry::parent_change("a".into(), Some("b".into()), None);
        assert_eq!(cleared.action, AuditAction::ClearParent);
    }

    #[tokio::test]
    async fn test_memory_log_keeps_order() {
        let log = MemoryAuditLog::new();
        log.record(AuditEntry::parent_change("a".into(), None, Some("b".into())))
            .await
            .unwrap();
        log.record(AuditEntry::parent_change("a".into(), Some("b".into()), None))
            .await
            .unwrap();

        let actions: Vec<_> = log.entries().await.iter().map(|e| e.action).collect();
        assert_eq!(actions, [AuditAction::Reparent, AuditAction::ClearParent]);
    }

    #[tokio::test]
    async fn test_tracing_log_accepts_entries() {
        TracingAuditLog
            .record(AuditEntry::parent_change("a".into(), None, None))
            .await
            .unwrap();
    }
}
