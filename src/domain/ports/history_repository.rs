//! Progress history repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::GoalHistoryEntry;

/// Append-only store of practiced goals per learner.
///
/// There is deliberately no update or delete operation. Two appends of the
/// same session produce two entries; concurrent appends for one learner are
/// merged by timestamp order on read.
#[async_trait]
pub trait ProgressHistoryRepository: Send + Sync {
    /// Append one entry.
    async fn append(&self, entry: &GoalHistoryEntry) -> DomainResult<()>;

    /// Append several entries as one unit.
    async fn append_all(&self, entries: &[GoalHistoryEntry]) -> DomainResult<()>;

    /// All entries for a learner, oldest first (ties in insertion order).
    async fn list_for_learner(&self, learner_id: &str) -> DomainResult<Vec<GoalHistoryEntry>>;

    /// Entries belonging to the learner's `limit` most recent sessions,
    /// oldest first.
    async fn recent_sessions(
        &self,
        learner_id: &str,
        limit: usize,
    ) -> DomainResult<Vec<GoalHistoryEntry>>;

    /// Entries recorded for one session.
    async fn list_for_session(&self, session_id: Uuid) -> DomainResult<Vec<GoalHistoryEntry>>;
}
