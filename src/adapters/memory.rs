//! In-memory repositories.
//!
//! Used by tests and by one-off CLI runs that should not touch the
//! database.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AssessmentProfile, GoalHistoryEntry};
use crate::domain::ports::{ProfileRepository, ProgressHistoryRepository};

/// Append-only history held in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryHistoryRepository {
    entries: RwLock<Vec<GoalHistoryEntry>>,
}

impl InMemoryHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<GoalHistoryEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Stable sort by timestamp so equal timestamps keep insertion order.
fn in_time_order(mut entries: Vec<GoalHistoryEntry>) -> Vec<GoalHistoryEntry> {
    entries.sort_by_key(|e| e.recorded_at);
    entries
}

#[async_trait]
impl ProgressHistoryRepository for InMemoryHistoryRepository {
    async fn append(&self, entry: &GoalHistoryEntry) -> DomainResult<()> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn append_all(&self, entries: &[GoalHistoryEntry]) -> DomainResult<()> {
        self.entries.write().await.extend_from_slice(entries);
        Ok(())
    }

    async fn list_for_learner(&self, learner_id: &str) -> DomainResult<Vec<GoalHistoryEntry>> {
        let entries = self.entries.read().await;
        Ok(in_time_order(
            entries.iter().filter(|e| e.learner_id == learner_id).cloned().collect(),
        ))
    }

    async fn recent_sessions(&self, learner_id: &str, limit: usize) -> DomainResult<Vec<GoalHistoryEntry>> {
        let entries = self.entries.read().await;

        let mut latest: HashMap<Uuid, (chrono::DateTime<chrono::Utc>, usize)> = HashMap::new();
        for (seq, entry) in entries.iter().enumerate().filter(|(_, e)| e.learner_id == learner_id) {
            let key = (entry.recorded_at, seq);
            latest
                .entry(entry.session_id)
                .and_modify(|k| *k = (*k).max(key))
                .or_insert(key);
        }

        let mut sessions: Vec<(Uuid, (chrono::DateTime<chrono::Utc>, usize))> = latest.into_iter().collect();
        sessions.sort_by(|a, b| b.1.cmp(&a.1));
        let keep: Vec<Uuid> = sessions.into_iter().take(limit).map(|(id, _)| id).collect();

        Ok(in_time_order(
            entries
                .iter()
                .filter(|e| e.learner_id == learner_id && keep.contains(&e.session_id))
                .cloned()
                .collect(),
        ))
    }

    async fn list_for_session(&self, session_id: Uuid) -> DomainResult<Vec<GoalHistoryEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().filter(|e| e.session_id == session_id).cloned().collect())
    }
}

/// Profiles held in save order.
#[derive(Debug, Default)]
pub struct InMemoryProfileRepository {
    profiles: RwLock<Vec<AssessmentProfile>>,
}

impl InMemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn save(&self, profile: &AssessmentProfile) -> DomainResult<()> {
        self.profiles.write().await.push(profile.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<AssessmentProfile>> {
        Ok(self.profiles.read().await.iter().find(|p| p.id == id).cloned())
    }

    async fn latest_for_learner(&self, learner_id: &str) -> DomainResult<Option<AssessmentProfile>> {
        Ok(self.list_for_learner(learner_id).await?.pop())
    }

    async fn list_for_learner(&self, learner_id: &str) -> DomainResult<Vec<AssessmentProfile>> {
        let mut profiles: Vec<AssessmentProfile> = self
            .profiles
            .read()
            .await
            .iter()
            .filter(|p| p.learner_id == learner_id)
            .cloned()
            .collect();
        profiles.sort_by_key(|p| p.computed_at);
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{GoalId, GoalOutcome};
    use chrono::{Duration, Utc};

    fn entry(session: Uuid, goal: &str, minutes_ago: i64) -> GoalHistoryEntry {
        GoalHistoryEntry::new(
            "learner",
            session,
            GoalId::new(goal),
            GoalOutcome::Attempted,
            Utc::now() - Duration::minutes(minutes_ago),
        )
    }

    #[tokio::test]
    async fn test_list_orders_by_time_then_insertion() {
        let repo = InMemoryHistoryRepository::new();
        let session = Uuid::new_v4();
        let late = entry(session, "G2", 1);
        let mut early = entry(session, "G1", 10);
        repo.append(&late).await.unwrap();
        repo.append(&early).await.unwrap();
        early.id = Uuid::new_v4();
        early.goal_id = GoalId::new("G3");
        repo.append(&early).await.unwrap();

        let ids: Vec<String> = repo
            .list_for_learner("learner")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.goal_id.0)
            .collect();
        assert_eq!(ids, vec!["G1", "G3", "G2"]);
        assert!(repo.list_for_learner("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recent_sessions() {
        let repo = InMemoryHistoryRepository::new();
        let sessions: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        for (i, s) in sessions.iter().enumerate() {
            repo.append(&entry(*s, "G1", 30 - i as i64 * 10)).await.unwrap();
        }

        let recent = repo.recent_sessions("learner", 2).await.unwrap();
        assert_eq!(
            recent.iter().map(|e| e.session_id).collect::<Vec<_>>(),
            vec![sessions[1], sessions[2]]
        );
        assert!(repo.recent_sessions("learner", 0).await.unwrap().is_empty());
    }
}
