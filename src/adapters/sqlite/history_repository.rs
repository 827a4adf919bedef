//! SQLite implementation of the ProgressHistoryRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{GoalHistoryEntry, GoalId, GoalOutcome};
use crate::domain::ports::ProgressHistoryRepository;

const COLUMNS: &str = "id, learner_id, session_id, goal_id, outcome, recorded_at";

#[derive(Clone)]
pub struct SqliteHistoryRepository {
    pool: SqlitePool,
}

impl SqliteHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

async fn insert_entry<'e, E>(executor: E, entry: &GoalHistoryEntry) -> DomainResult<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"INSERT INTO goal_history (id, learner_id, session_id, goal_id, outcome, recorded_at)
           VALUES (?, ?, ?, ?, ?, ?)"#
    )
    .bind(entry.id.to_string())
    .bind(&entry.learner_id)
    .bind(entry.session_id.to_string())
    .bind(entry.goal_id.as_str())
    .bind(entry.outcome.as_str())
    .bind(entry.recorded_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl ProgressHistoryRepository for SqliteHistoryRepository {
    async fn append(&self, entry: &GoalHistoryEntry) -> DomainResult<()> {
        insert_entry(&self.pool, entry).await
    }

    async fn append_all(&self, entries: &[GoalHistoryEntry]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        for entry in entries {
            insert_entry(&mut *tx, entry).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_for_learner(&self, learner_id: &str) -> DomainResult<Vec<GoalHistoryEntry>> {
        let rows: Vec<HistoryRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM goal_history WHERE learner_id = ? ORDER BY recorded_at, seq"
        ))
        .bind(learner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn recent_sessions(&self, learner_id: &str, limit: usize) -> DomainResult<Vec<GoalHistoryEntry>> {
        // sessions ranked by their latest entry
        let rows: Vec<HistoryRow> = sqlx::query_as(&format!(
            r#"SELECT {COLUMNS} FROM goal_history
               WHERE learner_id = ? AND session_id IN (
                   SELECT session_id FROM goal_history
                   WHERE learner_id = ?
                   GROUP BY session_id
                   ORDER BY MAX(recorded_at) DESC, MAX(seq) DESC
                   LIMIT ?
               )
               ORDER BY recorded_at, seq"#
        ))
        .bind(learner_id)
        .bind(learner_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn list_for_session(&self, session_id: Uuid) -> DomainResult<Vec<GoalHistoryEntry>> {
        let rows: Vec<HistoryRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM goal_history WHERE session_id = ? ORDER BY seq"
        ))
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: String,
    learner_id: String,
    session_id: String,
    goal_id: String,
    outcome: String,
    recorded_at: String,
}

impl TryFrom<HistoryRow> for GoalHistoryEntry {
    type Error = DomainError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let outcome = GoalOutcome::from_str(&row.outcome)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid outcome: {}", row.outcome)))?;

        Ok(GoalHistoryEntry {
            id: parse_uuid(&row.id)?,
            learner_id: row.learner_id,
            session_id: parse_uuid(&row.session_id)?,
            goal_id: GoalId::new(row.goal_id),
            outcome,
            recorded_at: parse_datetime(&row.recorded_at)?,
        })
    }
}
