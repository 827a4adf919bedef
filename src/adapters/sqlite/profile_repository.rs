//! SQLite implementation of the ProfileRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_optional_uuid, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AssessmentProfile, Band, CurriculumLevel, Domain, DomainBand};
use crate::domain::ports::ProfileRepository;

const COLUMNS: &str = "id, learner_id, bands, global_stage, curriculum_ordinal, curriculum_label, \
                       confidence, curriculum_version, computed_at, supersedes";

#[derive(Clone)]
pub struct SqliteProfileRepository {
    pool: SqlitePool,
}

impl SqliteProfileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileRepository for SqliteProfileRepository {
    async fn save(&self, profile: &AssessmentProfile) -> DomainResult<()> {
        let bands_json = serde_json::to_string(&profile.bands)?;

        sqlx::query(&format!(
            "INSERT INTO assessment_profiles ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(profile.id.to_string())
        .bind(&profile.learner_id)
        .bind(&bands_json)
        .bind(i64::from(profile.global_stage.value()))
        .bind(i64::from(profile.curriculum_level.ordinal))
        .bind(&profile.curriculum_level.label)
        .bind(profile.confidence)
        .bind(i64::from(profile.curriculum_version))
        .bind(profile.computed_at.to_rfc3339())
        .bind(profile.supersedes.map(|id| id.to_string()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<AssessmentProfile>> {
        let row: Option<ProfileRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM assessment_profiles WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into()).transpose()
    }

    async fn latest_for_learner(&self, learner_id: &str) -> DomainResult<Option<AssessmentProfile>> {
        let row: Option<ProfileRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM assessment_profiles WHERE learner_id = ? ORDER BY computed_at DESC, seq DESC LIMIT 1"
        ))
        .bind(learner_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into()).transpose()
    }

    async fn list_for_learner(&self, learner_id: &str) -> DomainResult<Vec<AssessmentProfile>> {
        let rows: Vec<ProfileRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM assessment_profiles WHERE learner_id = ? ORDER BY computed_at, seq"
        ))
        .bind(learner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: String,
    learner_id: String,
    bands: String,
    global_stage: i64,
    curriculum_ordinal: i64,
    curriculum_label: String,
    confidence: f64,
    curriculum_version: i64,
    computed_at: String,
    supersedes: Option<String>,
}

impl TryFrom<ProfileRow> for AssessmentProfile {
    type Error = DomainError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let bands: BTreeMap<Domain, DomainBand> = serde_json::from_str(&row.bands)?;

        let global_stage = u8::try_from(row.global_stage)
            .ok()
            .and_then(Band::new)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid stage: {}", row.global_stage)))?;
        let ordinal = u8::try_from(row.curriculum_ordinal).map_err(|e| DomainError::SerializationError(e.to_string()))?;
        let curriculum_version =
            u32::try_from(row.curriculum_version).map_err(|e| DomainError::SerializationError(e.to_string()))?;

        Ok(AssessmentProfile {
            id: parse_uuid(&row.id)?,
            learner_id: row.learner_id,
            bands,
            global_stage,
            curriculum_level: CurriculumLevel {
                ordinal,
                label: row.curriculum_label,
            },
            confidence: row.confidence,
            curriculum_version,
            computed_at: parse_datetime(&row.computed_at)?,
            supersedes: parse_optional_uuid(row.supersedes)?,
        })
    }
}
