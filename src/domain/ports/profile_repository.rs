//! Assessment profile repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::AssessmentProfile;

/// Storage for immutable assessment profiles.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Store a newly computed profile. Profiles are never updated in place.
    async fn save(&self, profile: &AssessmentProfile) -> DomainResult<()>;

    /// Get a profile by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<AssessmentProfile>>;

    /// Most recently computed profile for a learner.
    async fn latest_for_learner(&self, learner_id: &str) -> DomainResult<Option<AssessmentProfile>>;

    /// Every profile for a learner, oldest first.
    async fn list_for_learner(&self, learner_id: &str) -> DomainResult<Vec<AssessmentProfile>>;
}
