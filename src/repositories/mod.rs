pub mod memory_store;
pub mod pg_store;
pub mod supabase_store;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::program::{Enrollment, Program};
use crate::models::progress::{ProgressStatus, StepProgress};
use crate::models::step::Step;
use crate::models::user::{Profile, Role};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
    #[error("pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    #[error("supabase error: {0}")]
    Supabase(String),
    #[error("foreign key violation: {0}")]
    ForeignKey(String),
    #[error("not found")]
    NotFound,
    #[error("other: {0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressOrder {
    #[default]
    CreatedDesc,
    UpdatedDesc,
}

impl ProgressOrder {
    pub fn column(&self) -> &'static str {
        match self {
            ProgressOrder::CreatedDesc => "created_at",
            ProgressOrder::UpdatedDesc => "updated_at",
        }
    }
}

/// Equality/set filter over `user_step_progress`. Empty `statuses` means any.
#[derive(Debug, Clone, Default)]
pub struct ProgressFilter {
    pub user_id: Option<Uuid>,
    pub statuses: Vec<ProgressStatus>,
    pub order: ProgressOrder,
    pub limit: Option<usize>,
}

impl ProgressFilter {
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn with_status(statuses: &[ProgressStatus], order: ProgressOrder) -> Self {
        Self {
            statuses: statuses.to_vec(),
            order,
            ..Default::default()
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, row: &StepProgress) -> bool {
        self.user_id.is_none_or(|u| row.user_id == u)
            && (self.statuses.is_empty() || self.statuses.contains(&row.status))
    }
}

/// Filtered reads and single-row writes over the five workflow collections.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, RepoError>;
    /// Newest first.
    async fn list_profiles(&self, role: Option<Role>) -> Result<Vec<Profile>, RepoError>;
    async fn upsert_profile(&self, profile: &Profile) -> Result<Profile, RepoError>;
    async fn update_role(&self, user_id: Uuid, role: Role) -> Result<Profile, RepoError>;

    /// Sorted by name.
    async fn list_programs(&self, active_only: bool) -> Result<Vec<Program>, RepoError>;
    async fn get_program(&self, id: Uuid) -> Result<Option<Program>, RepoError>;
    async fn save_program(&self, program: &Program) -> Result<Program, RepoError>;

    async fn list_enrollments(&self, user_id: Option<Uuid>) -> Result<Vec<Enrollment>, RepoError>;
    /// Idempotent on (user_id, program_id).
    async fn enroll(&self, enrollment: &Enrollment) -> Result<Enrollment, RepoError>;

    /// Sorted by order_index.
    async fn list_steps(&self, active_only: bool) -> Result<Vec<Step>, RepoError>;
    async fn get_step(&self, id: Uuid) -> Result<Option<Step>, RepoError>;
    async fn save_step(&self, step: &Step) -> Result<Step, RepoError>;

    async fn get_progress(&self, id: Uuid) -> Result<Option<StepProgress>, RepoError>;
    async fn find_progress(
        &self,
        user_id: Uuid,
        step_id: Uuid,
    ) -> Result<Option<StepProgress>, RepoError>;
    async fn list_progress(&self, filter: &ProgressFilter) -> Result<Vec<StepProgress>, RepoError>;
    /// Upsert keyed on (user_id, step_id); an existing row keeps its id.
    async fn save_progress(&self, progress: &StepProgress) -> Result<StepProgress, RepoError>;
}
