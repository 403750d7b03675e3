use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Study program a student can enroll in. Independent of the step workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Row of `user_programs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub user_id: Uuid,
    pub program_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn new(user_id: Uuid, program_id: Uuid) -> Self {
        Self {
            user_id,
            program_id,
            created_at: Utc::now(),
        }
    }
}
