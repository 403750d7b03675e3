use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::program::Program;
use crate::models::step::{FormSchema, StepType};
use crate::models::user::{Profile, Role};

#[derive(Deserialize)]
pub struct CreateStaffIn {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
}

#[derive(Deserialize)]
pub struct RoleChangeIn {
    pub role: Role,
}

#[derive(Deserialize)]
pub struct ProgramIn {
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Deserialize)]
pub struct StepIn {
    pub name: String,
    pub description: Option<String>,
    pub step_type: StepType,
    pub order_index: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub form_fields: Option<FormSchema>,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
pub struct UserRowOut {
    #[serde(flatten)]
    pub profile: Profile,
    pub role_label: &'static str,
}

#[derive(Serialize)]
pub struct ProgramStatsOut {
    #[serde(flatten)]
    pub program: Program,
    pub enrollment_count: usize,
}

#[derive(Serialize)]
pub struct ProgramCountOut {
    pub name: String,
    pub count: usize,
}

#[derive(Serialize)]
pub struct RecentUserOut {
    pub full_name: Option<String>,
    pub role: Role,
    pub role_label: &'static str,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct SuperAdminDashboardOut {
    pub total_users: usize,
    pub total_programs: usize,
    pub total_steps: usize,
    pub progress_records: usize,
    pub recent_users: Vec<RecentUserOut>,
    pub program_stats: Vec<ProgramCountOut>,
}
