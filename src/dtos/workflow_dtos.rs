use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::program::{Enrollment, Program};
use crate::models::progress::{StepProgress, StepState};
use crate::models::step::{Step, SubmissionData};
use crate::models::user::Profile;
use crate::services::progress::{ProgressSummary, StudentProgressOut};

#[derive(Debug, Deserialize)]
pub struct SubmitStepIn {
    #[serde(default)]
    pub data: SubmissionData,
}

#[derive(Debug, Deserialize)]
pub struct ReviewIn {
    #[serde(default)]
    pub admin_notes: Option<String>,
}

#[derive(Serialize)]
pub struct EnrollmentOut {
    #[serde(flatten)]
    pub enrollment: Enrollment,
    pub program: Option<Program>,
}

#[derive(Serialize)]
pub struct DashboardOut {
    pub profile: Profile,
    pub enrollments: Vec<EnrollmentOut>,
    pub progress: ProgressSummary,
}

#[derive(Serialize)]
pub struct ProgramListingOut {
    #[serde(flatten)]
    pub program: Program,
    pub is_enrolled: bool,
}

#[derive(Serialize)]
pub struct ProfilePageOut {
    pub profile: Profile,
    pub role_label: &'static str,
    pub completed_steps: usize,
    pub total_steps: usize,
    pub enrolled_programs: usize,
}

#[derive(Serialize)]
pub struct StepPageOut {
    pub step: Step,
    pub instructions: &'static str,
    pub state: StepState,
    pub status_label: &'static str,
    pub admin_notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub editable: bool,
}

#[derive(Serialize, Clone)]
pub struct StudentRef {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Serialize, Clone)]
pub struct StepRef {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub step_type: String,
}

/// A progress row with its student and step embedded.
#[derive(Serialize)]
pub struct ReviewOut {
    #[serde(flatten)]
    pub progress: StepProgress,
    pub profiles: Option<StudentRef>,
    pub steps: Option<StepRef>,
    pub decided: bool,
}

#[derive(Serialize)]
pub struct ReviewBoardOut {
    pub pending: Vec<ReviewOut>,
    pub in_progress: Vec<ReviewOut>,
    pub completed: Vec<ReviewOut>,
}

#[derive(Serialize)]
pub struct AdminDashboardOut {
    pub pending_reviews: Vec<ReviewOut>,
    pub completed_reviews: Vec<ReviewOut>,
    pub recent_submissions: Vec<ReviewOut>,
    pub active_students: usize,
    pub total_students: usize,
}

#[derive(Serialize)]
pub struct StudentRowOut {
    pub student: StudentRef,
    pub created_at: DateTime<Utc>,
    pub program_name: Option<String>,
    pub progress: StudentProgressOut,
}

impl From<&Profile> for StudentRef {
    fn from(p: &Profile) -> Self {
        Self {
            id: p.id,
            full_name: p.full_name.clone(),
            email: p.email.clone(),
        }
    }
}

impl From<&Step> for StepRef {
    fn from(s: &Step) -> Self {
        Self {
            id: s.id,
            name: s.name.clone(),
            description: s.description.clone(),
            step_type: s.step_type.to_string(),
        }
    }
}
