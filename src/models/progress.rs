use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::models::step::SubmissionData;

/// Persisted status of a `user_step_progress` row. "not_started" has no row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Pending,
    InProgress,
    Completed,
    Rejected,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::Pending => "pending",
            ProgressStatus::InProgress => "in_progress",
            ProgressStatus::Completed => "completed",
            ProgressStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressStatus::Completed | ProgressStatus::Rejected)
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProgressStatus::Pending),
            "in_progress" => Ok(ProgressStatus::InProgress),
            "completed" => Ok(ProgressStatus::Completed),
            "rejected" => Ok(ProgressStatus::Rejected),
            other => Err(format!("unknown progress status '{}'", other)),
        }
    }
}

/// Row of `user_step_progress`; (user_id, step_id) is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepProgress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub step_id: Uuid,
    pub status: ProgressStatus,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: SubmissionData,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<SubmissionData, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<SubmissionData>::deserialize(deserializer)?.unwrap_or_default())
}

impl StepProgress {
    /// Builds the row for a first interaction. Callers must `apply` a state
    /// before saving it.
    pub fn first(user_id: Uuid, step_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            step_id,
            status: ProgressStatus::InProgress,
            data: SubmissionData::new(),
            admin_notes: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Writes `state` onto the row. This is the only place status and
    /// `completed_at` are set, so `completed_at` is present iff completed.
    pub fn apply(&mut self, state: StepState, now: DateTime<Utc>) {
        self.updated_at = now;
        match state {
            StepState::NotStarted => {}
            StepState::InProgress { data, updated_at } => {
                self.status = ProgressStatus::InProgress;
                self.data = data;
                self.updated_at = updated_at;
                self.completed_at = None;
            }
            StepState::Pending { data, updated_at } => {
                self.status = ProgressStatus::Pending;
                self.data = data;
                self.updated_at = updated_at;
                self.completed_at = None;
            }
            StepState::Completed {
                data,
                completed_at,
                notes,
            } => {
                self.status = ProgressStatus::Completed;
                self.data = data;
                self.admin_notes = notes;
                self.completed_at = Some(completed_at);
            }
            StepState::Rejected { data, notes } => {
                self.status = ProgressStatus::Rejected;
                self.data = data;
                self.admin_notes = notes;
                self.completed_at = None;
            }
        }
    }

    pub fn state(&self) -> StepState {
        StepState::from_row(Some(self))
    }
}

/// Workflow position of one (user, step) pair, with the absent row made explicit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepState {
    NotStarted,
    InProgress {
        data: SubmissionData,
        updated_at: DateTime<Utc>,
    },
    Pending {
        data: SubmissionData,
        updated_at: DateTime<Utc>,
    },
    Completed {
        data: SubmissionData,
        completed_at: DateTime<Utc>,
        notes: Option<String>,
    },
    Rejected {
        data: SubmissionData,
        notes: Option<String>,
    },
}

impl StepState {
    pub fn from_row(row: Option<&StepProgress>) -> Self {
        let Some(row) = row else {
            return StepState::NotStarted;
        };
        let data = row.data.clone();
        match row.status {
            ProgressStatus::InProgress => StepState::InProgress {
                data,
                updated_at: row.updated_at,
            },
            ProgressStatus::Pending => StepState::Pending {
                data,
                updated_at: row.updated_at,
            },
            // Legacy rows may lack completed_at; fall back to the last update.
            ProgressStatus::Completed => StepState::Completed {
                data,
                completed_at: row.completed_at.unwrap_or(row.updated_at),
                notes: row.admin_notes.clone(),
            },
            ProgressStatus::Rejected => StepState::Rejected {
                data,
                notes: row.admin_notes.clone(),
            },
        }
    }

    pub fn status_key(&self) -> &'static str {
        match self {
            StepState::NotStarted => "not_started",
            StepState::InProgress { .. } => "in_progress",
            StepState::Pending { .. } => "pending",
            StepState::Completed { .. } => "completed",
            StepState::Rejected { .. } => "rejected",
        }
    }

    pub fn status_label(&self) -> &'static str {
        match self {
            StepState::NotStarted => "Not started",
            StepState::InProgress { .. } => "In progress",
            StepState::Pending { .. } => "Awaiting review",
            StepState::Completed { .. } => "Completed",
            StepState::Rejected { .. } => "Rejected",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, StepState::Completed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn row(status: ProgressStatus) -> StepProgress {
        let mut p = StepProgress::first(Uuid::new_v4(), Uuid::new_v4(), Utc::now());
        p.status = status;
        p
    }

    #[test]
    fn absent_row_is_not_started() {
        assert_eq!(StepState::from_row(None), StepState::NotStarted);
        assert_eq!(StepState::NotStarted.status_key(), "not_started");
    }

    #[test]
    fn completed_at_tracks_completed_status() {
        let now = Utc::now();
        let mut p = row(ProgressStatus::Pending);

        p.apply(
            StepState::Completed {
                data: SubmissionData::new(),
                completed_at: now,
                notes: Some("OK".into()),
            },
            now,
        );
        assert_eq!(p.status, ProgressStatus::Completed);
        assert_eq!(p.completed_at, Some(now));

        p.apply(
            StepState::Rejected {
                data: SubmissionData::new(),
                notes: None,
            },
            now + Duration::seconds(5),
        );
        assert_eq!(p.status, ProgressStatus::Rejected);
        assert_eq!(p.completed_at, None);
    }

    #[test]
    fn null_data_reads_as_empty_map() {
        let json = json!({
            "id": Uuid::new_v4(),
            "user_id": Uuid::new_v4(),
            "step_id": Uuid::new_v4(),
            "status": "in_progress",
            "data": null,
            "admin_notes": null,
            "created_at": "2024-05-01T08:00:00Z",
            "updated_at": "2024-05-01T08:00:00Z",
            "completed_at": null
        });
        let p: StepProgress = serde_json::from_value(json).unwrap();
        assert!(p.data.is_empty());
        assert!(matches!(p.state(), StepState::InProgress { .. }));
    }

    #[test]
    fn legacy_completed_row_without_timestamp_uses_updated_at() {
        let mut p = row(ProgressStatus::Completed);
        p.completed_at = None;
        match p.state() {
            StepState::Completed { completed_at, .. } => assert_eq!(completed_at, p.updated_at),
            other => panic!("unexpected state {:?}", other),
        }
    }
}
