// src/services/workflow.rs - step progress state machine
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::dtos::api::ApiResponse;
use crate::models::progress::{StepProgress, StepState};
use crate::models::step::{StepType, SubmissionData};
use crate::repositories::{RepoError, WorkflowStore};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("reference error: {0}")]
    ReferenceError(String),
    #[error("cannot {action} a step that is {from}")]
    InvalidTransition { from: &'static str, action: &'static str },
    #[error("{0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("store error: {0}")]
    Store(RepoError),
}

impl From<RepoError> for WorkflowError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::ForeignKey(msg) => WorkflowError::ReferenceError(msg),
            other => WorkflowError::Store(other),
        }
    }
}

impl ResponseError for WorkflowError {
    fn status_code(&self) -> StatusCode {
        match self {
            WorkflowError::ReferenceError(_) => StatusCode::NOT_FOUND,
            WorkflowError::InvalidTransition { .. } | WorkflowError::Conflict(_) => StatusCode::CONFLICT,
            WorkflowError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            WorkflowError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            // store details stay in the log
            WorkflowError::Store(_) => "Failed to save changes. Please try again.".to_string(),
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ApiResponse::error(message))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    fn verb(&self) -> &'static str {
        match self {
            ReviewDecision::Approve => "approve",
            ReviewDecision::Reject => "reject",
        }
    }
}

/// Whether the student-facing form may still be submitted.
pub fn is_editable(state: &StepState, step_type: StepType) -> bool {
    match state {
        StepState::NotStarted => true,
        StepState::InProgress { .. } => !step_type.awaits_staff(),
        StepState::Pending { .. } | StepState::Completed { .. } | StepState::Rejected { .. } => false,
    }
}

/// Student submission. Form and upload steps may be re-submitted while in
/// progress; review and approval steps go to pending and wait on staff.
pub fn submit(
    state: &StepState,
    step_type: StepType,
    data: SubmissionData,
    now: DateTime<Utc>,
) -> Result<StepState, WorkflowError> {
    if !is_editable(state, step_type) {
        return Err(WorkflowError::InvalidTransition {
            from: state.status_key(),
            action: "submit",
        });
    }

    Ok(if step_type.awaits_staff() {
        StepState::Pending { data, updated_at: now }
    } else {
        StepState::InProgress { data, updated_at: now }
    })
}

/// Staff decision; only pending or in-progress work can be decided.
pub fn decide(
    state: &StepState,
    decision: ReviewDecision,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<StepState, WorkflowError> {
    let data = match state {
        StepState::Pending { data, .. } | StepState::InProgress { data, .. } => data.clone(),
        other => {
            return Err(WorkflowError::InvalidTransition {
                from: other.status_key(),
                action: decision.verb(),
            });
        }
    };

    let notes = notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    Ok(match decision {
        ReviewDecision::Approve => StepState::Completed {
            data,
            completed_at: now,
            notes,
        },
        ReviewDecision::Reject => StepState::Rejected { data, notes },
    })
}

pub async fn submit_step(
    store: &dyn WorkflowStore,
    user_id: Uuid,
    step_id: Uuid,
    data: SubmissionData,
) -> Result<StepProgress, WorkflowError> {
    let step = store
        .get_step(step_id)
        .await?
        .filter(|s| s.is_active)
        .ok_or_else(|| WorkflowError::ReferenceError(format!("step {} does not exist", step_id)))?;

    if store.get_profile(user_id).await?.is_none() {
        return Err(WorkflowError::ReferenceError(format!(
            "user {} has no profile",
            user_id
        )));
    }

    step.validate_submission(&data)
        .map_err(WorkflowError::Validation)?;

    let now = Utc::now();
    let existing = store.find_progress(user_id, step_id).await?;
    let state = StepState::from_row(existing.as_ref());
    let next = submit(&state, step.step_type, data, now)?;

    let mut row = existing.unwrap_or_else(|| StepProgress::first(user_id, step_id, now));
    row.apply(next, now);
    let saved = store.save_progress(&row).await?;

    info!(
        "user {} submitted step '{}' -> {}",
        user_id, step.name, saved.status
    );
    Ok(saved)
}

/// Applies a staff decision to one progress row. Concurrent decisions on the
/// same row are last-write-wins.
pub async fn review_step(
    store: &dyn WorkflowStore,
    reviewer_id: Uuid,
    progress_id: Uuid,
    decision: ReviewDecision,
    notes: Option<String>,
) -> Result<StepProgress, WorkflowError> {
    let mut row = store.get_progress(progress_id).await?.ok_or_else(|| {
        WorkflowError::ReferenceError(format!("review {} does not exist", progress_id))
    })?;

    let now = Utc::now();
    let next = decide(&row.state(), decision, notes, now).inspect_err(|e| {
        warn!("reviewer {} rejected action on {}: {}", reviewer_id, progress_id, e);
    })?;

    row.apply(next, now);
    let saved = store.save_progress(&row).await?;

    info!(
        "reviewer {} set progress {} to {}",
        reviewer_id, progress_id, saved.status
    );
    Ok(saved)
}
