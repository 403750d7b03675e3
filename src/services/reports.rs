// src/services/reports.rs - read models for the staff pages
use std::collections::HashSet;

use uuid::Uuid;

use crate::dtos::admin_dtos::{ProgramCountOut, RecentUserOut, SuperAdminDashboardOut};
use crate::dtos::workflow_dtos::{
    AdminDashboardOut, ReviewBoardOut, ReviewOut, StepRef, StudentRef, StudentRowOut,
};
use crate::models::progress::{ProgressStatus, StepProgress};
use crate::models::user::Role;
use crate::repositories::{ProgressFilter, ProgressOrder, RepoError, WorkflowStore};
use crate::services::progress::student_summary;
use crate::services::workflow::WorkflowError;

const OPEN: &[ProgressStatus] = &[ProgressStatus::Pending, ProgressStatus::InProgress];

/// Attaches student and step details to progress rows. Rows whose student
/// or step has disappeared keep `None` embeds.
pub async fn embed_reviews(
    store: &dyn WorkflowStore,
    rows: Vec<StepProgress>,
) -> Result<Vec<ReviewOut>, RepoError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let steps = store.list_steps(false).await?;
    let people = store.list_profiles(None).await?;

    Ok(rows
        .into_iter()
        .map(|progress| ReviewOut {
            profiles: people
                .iter()
                .find(|p| p.id == progress.user_id)
                .map(StudentRef::from),
            steps: steps
                .iter()
                .find(|s| s.id == progress.step_id)
                .map(StepRef::from),
            decided: progress.status.is_terminal(),
            progress,
        })
        .collect())
}

pub async fn admin_overview(store: &dyn WorkflowStore) -> Result<AdminDashboardOut, RepoError> {
    let pending = store
        .list_progress(&ProgressFilter::with_status(OPEN, ProgressOrder::CreatedDesc).limit(10))
        .await?;
    let completed = store
        .list_progress(
            &ProgressFilter::with_status(&[ProgressStatus::Completed], ProgressOrder::UpdatedDesc)
                .limit(5),
        )
        .await?;
    let recent = store
        .list_progress(&ProgressFilter::default().limit(5))
        .await?;

    let active_students = store
        .list_progress(&ProgressFilter::with_status(OPEN, ProgressOrder::CreatedDesc))
        .await?
        .iter()
        .map(|p| p.user_id)
        .collect::<HashSet<Uuid>>()
        .len();
    let total_students = store.list_profiles(Some(Role::User)).await?.len();

    Ok(AdminDashboardOut {
        pending_reviews: embed_reviews(store, pending).await?,
        completed_reviews: embed_reviews(store, completed).await?,
        recent_submissions: embed_reviews(store, recent).await?,
        active_students,
        total_students,
    })
}

pub async fn review_board(store: &dyn WorkflowStore) -> Result<ReviewBoardOut, RepoError> {
    let by = |status: ProgressStatus, order: ProgressOrder| {
        ProgressFilter::with_status(&[status], order)
    };
    let pending = store
        .list_progress(&by(ProgressStatus::Pending, ProgressOrder::CreatedDesc))
        .await?;
    let in_progress = store
        .list_progress(&by(ProgressStatus::InProgress, ProgressOrder::UpdatedDesc))
        .await?;
    let completed = store
        .list_progress(&by(ProgressStatus::Completed, ProgressOrder::UpdatedDesc))
        .await?;

    Ok(ReviewBoardOut {
        pending: embed_reviews(store, pending).await?,
        in_progress: embed_reviews(store, in_progress).await?,
        completed: embed_reviews(store, completed).await?,
    })
}

pub async fn review_detail(
    store: &dyn WorkflowStore,
    progress_id: Uuid,
) -> Result<ReviewOut, WorkflowError> {
    let row = store.get_progress(progress_id).await?.ok_or_else(|| {
        WorkflowError::ReferenceError(format!("review {} does not exist", progress_id))
    })?;
    let mut embedded = embed_reviews(store, vec![row]).await?;
    embedded
        .pop()
        .ok_or_else(|| WorkflowError::ReferenceError(format!("review {} does not exist", progress_id)))
}

/// Students newest first, each with their earliest program and a progress line.
pub async fn student_rows(store: &dyn WorkflowStore) -> Result<Vec<StudentRowOut>, RepoError> {
    let students = store.list_profiles(Some(Role::User)).await?;
    let programs = store.list_programs(false).await?;
    let mut enrollments = store.list_enrollments(None).await?;
    enrollments.sort_by_key(|e| e.created_at);
    let rows = store.list_progress(&ProgressFilter::default()).await?;

    Ok(students
        .iter()
        .map(|student| {
            let program_name = enrollments
                .iter()
                .find(|e| e.user_id == student.id)
                .and_then(|e| programs.iter().find(|p| p.id == e.program_id))
                .map(|p| p.name.clone());
            let mine: Vec<StepProgress> = rows
                .iter()
                .filter(|r| r.user_id == student.id)
                .cloned()
                .collect();
            StudentRowOut {
                student: StudentRef::from(student),
                created_at: student.created_at,
                program_name,
                progress: student_summary(&mine),
            }
        })
        .collect())
}

pub async fn super_admin_overview(
    store: &dyn WorkflowStore,
) -> Result<SuperAdminDashboardOut, RepoError> {
    let users = store.list_profiles(None).await?;
    let programs = store.list_programs(false).await?;
    let steps = store.list_steps(false).await?;
    let progress_records = store.list_progress(&ProgressFilter::default()).await?.len();
    let enrollments = store.list_enrollments(None).await?;

    let recent_users = users
        .iter()
        .take(5)
        .map(|u| RecentUserOut {
            full_name: u.full_name.clone(),
            role: u.role,
            role_label: u.role.label(),
            created_at: u.created_at,
        })
        .collect();

    let program_stats = programs
        .iter()
        .map(|p| ProgramCountOut {
            name: p.name.clone(),
            count: enrollments.iter().filter(|e| e.program_id == p.id).count(),
        })
        .collect();

    Ok(SuperAdminDashboardOut {
        total_users: users.len(),
        total_programs: programs.len(),
        total_steps: steps.len(),
        progress_records,
        recent_users,
        program_stats,
    })
}
