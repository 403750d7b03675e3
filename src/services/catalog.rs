// src/services/catalog.rs - programs, enrollments, step definitions and roles
use log::info;
use uuid::Uuid;

use crate::models::program::{Enrollment, Program};
use crate::models::step::Step;
use crate::models::user::{Profile, Role};
use crate::repositories::{RepoError, WorkflowStore};
use crate::services::workflow::WorkflowError;

/// Student self-enrollment; enrolling twice returns the existing row.
pub async fn enroll(
    store: &dyn WorkflowStore,
    user_id: Uuid,
    program_id: Uuid,
) -> Result<Enrollment, WorkflowError> {
    let program = store
        .get_program(program_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| {
            WorkflowError::ReferenceError(format!("program {} is not open for enrollment", program_id))
        })?;

    let enrollment = store.enroll(&Enrollment::new(user_id, program.id)).await?;
    info!("user {} enrolled in '{}'", user_id, program.name);
    Ok(enrollment)
}

pub async fn save_program(
    store: &dyn WorkflowStore,
    program: Program,
) -> Result<Program, WorkflowError> {
    if program.name.trim().is_empty() {
        return Err(WorkflowError::Validation("Program name is required".to_string()));
    }
    Ok(store.save_program(&program).await?)
}

/// Saves a step definition, keeping order_index unique among active steps.
pub async fn save_step(store: &dyn WorkflowStore, step: Step) -> Result<Step, WorkflowError> {
    if step.name.trim().is_empty() {
        return Err(WorkflowError::Validation("Step name is required".to_string()));
    }
    if let Some(dup) = step.fields().iter().enumerate().find_map(|(i, f)| {
        step.fields()[..i]
            .iter()
            .any(|g| g.name == f.name)
            .then_some(&f.name)
    }) {
        return Err(WorkflowError::Validation(format!("Field '{}' is declared twice", dup)));
    }

    if step.is_active {
        let clash = store
            .list_steps(true)
            .await?
            .into_iter()
            .find(|s| s.id != step.id && s.order_index == step.order_index);
        if let Some(other) = clash {
            return Err(WorkflowError::Conflict(format!(
                "order_index {} is already used by '{}'",
                step.order_index, other.name
            )));
        }
    }

    Ok(store.save_step(&step).await?)
}

/// Role changes are super-admin actions; nobody changes their own role.
pub async fn change_role(
    store: &dyn WorkflowStore,
    actor: &Profile,
    target_id: Uuid,
    role: Role,
) -> Result<Profile, WorkflowError> {
    if actor.id == target_id {
        return Err(WorkflowError::Validation(
            "You cannot change your own role".to_string(),
        ));
    }

    let updated = store.update_role(target_id, role).await.map_err(|e| match e {
        RepoError::NotFound => {
            WorkflowError::ReferenceError(format!("user {} has no profile", target_id))
        }
        other => other.into(),
    })?;
    info!("{} changed role of {} to {}", actor.id, target_id, role);
    Ok(updated)
}
