use actix_web::{get, post, put, web, HttpResponse};
use chrono::Utc;
use log::{error, info, warn};
use uuid::Uuid;

use crate::dtos::admin_dtos::{
    CreateStaffIn, ProgramIn, ProgramStatsOut, RoleChangeIn, StepIn, UserRowOut,
};
use crate::dtos::api::ApiResponse;
use crate::handlers::auth_handlers::check_credentials;
use crate::middleware::auth_extractor::{Gate, SuperAdminArea};
use crate::models::program::Program;
use crate::models::step::Step;
use crate::models::user::{Profile, Role};
use crate::services::auth_services::AuthService;
use crate::services::workflow::WorkflowError;
use crate::services::{catalog, reports};
use crate::AppState;

type Owner = Gate<SuperAdminArea>;

/// GET /super-admin
#[get("/super-admin")]
pub async fn overview(_gate: Owner, state: web::Data<AppState>) -> Result<HttpResponse, WorkflowError> {
    let out = reports::super_admin_overview(state.store.as_ref()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Dashboard loaded", out)))
}

/// GET /super-admin/users
#[get("/super-admin/users")]
pub async fn list_users(_gate: Owner, state: web::Data<AppState>) -> Result<HttpResponse, WorkflowError> {
    let users: Vec<UserRowOut> = state
        .store
        .list_profiles(None)
        .await?
        .into_iter()
        .map(|profile| UserRowOut {
            role_label: profile.role.label(),
            profile,
        })
        .collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success("Users loaded", users)))
}

/// POST /super-admin/users
/// Creates an admin or super-admin account; students register themselves.
#[post("/super-admin/users")]
pub async fn create_staff(
    gate: Owner,
    svc: web::Data<AuthService>,
    state: web::Data<AppState>,
    body: web::Json<CreateStaffIn>,
) -> HttpResponse {
    let email = body.email.trim().to_lowercase();
    let full_name = body.full_name.trim();

    if let Err(msg) = check_credentials(&email, &body.password) {
        return HttpResponse::BadRequest().json(ApiResponse::error(msg));
    }
    if full_name.is_empty() {
        return HttpResponse::BadRequest().json(ApiResponse::error("Full name is required"));
    }
    if body.role == Role::User {
        return HttpResponse::BadRequest()
            .json(ApiResponse::error("Only admin or super_admin accounts can be created here"));
    }

    let user_id = match svc
        .admin_create_user(&email, &body.password, full_name, body.role)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            warn!("staff account creation failed: {}", e);
            return HttpResponse::BadRequest().json(ApiResponse::error(e.to_string()));
        }
    };

    let profile = Profile::new(user_id, Some(full_name.to_string()), Some(email), body.role);
    match state.store.upsert_profile(&profile).await {
        Ok(saved) => {
            info!("{} created {} account {}", gate.profile.id, saved.role, saved.id);
            HttpResponse::Created().json(ApiResponse::success("Account created", saved))
        }
        Err(e) => {
            error!("profile insert failed for {}: {}", user_id, e);
            HttpResponse::InternalServerError()
                .json(ApiResponse::error("Account created but profile could not be saved"))
        }
    }
}

/// PUT /super-admin/users/{id}/role
#[put("/super-admin/users/{id}/role")]
pub async fn change_role(
    gate: Owner,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<RoleChangeIn>,
) -> Result<HttpResponse, WorkflowError> {
    let updated =
        catalog::change_role(state.store.as_ref(), &gate.profile, path.into_inner(), body.role).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Role updated", updated)))
}

/// GET /super-admin/programs
#[get("/super-admin/programs")]
pub async fn list_programs(
    _gate: Owner,
    state: web::Data<AppState>,
) -> Result<HttpResponse, WorkflowError> {
    let enrollments = state.store.list_enrollments(None).await?;
    let programs: Vec<ProgramStatsOut> = state
        .store
        .list_programs(false)
        .await?
        .into_iter()
        .map(|program| ProgramStatsOut {
            enrollment_count: enrollments
                .iter()
                .filter(|e| e.program_id == program.id)
                .count(),
            program,
        })
        .collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success("Programs loaded", programs)))
}

fn program_from(id: Uuid, created_at: chrono::DateTime<Utc>, input: ProgramIn) -> Program {
    Program {
        id,
        name: input.name.trim().to_string(),
        description: input.description.filter(|d| !d.trim().is_empty()),
        is_active: input.is_active,
        created_at,
    }
}

/// POST /super-admin/programs
#[post("/super-admin/programs")]
pub async fn create_program(
    _gate: Owner,
    state: web::Data<AppState>,
    body: web::Json<ProgramIn>,
) -> Result<HttpResponse, WorkflowError> {
    let program = program_from(Uuid::new_v4(), Utc::now(), body.into_inner());
    let saved = catalog::save_program(state.store.as_ref(), program).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success("Program created", saved)))
}

/// PUT /super-admin/programs/{id}
#[put("/super-admin/programs/{id}")]
pub async fn update_program(
    _gate: Owner,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<ProgramIn>,
) -> Result<HttpResponse, WorkflowError> {
    let id = path.into_inner();
    let existing = state
        .store
        .get_program(id)
        .await?
        .ok_or_else(|| WorkflowError::ReferenceError(format!("program {} does not exist", id)))?;
    let program = program_from(existing.id, existing.created_at, body.into_inner());
    let saved = catalog::save_program(state.store.as_ref(), program).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Program updated", saved)))
}

/// GET /super-admin/steps
#[get("/super-admin/steps")]
pub async fn list_steps(_gate: Owner, state: web::Data<AppState>) -> Result<HttpResponse, WorkflowError> {
    let steps = state.store.list_steps(false).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Steps loaded", steps)))
}

fn step_from(id: Uuid, input: StepIn) -> Step {
    Step {
        id,
        name: input.name.trim().to_string(),
        description: input.description.filter(|d| !d.trim().is_empty()),
        step_type: input.step_type,
        order_index: input.order_index,
        is_active: input.is_active,
        form_fields: input.form_fields,
    }
}

/// POST /super-admin/steps
#[post("/super-admin/steps")]
pub async fn create_step(
    _gate: Owner,
    state: web::Data<AppState>,
    body: web::Json<StepIn>,
) -> Result<HttpResponse, WorkflowError> {
    let step = step_from(Uuid::new_v4(), body.into_inner());
    let saved = catalog::save_step(state.store.as_ref(), step).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success("Step created", saved)))
}

/// PUT /super-admin/steps/{id}
#[put("/super-admin/steps/{id}")]
pub async fn update_step(
    _gate: Owner,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<StepIn>,
) -> Result<HttpResponse, WorkflowError> {
    let id = path.into_inner();
    if state.store.get_step(id).await?.is_none() {
        return Err(WorkflowError::ReferenceError(format!("step {} does not exist", id)));
    }
    let saved = catalog::save_step(state.store.as_ref(), step_from(id, body.into_inner())).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Step updated", saved)))
}
