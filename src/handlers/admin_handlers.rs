use actix_web::{get, post, web, HttpResponse};
use uuid::Uuid;

use crate::dtos::api::ApiResponse;
use crate::dtos::workflow_dtos::ReviewIn;
use crate::middleware::auth_extractor::{AdminArea, Gate};
use crate::services::reports;
use crate::services::workflow::{review_step, ReviewDecision, WorkflowError};
use crate::AppState;

type Staff = Gate<AdminArea>;

/// GET /admin
#[get("/admin")]
pub async fn overview(_gate: Staff, state: web::Data<AppState>) -> Result<HttpResponse, WorkflowError> {
    let out = reports::admin_overview(state.store.as_ref()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Admin dashboard loaded", out)))
}

/// GET /admin/reviews
#[get("/admin/reviews")]
pub async fn list_reviews(
    _gate: Staff,
    state: web::Data<AppState>,
) -> Result<HttpResponse, WorkflowError> {
    let board = reports::review_board(state.store.as_ref()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Reviews loaded", board)))
}

/// GET /admin/reviews/{id}
#[get("/admin/reviews/{id}")]
pub async fn get_review(
    _gate: Staff,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, WorkflowError> {
    let review = reports::review_detail(state.store.as_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Review loaded", review)))
}

/// An empty body means "no notes"; anything else must be a valid `ReviewIn`.
fn review_notes(body: &[u8]) -> Result<Option<String>, WorkflowError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice::<ReviewIn>(body)
        .map(|r| r.admin_notes)
        .map_err(|e| WorkflowError::Validation(format!("Invalid review body: {}", e)))
}

async fn decide(
    gate: Staff,
    state: web::Data<AppState>,
    progress_id: Uuid,
    decision: ReviewDecision,
    body: web::Bytes,
) -> Result<HttpResponse, WorkflowError> {
    let notes = review_notes(&body)?;
    let saved = review_step(state.store.as_ref(), gate.profile.id, progress_id, decision, notes).await?;
    let message = match decision {
        ReviewDecision::Approve => "Step approved",
        ReviewDecision::Reject => "Step rejected",
    };
    Ok(HttpResponse::Ok().json(ApiResponse::success(message, saved)))
}

/// POST /admin/reviews/{id}/approve
#[post("/admin/reviews/{id}/approve")]
pub async fn approve_review(
    gate: Staff,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Bytes,
) -> Result<HttpResponse, WorkflowError> {
    decide(gate, state, path.into_inner(), ReviewDecision::Approve, body).await
}

/// POST /admin/reviews/{id}/reject
#[post("/admin/reviews/{id}/reject")]
pub async fn reject_review(
    gate: Staff,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Bytes,
) -> Result<HttpResponse, WorkflowError> {
    decide(gate, state, path.into_inner(), ReviewDecision::Reject, body).await
}

/// GET /admin/students
#[get("/admin/students")]
pub async fn list_students(
    _gate: Staff,
    state: web::Data<AppState>,
) -> Result<HttpResponse, WorkflowError> {
    let rows = reports::student_rows(state.store.as_ref()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Students loaded", rows)))
}
