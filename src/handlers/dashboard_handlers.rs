use actix_web::{get, post, web, HttpResponse};
use uuid::Uuid;

use crate::dtos::api::ApiResponse;
use crate::dtos::workflow_dtos::{
    DashboardOut, EnrollmentOut, ProfilePageOut, ProgramListingOut, StepPageOut, SubmitStepIn,
};
use crate::middleware::auth_extractor::{DashboardArea, Gate};
use crate::models::progress::StepState;
use crate::repositories::ProgressFilter;
use crate::services::progress::aggregate;
use crate::services::workflow::{self, is_editable, WorkflowError};
use crate::services::catalog;
use crate::AppState;

type Student = Gate<DashboardArea>;

/// GET /dashboard
#[get("/dashboard")]
pub async fn dashboard(
    gate: Student,
    state: web::Data<AppState>,
) -> Result<HttpResponse, WorkflowError> {
    let store = state.store.as_ref();
    let profile = gate.profile;

    let programs = store.list_programs(false).await?;
    let enrollments = store
        .list_enrollments(Some(profile.id))
        .await?
        .into_iter()
        .map(|e| EnrollmentOut {
            program: programs.iter().find(|p| p.id == e.program_id).cloned(),
            enrollment: e,
        })
        .collect();

    let steps = store.list_steps(true).await?;
    let rows = store.list_progress(&ProgressFilter::for_user(profile.id)).await?;
    let progress = aggregate(&steps, &rows);

    Ok(HttpResponse::Ok().json(ApiResponse::success(
        "Dashboard loaded",
        DashboardOut {
            profile,
            enrollments,
            progress,
        },
    )))
}

/// GET /dashboard/programs
#[get("/dashboard/programs")]
pub async fn list_programs(
    gate: Student,
    state: web::Data<AppState>,
) -> Result<HttpResponse, WorkflowError> {
    let store = state.store.as_ref();
    let mine = store.list_enrollments(Some(gate.profile.id)).await?;
    let listing: Vec<ProgramListingOut> = store
        .list_programs(true)
        .await?
        .into_iter()
        .map(|program| ProgramListingOut {
            is_enrolled: mine.iter().any(|e| e.program_id == program.id),
            program,
        })
        .collect();

    Ok(HttpResponse::Ok().json(ApiResponse::success("Programs loaded", listing)))
}

/// POST /dashboard/programs/{program_id}/enroll
#[post("/dashboard/programs/{program_id}/enroll")]
pub async fn enroll(
    gate: Student,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, WorkflowError> {
    let enrollment =
        catalog::enroll(state.store.as_ref(), gate.profile.id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Enrolled", enrollment)))
}

/// GET /dashboard/profile
#[get("/dashboard/profile")]
pub async fn my_profile(
    gate: Student,
    state: web::Data<AppState>,
) -> Result<HttpResponse, WorkflowError> {
    let store = state.store.as_ref();
    let profile = gate.profile;
    let steps = store.list_steps(true).await?;
    let rows = store.list_progress(&ProgressFilter::for_user(profile.id)).await?;
    let summary = aggregate(&steps, &rows);
    let enrolled_programs = store.list_enrollments(Some(profile.id)).await?.len();

    Ok(HttpResponse::Ok().json(ApiResponse::success(
        "Profile loaded",
        ProfilePageOut {
            role_label: profile.role.label(),
            completed_steps: summary.completed_count,
            total_steps: summary.total_count,
            enrolled_programs,
            profile,
        },
    )))
}

/// GET /dashboard/steps/{step_id}
#[get("/dashboard/steps/{step_id}")]
pub async fn view_step(
    gate: Student,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, WorkflowError> {
    let store = state.store.as_ref();
    let step_id = path.into_inner();
    let step = store
        .get_step(step_id)
        .await?
        .filter(|s| s.is_active)
        .ok_or_else(|| WorkflowError::ReferenceError(format!("step {} does not exist", step_id)))?;

    let row = store.find_progress(gate.profile.id, step_id).await?;
    let step_state = StepState::from_row(row.as_ref());

    Ok(HttpResponse::Ok().json(ApiResponse::success(
        "Step loaded",
        StepPageOut {
            instructions: step.step_type.instructions(),
            status_label: step_state.status_label(),
            admin_notes: row.as_ref().and_then(|r| r.admin_notes.clone()),
            completed_at: row.as_ref().and_then(|r| r.completed_at),
            editable: is_editable(&step_state, step.step_type),
            state: step_state,
            step,
        },
    )))
}

/// POST /dashboard/steps/{step_id}/submit
#[post("/dashboard/steps/{step_id}/submit")]
pub async fn submit_step(
    gate: Student,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<SubmitStepIn>,
) -> Result<HttpResponse, WorkflowError> {
    let saved = workflow::submit_step(
        state.store.as_ref(),
        gate.profile.id,
        path.into_inner(),
        body.into_inner().data,
    )
    .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success("Step submitted", saved)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::program::Program;
    use crate::models::step::{FieldType, FormField, FormSchema, Step, StepType};
    use crate::models::user::Role;
    use crate::repositories::memory_store::MemoryStore;
    use crate::repositories::WorkflowStore;
    use crate::test_support::{bearer, seed_profile, state_with};
    use actix_web::http::{header, StatusCode};
    use actix_web::{test, App};
    use chrono::Utc;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn form_step(order_index: i32) -> Step {
        Step {
            id: Uuid::new_v4(),
            name: "Personal data".into(),
            description: None,
            step_type: StepType::Form,
            order_index,
            is_active: true,
            form_fields: Some(FormSchema {
                fields: vec![FormField {
                    name: "city".into(),
                    field_type: FieldType::Text,
                    required: true,
                    options: vec![],
                    placeholder: None,
                }],
            }),
        }
    }

    macro_rules! app {
        ($store:expr) => {
            test::init_service(
                App::new()
                    .app_data(state_with($store.clone()))
                    .configure(crate::routes::configure),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn anonymous_request_is_sent_to_login() {
        let store = Arc::new(MemoryStore::new());
        let app = app!(store);
        let resp = test::call_service(&app, test::TestRequest::get().uri("/dashboard").to_request()).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/auth/login");
    }

    #[actix_web::test]
    async fn admin_role_is_sent_to_unauthorized() {
        let store = Arc::new(MemoryStore::new());
        let staff = seed_profile(&store, "Rudi", Role::Admin).await;
        let app = app!(store);
        let req = test::TestRequest::get()
            .uri("/dashboard")
            .insert_header(bearer(staff.id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/unauthorized");
    }

    #[actix_web::test]
    async fn student_submits_and_sees_progress() {
        let store = Arc::new(MemoryStore::new());
        let student = seed_profile(&store, "Ayu", Role::User).await;
        let first = form_step(1);
        let second = Step {
            id: Uuid::new_v4(),
            name: "Interview".into(),
            step_type: StepType::Review,
            order_index: 2,
            form_fields: None,
            ..form_step(2)
        };
        store.save_step(&first).await.unwrap();
        store.save_step(&second).await.unwrap();
        let app = app!(store);

        let req = test::TestRequest::post()
            .uri(&format!("/dashboard/steps/{}/submit", first.id))
            .insert_header(bearer(student.id))
            .set_json(json!({"data": {"city": "Medan"}}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["status"], "in_progress");

        let req = test::TestRequest::get()
            .uri(&format!("/dashboard/steps/{}", first.id))
            .insert_header(bearer(student.id))
            .to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(body["data"]["editable"], true);
        assert_eq!(body["data"]["state"]["status"], "in_progress");
        assert_eq!(body["data"]["state"]["data"]["city"], "Medan");

        let req = test::TestRequest::get()
            .uri("/dashboard")
            .insert_header(bearer(student.id))
            .to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(body["data"]["progress"]["total_count"], 2);
        assert_eq!(body["data"]["progress"]["completed_count"], 0);
        assert_eq!(body["data"]["progress"]["current_step"]["id"], first.id.to_string());
    }

    #[actix_web::test]
    async fn missing_required_field_is_unprocessable() {
        let store = Arc::new(MemoryStore::new());
        let student = seed_profile(&store, "Ayu", Role::User).await;
        let step = form_step(1);
        store.save_step(&step).await.unwrap();
        let app = app!(store);

        let req = test::TestRequest::post()
            .uri(&format!("/dashboard/steps/{}/submit", step.id))
            .insert_header(bearer(student.id))
            .set_json(json!({"data": {}}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(store.find_progress(student.id, step.id).await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn retired_step_cannot_be_submitted() {
        let store = Arc::new(MemoryStore::new());
        let student = seed_profile(&store, "Ayu", Role::User).await;
        let retired = Step {
            is_active: false,
            ..form_step(1)
        };
        store.save_step(&retired).await.unwrap();
        let app = app!(store);

        let req = test::TestRequest::post()
            .uri(&format!("/dashboard/steps/{}/submit", retired.id))
            .insert_header(bearer(student.id))
            .set_json(json!({"data": {"city": "Medan"}}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(store.find_progress(student.id, retired.id).await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn unknown_step_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let student = seed_profile(&store, "Ayu", Role::User).await;
        let app = app!(store);
        let req = test::TestRequest::get()
            .uri(&format!("/dashboard/steps/{}", Uuid::new_v4()))
            .insert_header(bearer(student.id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn enrollment_is_idempotent_and_listed() {
        let store = Arc::new(MemoryStore::new());
        let student = seed_profile(&store, "Ayu", Role::User).await;
        let program = Program {
            id: Uuid::new_v4(),
            name: "Hospitality".into(),
            description: None,
            is_active: true,
            created_at: Utc::now(),
        };
        store.save_program(&program).await.unwrap();
        let app = app!(store);

        for _ in 0..2 {
            let req = test::TestRequest::post()
                .uri(&format!("/dashboard/programs/{}/enroll", program.id))
                .insert_header(bearer(student.id))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        }
        assert_eq!(store.list_enrollments(Some(student.id)).await.unwrap().len(), 1);

        let req = test::TestRequest::get()
            .uri("/dashboard/programs")
            .insert_header(bearer(student.id))
            .to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(body["data"][0]["is_enrolled"], true);

        let req = test::TestRequest::get()
            .uri("/dashboard/profile")
            .insert_header(bearer(student.id))
            .to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(body["data"]["enrolled_programs"], 1);
        assert_eq!(body["data"]["role_label"], "Student");
    }
}
