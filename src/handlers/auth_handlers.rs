use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use log::{error, info, warn};
use regex::Regex;
use serde::Serialize;

use crate::dtos::api::ApiResponse;
use crate::dtos::auth_dtos::{LoginIn, LoginResponse, SignupIn, SignupResponse};
use crate::middleware::auth_extractor::bearer_token;
use crate::models::user::{Profile, Role};
use crate::routes::LOGIN_PATH;
use crate::services::auth_services::AuthService;
use crate::AppState;

pub(crate) fn looks_like_email(email: &str) -> bool {
    Regex::new(r"(?i)^[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}$")
        .map(|re| re.is_match(email))
        .unwrap_or(false)
}

/// Shared input check for every account-creating endpoint.
pub(crate) fn check_credentials(email: &str, password: &str) -> Result<(), &'static str> {
    if !looks_like_email(email) {
        return Err("Invalid email format");
    }
    if password.len() < 6 {
        return Err("Password must be at least 6 characters long");
    }
    Ok(())
}

#[derive(Serialize)]
struct RedirectOut {
    redirect_to: &'static str,
}

/// POST /auth/signup
/// Student self-registration. Creates the auth account and a `user` profile;
/// no session is returned, the client continues at the login page.
#[post("/auth/signup")]
pub async fn signup(
    svc: web::Data<AuthService>,
    state: web::Data<AppState>,
    body: web::Json<SignupIn>,
) -> impl Responder {
    let email = body.email.trim().to_lowercase();
    let full_name = body.full_name.trim();

    if let Err(msg) = check_credentials(&email, &body.password) {
        return HttpResponse::BadRequest().json(ApiResponse::error(msg));
    }
    if full_name.is_empty() {
        return HttpResponse::BadRequest().json(ApiResponse::error("Full name is required"));
    }

    let user_id = match svc.signup(&email, &body.password, full_name).await {
        Ok(id) => id,
        Err(e) => {
            warn!("Signup error: {}", e);
            let msg = if e.to_string().contains("already registered") {
                "Email already exists. Please login instead."
            } else {
                "Failed to create account. Please try again."
            };
            return HttpResponse::BadRequest().json(ApiResponse::error(msg));
        }
    };

    let profile = Profile::new(user_id, Some(full_name.to_string()), Some(email), Role::User);
    if let Err(e) = state.store.upsert_profile(&profile).await {
        error!("profile insert failed for {}: {}", user_id, e);
        return HttpResponse::InternalServerError()
            .json(ApiResponse::error("Account created but profile could not be saved"));
    }

    info!("new student account {}", user_id);
    HttpResponse::Created().json(ApiResponse::success(
        "Account created",
        SignupResponse {
            user_id,
            message: "Account created successfully. Please login to continue.".to_string(),
            next_step: LOGIN_PATH.to_string(),
        },
    ))
}

/// POST /auth/login
/// Returns the session, the profile and the route the client should open next.
#[post("/auth/login")]
pub async fn login(
    svc: web::Data<AuthService>,
    state: web::Data<AppState>,
    body: web::Json<LoginIn>,
) -> impl Responder {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return HttpResponse::BadRequest().json(ApiResponse::error("Email and password are required"));
    }

    let (session, user_id) = match svc.login_with_user_id(&body).await {
        Ok(pair) => pair,
        Err(e) => {
            warn!("Login failed: {}", e);
            return HttpResponse::Unauthorized()
                .json(ApiResponse::error("Invalid email or password"));
        }
    };

    match state.store.get_profile(user_id).await {
        Ok(Some(profile)) => {
            info!("{} signed in as {}", profile.display_name(), profile.role);
            let next_step = state.policy.landing_path(profile.role).to_string();
            HttpResponse::Ok().json(ApiResponse::success(
                "Login successful",
                LoginResponse {
                    session,
                    profile,
                    next_step,
                },
            ))
        }
        Ok(None) => {
            warn!("user {} signed in without a profile row", user_id);
            HttpResponse::Forbidden().json(ApiResponse::error("No profile found for this account"))
        }
        Err(e) => {
            error!("profile lookup failed for {}: {}", user_id, e);
            HttpResponse::InternalServerError().json(ApiResponse::error("Failed to load profile"))
        }
    }
}

/// POST /auth/logout
#[post("/auth/logout")]
pub async fn logout(svc: web::Data<AuthService>, req: HttpRequest) -> impl Responder {
    if let Some(token) = bearer_token(&req) {
        if let Err(e) = svc.sign_out(token).await {
            error!("Logout failed: {}", e);
            return HttpResponse::BadGateway().json(ApiResponse::error("Failed to sign out"));
        }
    }

    HttpResponse::Ok().json(ApiResponse::success(
        "Signed out",
        RedirectOut {
            redirect_to: LOGIN_PATH,
        },
    ))
}

/// GET /unauthorized
#[get("/unauthorized")]
pub async fn unauthorized() -> impl Responder {
    HttpResponse::Forbidden().json(ApiResponse::error_with(
        "You do not have permission to access this page",
        RedirectOut { redirect_to: "/" },
    ))
}
