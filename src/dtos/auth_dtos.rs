use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::Profile;

#[derive(Deserialize)]
pub struct SignupIn {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Deserialize)]
pub struct LoginIn {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct SessionOut {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub token_type: Option<String>,
}

#[derive(Serialize)]
pub struct SignupResponse {
    pub user_id: Uuid,
    pub message: String,
    pub next_step: String,
}

/// `next_step` is the landing route for the caller's role.
#[derive(Serialize)]
pub struct LoginResponse {
    pub session: SessionOut,
    pub profile: Profile,
    pub next_step: String,
}
