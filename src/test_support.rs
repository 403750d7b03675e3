// src/test_support.rs - shared fixtures for handler tests
use std::sync::Arc;

use actix_web::web;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::user::{JwtClaims, Profile, Role};
use crate::repositories::memory_store::MemoryStore;
use crate::repositories::WorkflowStore;
use crate::services::access_gate::AccessPolicy;
use crate::services::auth_services::AuthService;
use crate::AppState;

pub const JWT_SECRET: &str = "test-jwt-secret-0123456789abcdef";

pub fn token_for(user_id: Uuid) -> String {
    let now = Utc::now().timestamp() as usize;
    let claims = JwtClaims {
        sub: user_id.to_string(),
        aud: Some("authenticated".into()),
        exp: now + 3600,
        iat: Some(now),
        role: Some("authenticated".into()),
        email: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn bearer(user_id: Uuid) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token_for(user_id)))
}

pub fn state_with(store: Arc<MemoryStore>) -> web::Data<AppState> {
    web::Data::new(AppState {
        store,
        policy: AccessPolicy::default(),
        jwt_secret: JWT_SECRET.to_string(),
    })
}

/// Points at a closed local port; only for paths that never reach the network.
pub fn auth_service() -> web::Data<AuthService> {
    let config = AppConfig::from_lookup(|key| match key {
        "SUPABASE_URL" => Some("http://127.0.0.1:9".to_string()),
        "SUPABASE_SERVICE_ROLE_KEY" => Some("service-key".to_string()),
        "SUPABASE_JWT_SECRET" => Some(JWT_SECRET.to_string()),
        _ => None,
    })
    .unwrap();
    web::Data::new(AuthService::new(reqwest::Client::new(), &config))
}

pub async fn seed_profile(store: &MemoryStore, name: &str, role: Role) -> Profile {
    let profile = Profile::new(
        Uuid::new_v4(),
        Some(name.to_string()),
        Some(format!("{}@kampus.ac.id", name.to_lowercase())),
        role,
    );
    store.upsert_profile(&profile).await.unwrap()
}
