// src/services/auth_services.rs - Supabase Auth (GoTrue) client
use log::{debug, warn};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::dtos::auth_dtos::{LoginIn, SessionOut};
use crate::models::user::Role;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("supabase error: {0}")]
    Supabase(String),
    #[error("invalid token")]
    InvalidToken,
    #[error("parse uuid error")]
    UuidError(#[from] uuid::Error),
    #[error("other: {0}")]
    Other(String),
}

#[derive(Clone)]
pub struct AuthService {
    pub client: reqwest::Client,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
}

impl AuthService {
    pub fn new(client: reqwest::Client, config: &AppConfig) -> Self {
        Self {
            client,
            supabase_url: config.supabase_url.trim_end_matches('/').to_string(),
            supabase_anon_key: config.supabase_anon_key.clone().unwrap_or_default(),
            supabase_service_role_key: config.supabase_service_role_key.clone(),
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.supabase_url, path)
    }

    fn public_key(&self) -> &str {
        if self.supabase_anon_key.is_empty() {
            &self.supabase_service_role_key
        } else {
            &self.supabase_anon_key
        }
    }

    /// Pulls a readable message out of a GoTrue error body.
    fn error_message(status: StatusCode, text: &str, fallback: &str) -> AuthError {
        if let Ok(error_json) = serde_json::from_str::<Value>(text) {
            if let Some(msg) = ["msg", "message", "error_description"]
                .iter()
                .find_map(|k| error_json.get(*k).and_then(|v| v.as_str()))
            {
                return AuthError::Supabase(msg.to_string());
            }
        }
        AuthError::Supabase(format!("{}: {} {}", fallback, status, text))
    }

    fn user_id_from(json_val: &Value) -> Result<Uuid, AuthError> {
        let user_id_str = json_val
            .get("user")
            .and_then(|u| u.get("id"))
            .or_else(|| json_val.get("id"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| AuthError::Supabase("response carried no user id".to_string()))?;
        Ok(Uuid::parse_str(user_id_str)?)
    }

    /// Student self-registration. The caller creates the profile row.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Uuid, AuthError> {
        let body = json!({
            "email": email.trim(),
            "password": password,
            "data": { "full_name": full_name },
        });

        let resp = self
            .client
            .post(self.auth_url("signup"))
            .header("apikey", self.public_key())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Self::error_message(status, &text, "signup failed"));
        }

        let json_val: Value = serde_json::from_str(&text)
            .map_err(|e| AuthError::Supabase(format!("invalid json: {}", e)))?;
        Self::user_id_from(&json_val)
    }

    /// Password grant; returns the session and the user id from the response.
    pub async fn login_with_user_id(&self, input: &LoginIn) -> Result<(SessionOut, Uuid), AuthError> {
        #[derive(Serialize)]
        struct LoginBody<'a> {
            email: &'a str,
            password: &'a str,
        }

        #[derive(Deserialize)]
        struct TokenResp {
            access_token: String,
            refresh_token: Option<String>,
            expires_in: Option<i64>,
            token_type: Option<String>,
            user: Option<UserInfo>,
        }

        #[derive(Deserialize)]
        struct UserInfo {
            id: String,
        }

        let body = LoginBody {
            email: input.email.trim(),
            password: &input.password,
        };

        let resp = self
            .client
            .post(self.auth_url("token?grant_type=password"))
            .header("apikey", self.public_key())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let txt = resp.text().await.unwrap_or_default();
        if status != StatusCode::OK {
            return Err(Self::error_message(status, &txt, "login failed"));
        }

        let tr: TokenResp = serde_json::from_str(&txt)
            .map_err(|e| AuthError::Supabase(format!("invalid json in login response: {}", e)))?;

        let user_id = match tr.user {
            Some(user) => Uuid::parse_str(&user.id)?,
            None => return Err(AuthError::Supabase("No user info in login response".to_string())),
        };

        let session = SessionOut {
            access_token: tr.access_token,
            refresh_token: tr.refresh_token,
            expires_in: tr.expires_in,
            token_type: tr.token_type,
        };

        Ok((session, user_id))
    }

    /// Invalidates the session behind `access_token`.
    pub async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let resp = self
            .client
            .post(self.auth_url("logout"))
            .header("apikey", self.public_key())
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        let status = resp.status();
        // an already-expired session is as good as signed out
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        let text = resp.text().await.unwrap_or_default();
        Err(Self::error_message(status, &text, "logout failed"))
    }

    /// Creates a confirmed staff account through the admin API (service role only).
    pub async fn admin_create_user(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        role: Role,
    ) -> Result<Uuid, AuthError> {
        if role == Role::User {
            return Err(AuthError::Other(
                "students register themselves; staff accounts only".to_string(),
            ));
        }

        let body = json!({
            "email": email.trim(),
            "password": password,
            "email_confirm": true,
            "user_metadata": { "full_name": full_name, "role": role },
        });

        debug!("creating {} account for {}", role, email.trim());

        let resp = self
            .client
            .post(self.auth_url("admin/users"))
            .header("apikey", &self.supabase_service_role_key)
            .header("Authorization", format!("Bearer {}", &self.supabase_service_role_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            warn!("admin create user failed: {}", status);
            return Err(Self::error_message(status, &text, "create user failed"));
        }

        let json_val: Value = serde_json::from_str(&text)
            .map_err(|e| AuthError::Supabase(format!("invalid json: {}", e)))?;
        Self::user_id_from(&json_val)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_is_read_from_nested_or_flat_response() {
        let id = Uuid::new_v4();
        let nested = json!({ "user": { "id": id.to_string() } });
        let flat = json!({ "id": id.to_string(), "email": "a@b.co" });
        assert_eq!(AuthService::user_id_from(&nested).unwrap(), id);
        assert_eq!(AuthService::user_id_from(&flat).unwrap(), id);
        assert!(AuthService::user_id_from(&json!({})).is_err());
    }

    #[test]
    fn gotrue_error_message_is_preferred() {
        let err = AuthService::error_message(
            StatusCode::BAD_REQUEST,
            r#"{"msg":"User already registered"}"#,
            "signup failed",
        );
        assert_eq!(err.to_string(), "supabase error: User already registered");

        let err = AuthService::error_message(StatusCode::BAD_GATEWAY, "upstream", "login failed");
        assert!(err.to_string().contains("login failed: 502"));
    }
}
