// src/repositories/supabase_store.rs
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::program::{Enrollment, Program};
use crate::models::progress::StepProgress;
use crate::models::step::Step;
use crate::models::user::{Profile, Role};
use crate::repositories::{ProgressFilter, RepoError, WorkflowStore};

// Postgres foreign_key_violation, surfaced by PostgREST in the `code` field.
const FK_VIOLATION: &str = "23503";

/// Workflow tables via Supabase (PostgREST), using the service role key.
#[derive(Clone)]
pub struct SupabaseStore {
    client: Client,
    base_rest_url: String,    // e.g. https://xyz.supabase.co/rest/v1
    service_role_key: String, // SUPABASE_SERVICE_ROLE_KEY (server-only)
    anon_key: Option<String>,
}

impl SupabaseStore {
    pub fn new(client: Client, config: &AppConfig) -> Self {
        let url = config.supabase_url.trim_end_matches('/');
        let rest = if url.ends_with("/rest/v1") {
            url.to_string()
        } else {
            format!("{}/rest/v1", url)
        };

        Self {
            client,
            base_rest_url: rest,
            service_role_key: config.supabase_service_role_key.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_rest_url, table)
    }

    fn headers(&self) -> reqwest::header::HeaderMap {
        use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        // apikey is required by the Supabase gateway; fall back to the service key
        let api_key = self.anon_key.as_deref().unwrap_or(&self.service_role_key);
        if let Ok(v) = HeaderValue::from_str(api_key) {
            headers.insert("apikey", v);
        }
        if let Ok(v) = HeaderValue::from_str(&format!("Bearer {}", self.service_role_key)) {
            headers.insert(AUTHORIZATION, v);
        }
        headers
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, RepoError> {
        let resp: Response = request.headers(self.headers()).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if status.is_success() {
            return Ok(text);
        }

        Err(classify(status, text))
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, RepoError> {
        debug!("GET {} {:?}", table, query);
        let text = self
            .send(self.client.get(self.table_url(table)).query(query))
            .await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, RepoError> {
        let rows: Vec<T> = self.select(table, query).await?;
        Ok(rows.into_iter().next())
    }

    /// POST with merge-duplicates; `on_conflict` names the unique columns.
    async fn upsert<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        on_conflict: &str,
        body: &B,
    ) -> Result<T, RepoError> {
        let request = self
            .client
            .post(self.table_url(table))
            .query(&[("on_conflict", on_conflict)])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(body);
        let text = self.send(request).await?;
        let rows: Vec<T> = serde_json::from_str(&text)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| RepoError::Other(format!("empty response from {} upsert", table)))
    }
}

/// Maps a failed PostgREST response onto the store error taxonomy.
fn classify(status: StatusCode, text: String) -> RepoError {
    let code = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| v.get("code").and_then(|c| c.as_str()).map(str::to_string));
    if code.as_deref() == Some(FK_VIOLATION) {
        return RepoError::ForeignKey(text);
    }
    RepoError::Supabase(format!("{} -> {}", status.as_u16(), text))
}

// `RequestBuilder::query` does the percent-encoding.
fn eq(value: impl ToString) -> String {
    format!("eq.{}", value.to_string())
}

#[async_trait]
impl WorkflowStore for SupabaseStore {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, RepoError> {
        self.select_one("profiles", &[("id", eq(user_id)), ("select", "*".into())])
            .await
    }

    async fn list_profiles(&self, role: Option<Role>) -> Result<Vec<Profile>, RepoError> {
        let mut query = vec![("select", "*".to_string()), ("order", "created_at.desc".into())];
        if let Some(role) = role {
            query.push(("role", eq(role)));
        }
        self.select("profiles", &query).await
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<Profile, RepoError> {
        self.upsert("profiles", "id", profile).await
    }

    async fn update_role(&self, user_id: Uuid, role: Role) -> Result<Profile, RepoError> {
        let request = self
            .client
            .patch(self.table_url("profiles"))
            .query(&[("id", eq(user_id))])
            .header("Prefer", "return=representation")
            .json(&json!({ "role": role }));
        let text = self.send(request).await?;
        let rows: Vec<Profile> = serde_json::from_str(&text)?;
        rows.into_iter().next().ok_or(RepoError::NotFound)
    }

    async fn list_programs(&self, active_only: bool) -> Result<Vec<Program>, RepoError> {
        let mut query = vec![("select", "*".to_string()), ("order", "name.asc".into())];
        if active_only {
            query.push(("is_active", "eq.true".into()));
        }
        self.select("programs", &query).await
    }

    async fn get_program(&self, id: Uuid) -> Result<Option<Program>, RepoError> {
        self.select_one("programs", &[("id", eq(id)), ("select", "*".into())])
            .await
    }

    async fn save_program(&self, program: &Program) -> Result<Program, RepoError> {
        self.upsert("programs", "id", program).await
    }

    async fn list_enrollments(&self, user_id: Option<Uuid>) -> Result<Vec<Enrollment>, RepoError> {
        let mut query = vec![("select", "*".to_string())];
        if let Some(user_id) = user_id {
            query.push(("user_id", eq(user_id)));
        }
        self.select("user_programs", &query).await
    }

    async fn enroll(&self, enrollment: &Enrollment) -> Result<Enrollment, RepoError> {
        self.upsert("user_programs", "user_id,program_id", enrollment)
            .await
    }

    async fn list_steps(&self, active_only: bool) -> Result<Vec<Step>, RepoError> {
        let mut query = vec![("select", "*".to_string()), ("order", "order_index.asc".into())];
        if active_only {
            query.push(("is_active", "eq.true".into()));
        }
        self.select("steps", &query).await
    }

    async fn get_step(&self, id: Uuid) -> Result<Option<Step>, RepoError> {
        self.select_one("steps", &[("id", eq(id)), ("select", "*".into())])
            .await
    }

    async fn save_step(&self, step: &Step) -> Result<Step, RepoError> {
        self.upsert("steps", "id", step).await
    }

    async fn get_progress(&self, id: Uuid) -> Result<Option<StepProgress>, RepoError> {
        self.select_one("user_step_progress", &[("id", eq(id)), ("select", "*".into())])
            .await
    }

    async fn find_progress(
        &self,
        user_id: Uuid,
        step_id: Uuid,
    ) -> Result<Option<StepProgress>, RepoError> {
        self.select_one(
            "user_step_progress",
            &[
                ("user_id", eq(user_id)),
                ("step_id", eq(step_id)),
                ("select", "*".into()),
            ],
        )
        .await
    }

    async fn list_progress(&self, filter: &ProgressFilter) -> Result<Vec<StepProgress>, RepoError> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", format!("{}.desc", filter.order.column())),
        ];
        if let Some(user_id) = filter.user_id {
            query.push(("user_id", eq(user_id)));
        }
        if !filter.statuses.is_empty() {
            let set: Vec<&str> = filter.statuses.iter().map(|s| s.as_str()).collect();
            query.push(("status", format!("in.({})", set.join(","))));
        }
        if let Some(limit) = filter.limit {
            query.push(("limit", limit.to_string()));
        }
        self.select("user_step_progress", &query).await
    }

    async fn save_progress(&self, progress: &StepProgress) -> Result<StepProgress, RepoError> {
        // id and created_at stay out of the payload so a conflicting row keeps its own
        let body = json!({
            "user_id": progress.user_id,
            "step_id": progress.step_id,
            "status": progress.status,
            "data": progress.data,
            "admin_notes": progress.admin_notes,
            "updated_at": progress.updated_at,
            "completed_at": progress.completed_at,
        });
        self.upsert("user_step_progress", "user_id,step_id", &body)
            .await
    }
}
