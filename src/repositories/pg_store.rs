// src/repositories/pg_store.rs - direct Postgres access through the deadpool pool
use async_trait::async_trait;
use deadpool_postgres::Pool;
use serde_json::Value;
use tokio_postgres::error::SqlState;
use tokio_postgres::Row;
use uuid::Uuid;

use crate::models::program::{Enrollment, Program};
use crate::models::progress::{ProgressStatus, StepProgress};
use crate::models::step::{FormSchema, Step, StepType, SubmissionData};
use crate::models::user::{Profile, Role};
use crate::repositories::{ProgressFilter, RepoError, WorkflowStore};

const PROFILE_COLUMNS: &str = "id, full_name, email, role, created_at";
const PROGRAM_COLUMNS: &str = "id, name, description, is_active, created_at";
const STEP_COLUMNS: &str = "id, name, description, step_type, order_index, is_active, form_fields";
const PROGRESS_COLUMNS: &str =
    "id, user_id, step_id, status, data, admin_notes, created_at, updated_at, completed_at";

#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

fn is_fk_violation(code: Option<&SqlState>) -> bool {
    code == Some(&SqlState::FOREIGN_KEY_VIOLATION)
}

fn map_pg(e: tokio_postgres::Error) -> RepoError {
    if is_fk_violation(e.code()) {
        return RepoError::ForeignKey(e.to_string());
    }
    RepoError::Postgres(e)
}

/// `data` is jsonb and may be null or, in old rows, a non-object.
fn submission_data(raw: Option<Value>) -> SubmissionData {
    match raw {
        Some(Value::Object(map)) => map,
        _ => SubmissionData::new(),
    }
}

fn profile_from_row(row: &Row) -> Result<Profile, RepoError> {
    let role: String = row.try_get("role")?;
    Ok(Profile {
        id: row.try_get("id")?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        role: role.parse::<Role>().map_err(|e| RepoError::Other(e.to_string()))?,
        created_at: row.try_get("created_at")?,
    })
}

fn program_from_row(row: &Row) -> Result<Program, RepoError> {
    Ok(Program {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn enrollment_from_row(row: &Row) -> Result<Enrollment, RepoError> {
    Ok(Enrollment {
        user_id: row.try_get("user_id")?,
        program_id: row.try_get("program_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn step_from_row(row: &Row) -> Result<Step, RepoError> {
    let step_type: String = row.try_get("step_type")?;
    let form_fields: Option<Value> = row.try_get("form_fields")?;
    Ok(Step {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        step_type: serde_json::from_value::<StepType>(Value::String(step_type))?,
        order_index: row.try_get("order_index")?,
        is_active: row.try_get("is_active")?,
        form_fields: form_fields
            .map(serde_json::from_value::<FormSchema>)
            .transpose()?,
    })
}

fn progress_from_row(row: &Row) -> Result<StepProgress, RepoError> {
    let status: String = row.try_get("status")?;
    let data = submission_data(row.try_get("data")?);
    Ok(StepProgress {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        step_id: row.try_get("step_id")?,
        status: status.parse::<ProgressStatus>().map_err(RepoError::Other)?,
        data,
        admin_notes: row.try_get("admin_notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

fn collect<T>(rows: &[Row], f: fn(&Row) -> Result<T, RepoError>) -> Result<Vec<T>, RepoError> {
    rows.iter().map(f).collect()
}

#[async_trait]
impl WorkflowStore for PgStore {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, RepoError> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {} FROM profiles WHERE id = $1", PROFILE_COLUMNS);
        let row = client.query_opt(&sql, &[&user_id]).await.map_err(map_pg)?;
        row.as_ref().map(profile_from_row).transpose()
    }

    async fn list_profiles(&self, role: Option<Role>) -> Result<Vec<Profile>, RepoError> {
        let client = self.pool.get().await?;
        let role = role.map(|r| r.as_str().to_string());
        let sql = format!(
            "SELECT {} FROM profiles WHERE ($1::text IS NULL OR lower(role) = $1) \
             ORDER BY created_at DESC",
            PROFILE_COLUMNS
        );
        let rows = client.query(&sql, &[&role]).await.map_err(map_pg)?;
        collect(&rows, profile_from_row)
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<Profile, RepoError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "INSERT INTO profiles (id, full_name, email, role, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET full_name = EXCLUDED.full_name, \
             email = EXCLUDED.email, role = EXCLUDED.role \
             RETURNING {}",
            PROFILE_COLUMNS
        );
        let row = client
            .query_one(
                &sql,
                &[
                    &profile.id,
                    &profile.full_name,
                    &profile.email,
                    &profile.role.as_str(),
                    &profile.created_at,
                ],
            )
            .await
            .map_err(map_pg)?;
        profile_from_row(&row)
    }

    async fn update_role(&self, user_id: Uuid, role: Role) -> Result<Profile, RepoError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "UPDATE profiles SET role = $2 WHERE id = $1 RETURNING {}",
            PROFILE_COLUMNS
        );
        let row = client
            .query_opt(&sql, &[&user_id, &role.as_str()])
            .await
            .map_err(map_pg)?
            .ok_or(RepoError::NotFound)?;
        profile_from_row(&row)
    }

    async fn list_programs(&self, active_only: bool) -> Result<Vec<Program>, RepoError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {} FROM programs WHERE (NOT $1 OR is_active) ORDER BY name",
            PROGRAM_COLUMNS
        );
        let rows = client.query(&sql, &[&active_only]).await.map_err(map_pg)?;
        collect(&rows, program_from_row)
    }

    async fn get_program(&self, id: Uuid) -> Result<Option<Program>, RepoError> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {} FROM programs WHERE id = $1", PROGRAM_COLUMNS);
        let row = client.query_opt(&sql, &[&id]).await.map_err(map_pg)?;
        row.as_ref().map(program_from_row).transpose()
    }

    async fn save_program(&self, program: &Program) -> Result<Program, RepoError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "INSERT INTO programs (id, name, description, is_active, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, \
             description = EXCLUDED.description, is_active = EXCLUDED.is_active \
             RETURNING {}",
            PROGRAM_COLUMNS
        );
        let row = client
            .query_one(
                &sql,
                &[
                    &program.id,
                    &program.name,
                    &program.description,
                    &program.is_active,
                    &program.created_at,
                ],
            )
            .await
            .map_err(map_pg)?;
        program_from_row(&row)
    }

    async fn list_enrollments(&self, user_id: Option<Uuid>) -> Result<Vec<Enrollment>, RepoError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT user_id, program_id, created_at FROM user_programs \
                 WHERE ($1::uuid IS NULL OR user_id = $1)",
                &[&user_id],
            )
            .await
            .map_err(map_pg)?;
        collect(&rows, enrollment_from_row)
    }

    async fn enroll(&self, enrollment: &Enrollment) -> Result<Enrollment, RepoError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "INSERT INTO user_programs (user_id, program_id, created_at) VALUES ($1, $2, $3) \
                 ON CONFLICT (user_id, program_id) DO UPDATE SET user_id = EXCLUDED.user_id \
                 RETURNING user_id, program_id, created_at",
                &[
                    &enrollment.user_id,
                    &enrollment.program_id,
                    &enrollment.created_at,
                ],
            )
            .await
            .map_err(map_pg)?;
        enrollment_from_row(&row)
    }

    async fn list_steps(&self, active_only: bool) -> Result<Vec<Step>, RepoError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {} FROM steps WHERE (NOT $1 OR is_active) ORDER BY order_index",
            STEP_COLUMNS
        );
        let rows = client.query(&sql, &[&active_only]).await.map_err(map_pg)?;
        collect(&rows, step_from_row)
    }

    async fn get_step(&self, id: Uuid) -> Result<Option<Step>, RepoError> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {} FROM steps WHERE id = $1", STEP_COLUMNS);
        let row = client.query_opt(&sql, &[&id]).await.map_err(map_pg)?;
        row.as_ref().map(step_from_row).transpose()
    }

    async fn save_step(&self, step: &Step) -> Result<Step, RepoError> {
        let client = self.pool.get().await?;
        let form_fields = step
            .form_fields
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        let sql = format!(
            "INSERT INTO steps (id, name, description, step_type, order_index, is_active, form_fields) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, \
             description = EXCLUDED.description, step_type = EXCLUDED.step_type, \
             order_index = EXCLUDED.order_index, is_active = EXCLUDED.is_active, \
             form_fields = EXCLUDED.form_fields \
             RETURNING {}",
            STEP_COLUMNS
        );
        let row = client
            .query_one(
                &sql,
                &[
                    &step.id,
                    &step.name,
                    &step.description,
                    &step.step_type.as_str(),
                    &step.order_index,
                    &step.is_active,
                    &form_fields,
                ],
            )
            .await
            .map_err(map_pg)?;
        step_from_row(&row)
    }

    async fn get_progress(&self, id: Uuid) -> Result<Option<StepProgress>, RepoError> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {} FROM user_step_progress WHERE id = $1", PROGRESS_COLUMNS);
        let row = client.query_opt(&sql, &[&id]).await.map_err(map_pg)?;
        row.as_ref().map(progress_from_row).transpose()
    }

    async fn find_progress(
        &self,
        user_id: Uuid,
        step_id: Uuid,
    ) -> Result<Option<StepProgress>, RepoError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {} FROM user_step_progress WHERE user_id = $1 AND step_id = $2",
            PROGRESS_COLUMNS
        );
        let row = client
            .query_opt(&sql, &[&user_id, &step_id])
            .await
            .map_err(map_pg)?;
        row.as_ref().map(progress_from_row).transpose()
    }

    async fn list_progress(&self, filter: &ProgressFilter) -> Result<Vec<StepProgress>, RepoError> {
        let client = self.pool.get().await?;
        let statuses: Vec<String> = filter.statuses.iter().map(|s| s.to_string()).collect();
        let limit = filter.limit.map(|l| l as i64);
        // order column comes from a closed enum, never from input
        let sql = format!(
            "SELECT {} FROM user_step_progress \
             WHERE ($1::uuid IS NULL OR user_id = $1) \
             AND (cardinality($2::text[]) = 0 OR status = ANY($2)) \
             ORDER BY {} DESC LIMIT $3",
            PROGRESS_COLUMNS,
            filter.order.column()
        );
        let rows = client
            .query(&sql, &[&filter.user_id, &statuses, &limit])
            .await
            .map_err(map_pg)?;
        collect(&rows, progress_from_row)
    }

    async fn save_progress(&self, progress: &StepProgress) -> Result<StepProgress, RepoError> {
        let client = self.pool.get().await?;
        let data = Value::Object(progress.data.clone());
        let sql = format!(
            "INSERT INTO user_step_progress \
             (id, user_id, step_id, status, data, admin_notes, created_at, updated_at, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (user_id, step_id) DO UPDATE SET status = EXCLUDED.status, \
             data = EXCLUDED.data, admin_notes = EXCLUDED.admin_notes, \
             updated_at = EXCLUDED.updated_at, completed_at = EXCLUDED.completed_at \
             RETURNING {}",
            PROGRESS_COLUMNS
        );
        let row = client
            .query_one(
                &sql,
                &[
                    &progress.id,
                    &progress.user_id,
                    &progress.step_id,
                    &progress.status.as_str(),
                    &data,
                    &progress.admin_notes,
                    &progress.created_at,
                    &progress.updated_at,
                    &progress.completed_at,
                ],
            )
            .await
            .map_err(map_pg)?;
        progress_from_row(&row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_foreign_key_violations_become_reference_errors() {
        assert!(is_fk_violation(Some(&SqlState::FOREIGN_KEY_VIOLATION)));
        assert!(!is_fk_violation(Some(&SqlState::UNIQUE_VIOLATION)));
        assert!(!is_fk_violation(None));
    }

    #[test]
    fn null_or_scalar_data_reads_as_empty() {
        assert!(submission_data(None).is_empty());
        assert!(submission_data(Some(Value::Null)).is_empty());
        assert!(submission_data(Some(json!("legacy"))).is_empty());
        let data = submission_data(Some(json!({"city": "Padang"})));
        assert_eq!(data["city"], "Padang");
    }

    #[test]
    fn stored_status_text_parses() {
        for (raw, status) in [
            ("pending", ProgressStatus::Pending),
            ("in_progress", ProgressStatus::InProgress),
            ("completed", ProgressStatus::Completed),
            ("rejected", ProgressStatus::Rejected),
        ] {
            assert_eq!(raw.parse::<ProgressStatus>().unwrap(), status);
        }
        assert!("approved".parse::<ProgressStatus>().is_err());
    }
}
