// src/repositories/memory_store.rs - in-process tables for local runs and tests
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::program::{Enrollment, Program};
use crate::models::progress::StepProgress;
use crate::models::step::Step;
use crate::models::user::{Profile, Role};
use crate::repositories::{ProgressFilter, ProgressOrder, RepoError, WorkflowStore};

#[derive(Default)]
struct Tables {
    profiles: HashMap<Uuid, Profile>,
    programs: HashMap<Uuid, Program>,
    enrollments: Vec<Enrollment>,
    steps: HashMap<Uuid, Step>,
    progress: Vec<StepProgress>,
}

/// Keeps the same constraints the Postgres schema declares: foreign keys on
/// enrollments and progress, and (user_id, step_id) uniqueness.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, RepoError> {
        Ok(self.tables.read().await.profiles.get(&user_id).cloned())
    }

    async fn list_profiles(&self, role: Option<Role>) -> Result<Vec<Profile>, RepoError> {
        let tables = self.tables.read().await;
        let mut out: Vec<Profile> = tables
            .profiles
            .values()
            .filter(|p| role.is_none_or(|r| p.role == r))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<Profile, RepoError> {
        let mut tables = self.tables.write().await;
        tables.profiles.insert(profile.id, profile.clone());
        Ok(profile.clone())
    }

    async fn update_role(&self, user_id: Uuid, role: Role) -> Result<Profile, RepoError> {
        let mut tables = self.tables.write().await;
        let profile = tables.profiles.get_mut(&user_id).ok_or(RepoError::NotFound)?;
        profile.role = role;
        Ok(profile.clone())
    }

    async fn list_programs(&self, active_only: bool) -> Result<Vec<Program>, RepoError> {
        let tables = self.tables.read().await;
        let mut out: Vec<Program> = tables
            .programs
            .values()
            .filter(|p| !active_only || p.is_active)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn get_program(&self, id: Uuid) -> Result<Option<Program>, RepoError> {
        Ok(self.tables.read().await.programs.get(&id).cloned())
    }

    async fn save_program(&self, program: &Program) -> Result<Program, RepoError> {
        let mut tables = self.tables.write().await;
        tables.programs.insert(program.id, program.clone());
        Ok(program.clone())
    }

    async fn list_enrollments(&self, user_id: Option<Uuid>) -> Result<Vec<Enrollment>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .enrollments
            .iter()
            .filter(|e| user_id.is_none_or(|u| e.user_id == u))
            .cloned()
            .collect())
    }

    async fn enroll(&self, enrollment: &Enrollment) -> Result<Enrollment, RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.profiles.contains_key(&enrollment.user_id) {
            return Err(RepoError::ForeignKey(format!(
                "user_programs.user_id {} has no profile",
                enrollment.user_id
            )));
        }
        if !tables.programs.contains_key(&enrollment.program_id) {
            return Err(RepoError::ForeignKey(format!(
                "user_programs.program_id {} has no program",
                enrollment.program_id
            )));
        }
        if let Some(existing) = tables
            .enrollments
            .iter()
            .find(|e| e.user_id == enrollment.user_id && e.program_id == enrollment.program_id)
        {
            return Ok(existing.clone());
        }
        tables.enrollments.push(enrollment.clone());
        Ok(enrollment.clone())
    }

    async fn list_steps(&self, active_only: bool) -> Result<Vec<Step>, RepoError> {
        let tables = self.tables.read().await;
        let mut out: Vec<Step> = tables
            .steps
            .values()
            .filter(|s| !active_only || s.is_active)
            .cloned()
            .collect();
        out.sort_by_key(|s| s.order_index);
        Ok(out)
    }

    async fn get_step(&self, id: Uuid) -> Result<Option<Step>, RepoError> {
        Ok(self.tables.read().await.steps.get(&id).cloned())
    }

    async fn save_step(&self, step: &Step) -> Result<Step, RepoError> {
        let mut tables = self.tables.write().await;
        tables.steps.insert(step.id, step.clone());
        Ok(step.clone())
    }

    async fn get_progress(&self, id: Uuid) -> Result<Option<StepProgress>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.progress.iter().find(|p| p.id == id).cloned())
    }

    async fn find_progress(
        &self,
        user_id: Uuid,
        step_id: Uuid,
    ) -> Result<Option<StepProgress>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables
            .progress
            .iter()
            .find(|p| p.user_id == user_id && p.step_id == step_id)
            .cloned())
    }

    async fn list_progress(&self, filter: &ProgressFilter) -> Result<Vec<StepProgress>, RepoError> {
        let tables = self.tables.read().await;
        let mut out: Vec<StepProgress> = tables
            .progress
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        match filter.order {
            ProgressOrder::CreatedDesc => out.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            ProgressOrder::UpdatedDesc => out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
        }
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn save_progress(&self, progress: &StepProgress) -> Result<StepProgress, RepoError> {
        let mut tables = self.tables.write().await;
        if !tables.profiles.contains_key(&progress.user_id) {
            return Err(RepoError::ForeignKey(format!(
                "user_step_progress.user_id {} has no profile",
                progress.user_id
            )));
        }
        if !tables.steps.contains_key(&progress.step_id) {
            return Err(RepoError::ForeignKey(format!(
                "user_step_progress.step_id {} has no step",
                progress.step_id
            )));
        }

        if let Some(existing) = tables
            .progress
            .iter_mut()
            .find(|p| p.user_id == progress.user_id && p.step_id == progress.step_id)
        {
            let id = existing.id;
            let created_at = existing.created_at;
            *existing = StepProgress {
                id,
                created_at,
                ..progress.clone()
            };
            return Ok(existing.clone());
        }

        tables.progress.push(progress.clone());
        Ok(progress.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::progress::{ProgressStatus, StepState};
    use crate::models::step::{StepType, SubmissionData};
    use chrono::Utc;

    fn step(order_index: i32) -> Step {
        Step {
            id: Uuid::new_v4(),
            name: format!("Step {}", order_index),
            description: None,
            step_type: StepType::Form,
            order_index,
            is_active: true,
            form_fields: None,
        }
    }

    #[tokio::test]
    async fn second_progress_row_for_same_pair_updates_the_first() {
        let store = MemoryStore::new();
        let student = Profile::new(Uuid::new_v4(), Some("Dewi".into()), None, Role::User);
        let s = step(1);
        store.upsert_profile(&student).await.unwrap();
        store.save_step(&s).await.unwrap();

        let now = Utc::now();
        let first = StepProgress::first(student.id, s.id, now);
        let saved = store.save_progress(&first).await.unwrap();

        let mut second = StepProgress::first(student.id, s.id, now);
        let mut data = SubmissionData::new();
        data.insert("city".into(), "Bandung".into());
        second.apply(StepState::InProgress { data, updated_at: now }, now);
        let updated = store.save_progress(&second).await.unwrap();

        assert_eq!(updated.id, saved.id);
        let rows = store
            .list_progress(&ProgressFilter::for_user(student.id))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].data["city"], "Bandung");
    }

    #[tokio::test]
    async fn progress_for_unknown_step_is_a_foreign_key_error() {
        let store = MemoryStore::new();
        let student = Profile::new(Uuid::new_v4(), None, None, Role::User);
        store.upsert_profile(&student).await.unwrap();

        let orphan = StepProgress::first(student.id, Uuid::new_v4(), Utc::now());
        let err = store.save_progress(&orphan).await.unwrap_err();
        assert!(matches!(err, RepoError::ForeignKey(_)));
    }

    #[tokio::test]
    async fn list_progress_filters_orders_and_limits() {
        let store = MemoryStore::new();
        let student = Profile::new(Uuid::new_v4(), None, None, Role::User);
        store.upsert_profile(&student).await.unwrap();

        let base = Utc::now();
        for (i, status) in [
            ProgressStatus::Pending,
            ProgressStatus::InProgress,
            ProgressStatus::Completed,
            ProgressStatus::Pending,
        ]
        .into_iter()
        .enumerate()
        {
            let s = step(i as i32 + 1);
            store.save_step(&s).await.unwrap();
            let mut p = StepProgress::first(student.id, s.id, base + chrono::Duration::minutes(i as i64));
            p.status = status;
            store.save_progress(&p).await.unwrap();
        }

        let filter = ProgressFilter::with_status(
            &[ProgressStatus::Pending, ProgressStatus::InProgress],
            ProgressOrder::CreatedDesc,
        )
        .limit(2);
        let rows = store.list_progress(&filter).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].created_at > rows[1].created_at);
        assert!(rows.iter().all(|r| r.status != ProgressStatus::Completed));
    }

    #[tokio::test]
    async fn enrolling_twice_keeps_one_row() {
        let store = MemoryStore::new();
        let student = Profile::new(Uuid::new_v4(), None, None, Role::User);
        let program = Program {
            id: Uuid::new_v4(),
            name: "Informatics".into(),
            description: None,
            is_active: true,
            created_at: Utc::now(),
        };
        store.upsert_profile(&student).await.unwrap();
        store.save_program(&program).await.unwrap();

        store.enroll(&Enrollment::new(student.id, program.id)).await.unwrap();
        store.enroll(&Enrollment::new(student.id, program.id)).await.unwrap();
        assert_eq!(store.list_enrollments(Some(student.id)).await.unwrap().len(), 1);
    }
}
