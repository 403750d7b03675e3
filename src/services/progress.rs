// src/services/progress.rs - overall progress and current step
use serde::Serialize;
use uuid::Uuid;

use crate::models::progress::{ProgressStatus, StepProgress, StepState};
use crate::models::step::Step;

#[derive(Debug, Clone, Serialize)]
pub struct StepStatusOut {
    pub step_id: Uuid,
    pub name: String,
    pub order_index: i32,
    pub step_type: String,
    pub status: &'static str,
    pub status_label: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressSummary {
    pub completed_count: usize,
    pub total_count: usize,
    pub percentage: f64,
    pub rounded_percentage: u32,
    pub current_step: Option<Step>,
    pub steps: Vec<StepStatusOut>,
}

/// Computes progress for one user from the active steps and their rows.
/// Recomputed on every read.
pub fn aggregate(active_steps: &[Step], progress: &[StepProgress]) -> ProgressSummary {
    let mut steps: Vec<&Step> = active_steps.iter().filter(|s| s.is_active).collect();
    steps.sort_by_key(|s| s.order_index);

    let states: Vec<(&Step, StepState)> = steps
        .iter()
        .map(|s| (*s, StepState::from_row(progress.iter().find(|p| p.step_id == s.id))))
        .collect();

    let completed_count = states.iter().filter(|(_, st)| st.is_completed()).count();
    let total_count = states.len();
    let pct = percentage(completed_count, total_count);

    let current_step = states
        .iter()
        .find(|(_, st)| !st.is_completed())
        .map(|(s, _)| Step::clone(s));

    let statuses = states
        .iter()
        .map(|(s, state)| StepStatusOut {
            step_id: s.id,
            name: s.name.clone(),
            order_index: s.order_index,
            step_type: s.step_type.to_string(),
            status: state.status_key(),
            status_label: state.status_label(),
        })
        .collect();

    ProgressSummary {
        completed_count,
        total_count,
        percentage: pct,
        rounded_percentage: pct.round() as u32,
        current_step,
        steps: statuses,
    }
}

pub fn percentage(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    completed as f64 / total as f64 * 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentBadge {
    NotStarted,
    InProgress,
    AlmostDone,
    Done,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentProgressOut {
    pub completed: usize,
    pub total: usize,
    pub summary: String,
    pub badge: StudentBadge,
}

/// Staff-side summary over the rows a student has touched.
pub fn student_summary(rows: &[StepProgress]) -> StudentProgressOut {
    let total = rows.len();
    let completed = rows
        .iter()
        .filter(|p| p.status == ProgressStatus::Completed)
        .count();

    if total == 0 {
        return StudentProgressOut {
            completed,
            total,
            summary: "No progress yet".to_string(),
            badge: StudentBadge::NotStarted,
        };
    }

    let pct = percentage(completed, total);
    let badge = if completed == total {
        StudentBadge::Done
    } else if pct > 50.0 {
        StudentBadge::AlmostDone
    } else if pct > 0.0 {
        StudentBadge::InProgress
    } else {
        StudentBadge::NotStarted
    };

    StudentProgressOut {
        completed,
        total,
        summary: format!("{}/{} steps completed", completed, total),
        badge,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::step::StepType;
    use chrono::Utc;

    fn step(order_index: i32, step_type: StepType) -> Step {
        Step {
            id: Uuid::new_v4(),
            name: format!("Step {}", order_index),
            description: None,
            step_type,
            order_index,
            is_active: true,
            form_fields: None,
        }
    }

    fn row(step: &Step, status: ProgressStatus) -> StepProgress {
        let mut p = StepProgress::first(Uuid::new_v4(), step.id, Utc::now());
        p.status = status;
        p
    }

    #[test]
    fn nothing_started_points_at_first_step() {
        let steps = vec![step(1, StepType::Form), step(2, StepType::Review)];
        let summary = aggregate(&steps, &[]);
        assert_eq!(summary.current_step.as_ref().map(|s| s.id), Some(steps[0].id));
        assert_eq!(summary.percentage, 0.0);
        assert_eq!(summary.steps[0].status, "not_started");
    }

    #[test]
    fn first_step_completed_moves_to_second() {
        let steps = vec![step(1, StepType::Form), step(2, StepType::Review)];
        let rows = vec![row(&steps[0], ProgressStatus::Completed)];
        let summary = aggregate(&steps, &rows);
        assert_eq!(summary.current_step.as_ref().map(|s| s.id), Some(steps[1].id));
        assert_eq!(summary.percentage, 50.0);
        assert_eq!(summary.completed_count, 1);
        assert_eq!(summary.total_count, 2);
    }

    #[test]
    fn unordered_input_is_sorted_by_order_index() {
        let steps = vec![step(3, StepType::Approval), step(1, StepType::Form), step(2, StepType::Upload)];
        let rows = vec![row(&steps[1], ProgressStatus::Completed), row(&steps[2], ProgressStatus::Rejected)];
        let summary = aggregate(&steps, &rows);
        assert_eq!(summary.current_step.map(|s| s.order_index), Some(2));
        assert_eq!(
            summary.steps.iter().map(|s| s.order_index).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(summary.rounded_percentage, 33);
    }

    #[test]
    fn no_active_steps_is_zero_percent_without_current_step() {
        let summary = aggregate(&[], &[]);
        assert_eq!(summary.percentage, 0.0);
        assert!(summary.current_step.is_none());
    }

    #[test]
    fn all_completed_has_no_current_step() {
        let steps = vec![step(1, StepType::Form), step(2, StepType::Review)];
        let rows: Vec<_> = steps.iter().map(|s| row(s, ProgressStatus::Completed)).collect();
        let summary = aggregate(&steps, &rows);
        assert!(summary.current_step.is_none());
        assert_eq!(summary.percentage, 100.0);
    }

    #[test]
    fn completed_rows_of_inactive_steps_do_not_count() {
        let mut retired = step(1, StepType::Form);
        retired.is_active = false;
        let live = step(2, StepType::Form);
        let rows = vec![row(&retired, ProgressStatus::Completed)];
        let summary = aggregate(&[retired, live], &rows);
        assert_eq!(summary.completed_count, 0);
        assert_eq!(summary.total_count, 1);
    }

    #[test]
    fn percentage_never_drops_as_steps_complete() {
        let steps: Vec<_> = (1..=4).map(|i| step(i, StepType::Form)).collect();
        let mut rows = Vec::new();
        let mut last = 0.0;
        for s in &steps {
            rows.push(row(s, ProgressStatus::Pending));
            let pending = aggregate(&steps, &rows).percentage;
            assert!(pending >= last);
            rows.last_mut().unwrap().status = ProgressStatus::Completed;
            let done = aggregate(&steps, &rows).percentage;
            assert!(done >= pending);
            last = done;
        }
        assert_eq!(last, 100.0);
    }

    #[test]
    fn student_badges_follow_completion_buckets() {
        let steps: Vec<_> = (1..=4).map(|i| step(i, StepType::Form)).collect();
        let mut rows: Vec<_> = steps.iter().map(|s| row(s, ProgressStatus::InProgress)).collect();

        assert_eq!(student_summary(&[]).badge, StudentBadge::NotStarted);
        assert_eq!(student_summary(&rows).badge, StudentBadge::NotStarted);

        rows[0].status = ProgressStatus::Completed;
        assert_eq!(student_summary(&rows).badge, StudentBadge::InProgress);

        rows[1].status = ProgressStatus::Completed;
        rows[2].status = ProgressStatus::Completed;
        let out = student_summary(&rows);
        assert_eq!(out.badge, StudentBadge::AlmostDone);
        assert_eq!(out.summary, "3/4 steps completed");

        rows[3].status = ProgressStatus::Completed;
        assert_eq!(student_summary(&rows).badge, StudentBadge::Done);
    }
}
