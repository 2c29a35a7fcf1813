//! HR task statuses, priorities and the allowed status moves.

use chrono::NaiveDate;

use crate::errors::{StaffroomError, StaffroomResult};

text_enum! {
    pub enum TaskStatus {
        Open => "open",
        InProgress => "in_progress",
        Done => "done",
        Cancelled => "cancelled",
    }
}

text_enum! {
    pub enum TaskPriority {
        Low => "low",
        Normal => "normal",
        High => "high",
        Urgent => "urgent",
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Normal
    }
}

impl TaskStatus {
    pub fn can_move_to(&self, target: TaskStatus) -> bool {
        use TaskStatus::*;

        matches!(
            (self, target),
            (Open, InProgress | Done | Cancelled)
                | (InProgress, Open | Done | Cancelled)
                | (Done, Open)
                | (Cancelled, Open)
        )
    }

    pub fn transition(self, target: TaskStatus) -> StaffroomResult<TaskStatus> {
        if self.can_move_to(target) {
            Ok(target)
        } else {
            Err(StaffroomError::InvalidTransition(format!(
                "task cannot move from {self} to {target}"
            )))
        }
    }

    /// Still waiting on someone.
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Open | TaskStatus::InProgress)
    }
}

/// Whether an active task with this due date is late on `today`.
pub fn is_overdue(status: TaskStatus, due_date: Option<NaiveDate>, today: NaiveDate) -> bool {
    status.is_active() && due_date.is_some_and(|due| due < today)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_moves() {
        use TaskStatus::*;

        assert!(Open.can_move_to(InProgress));
        assert!(Open.can_move_to(Done));
        assert!(InProgress.can_move_to(Open));
        assert!(Done.can_move_to(Open));
        assert!(Cancelled.can_move_to(Open));

        assert!(!Done.can_move_to(Cancelled));
        assert!(!Cancelled.can_move_to(Done));
        assert!(!Open.can_move_to(Open));
    }

    #[test]
    fn transition_reports_both_ends() {
        let err = TaskStatus::Done.transition(TaskStatus::InProgress).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("done") && msg.contains("in_progress"));
    }

    #[test]
    fn overdue_only_counts_active_tasks() {
        let today = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        let yesterday = today.pred_opt().unwrap();

        assert!(is_overdue(TaskStatus::Open, Some(yesterday), today));
        assert!(is_overdue(TaskStatus::InProgress, Some(yesterday), today));
        assert!(!is_overdue(TaskStatus::Done, Some(yesterday), today));
        assert!(!is_overdue(TaskStatus::Open, Some(today), today));
        assert!(!is_overdue(TaskStatus::Open, None, today));
    }

    #[test]
    fn default_priority_is_normal() {
        assert_eq!(TaskPriority::default(), TaskPriority::Normal);
        assert_eq!("urgent".parse::<TaskPriority>().unwrap(), TaskPriority::Urgent);
    }
}
