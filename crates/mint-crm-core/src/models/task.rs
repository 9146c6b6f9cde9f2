// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! To-do items, optionally tied to a case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use super::Priority;

crm_enum! {
    pub enum TaskStatus {
        #[default]
        Pending => ("pending", "Pending"),
        InProgress => ("in_progress", "In Progress"),
        Completed => ("completed", "Completed"),
        Cancelled => ("cancelled", "Cancelled"),
    }
}

impl TaskStatus {
    pub fn is_closed(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    #[sqlx(try_from = "String")]
    pub priority: Priority,
    #[sqlx(try_from = "String")]
    pub status: TaskStatus,
    pub assigned_to_id: Option<i64>,
    pub created_by_id: i64,
    pub case_id: Option<i64>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub tags: Json<Vec<String>>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Open and past its due date.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_closed() && self.due_date.is_some_and(|due| due < now)
    }
}

/// Task with its computed overdue flag.
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub is_overdue: bool,
}

impl TaskView {
    pub fn new(task: Task, now: DateTime<Utc>) -> Self {
        Self {
            is_overdue: task.is_overdue(now),
            task,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<TaskStatus>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub assigned_to_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub case_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub assigned_to: Option<i64>,
    pub case: Option<i64>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_closed_tasks_are_never_overdue() {
        let now = Utc::now();
        let mut task = Task {
            id: 1,
            title: "Call back".into(),
            description: String::new(),
            priority: Priority::High,
            status: TaskStatus::Pending,
            assigned_to_id: None,
            created_by_id: 1,
            case_id: None,
            due_date: Some(now - Duration::hours(2)),
            completed_at: None,
            tags: Json(vec![]),
            notes: String::new(),
            created_at: now,
            updated_at: now,
        };
        assert!(task.is_overdue(now));

        task.status = TaskStatus::Completed;
        assert!(!task.is_overdue(now));

        task.status = TaskStatus::InProgress;
        task.due_date = None;
        assert!(!task.is_overdue(now));
    }
}
