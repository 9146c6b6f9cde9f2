// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-app notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

crm_enum! {
    pub enum NotificationType {
        CaseAssigned => ("case_assigned", "Case Assigned"),
        CaseUpdated => ("case_updated", "Case Updated"),
        CaseEscalated => ("case_escalated", "Case Escalated"),
        EmailReceived => ("email_received", "Email Received"),
        TaskDue => ("task_due", "Task Due"),
        MeetingReminder => ("meeting_reminder", "Meeting Reminder"),
        #[default]
        System => ("system", "System Notification"),
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Notification {
    pub id: i64,
    #[sqlx(try_from = "String")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub recipient_id: i64,
    pub is_read: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewNotification {
    #[serde(default)]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub recipient_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationFilter {
    pub notification_type: Option<NotificationType>,
    pub is_read: Option<bool>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}
