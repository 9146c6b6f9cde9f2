// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Dispatches due meeting reminders.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use super::{env_flag, env_u64};
use crate::db;
use crate::messaging::{EmailService, SmsService};
use crate::models::{Meeting, MeetingReminder, NewNotification, NotificationType, ReminderType};

#[derive(Debug, Clone)]
pub struct ReminderWorkerConfig {
    pub enabled: bool,
    pub poll_interval: Duration,
    pub batch_size: i64,
}

impl Default for ReminderWorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval: Duration::from_secs(60),
            batch_size: 200,
        }
    }
}

impl ReminderWorkerConfig {
    /// Environment variables:
    /// - `MINT_CRM_REMINDER_ENABLED` (default: true)
    /// - `MINT_CRM_REMINDER_INTERVAL_SECS` (default: 60)
    pub fn from_env() -> Self {
        Self {
            enabled: env_flag("MINT_CRM_REMINDER_ENABLED", true),
            poll_interval: Duration::from_secs(env_u64("MINT_CRM_REMINDER_INTERVAL_SECS", 60)),
            ..Default::default()
        }
    }
}

pub fn reminder_subject(meeting: &Meeting) -> String {
    format!("Reminder: {}", meeting.title)
}

/// Body shared by every reminder channel.
pub fn reminder_text(meeting: &Meeting, now: DateTime<Utc>) -> String {
    let minutes = (meeting.start_time - now).num_minutes().max(0);
    let mut text = if minutes == 0 {
        format!("Your meeting \"{}\" is starting now", meeting.title)
    } else {
        format!(
            "Your meeting \"{}\" starts in {} minutes ({} UTC)",
            meeting.title,
            minutes,
            meeting.start_time.format("%Y-%m-%d %H:%M")
        )
    };
    if !meeting.location.trim().is_empty() {
        text.push_str(&format!(". Location: {}", meeting.location.trim()));
    }
    if !meeting.meeting_url.trim().is_empty() {
        text.push_str(&format!(". Join: {}", meeting.meeting_url.trim()));
    }
    text.push('.');
    text
}

pub struct ReminderWorker {
    pool: PgPool,
    emails: EmailService,
    sms: SmsService,
    config: ReminderWorkerConfig,
    shutdown: Arc<Notify>,
}

impl ReminderWorker {
    pub fn new(
        pool: PgPool,
        emails: EmailService,
        sms: SmsService,
        config: ReminderWorkerConfig,
    ) -> Self {
        Self {
            pool,
            emails,
            sms,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    pub async fn run(&self) {
        if !self.config.enabled {
            info!("Meeting reminder worker disabled");
            return;
        }

        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Meeting reminder worker started"
        );

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Meeting reminder worker received shutdown signal");
                    break;
                }

                _ = tokio::time::sleep(self.config.poll_interval) => {
                    if let Err(e) = self.dispatch_due(Utc::now()).await {
                        error!(error = %e, "Failed to dispatch meeting reminders");
                    }
                }
            }
        }

        info!("Meeting reminder worker stopped");
    }

    /// Send every unsent reminder scheduled at or before `now` and mark it
    /// sent. Reminders whose meeting or user vanished are marked sent too so
    /// they are not retried forever.
    pub async fn dispatch_due(&self, now: DateTime<Utc>) -> crate::Result<usize> {
        let due = db::meetings::list_due_reminders(&self.pool, now, self.config.batch_size).await?;
        if due.is_empty() {
            debug!("No meeting reminders due");
            return Ok(0);
        }

        let mut sent = 0;
        for reminder in &due {
            if let Err(e) = self.dispatch(reminder, now).await {
                warn!(reminder_id = reminder.id, error = %e, "Meeting reminder delivery failed");
            } else {
                sent += 1;
            }
            db::meetings::mark_reminder_sent(&self.pool, reminder.id).await?;
        }

        info!(due = due.len(), sent, "Meeting reminders dispatched");
        Ok(sent)
    }

    async fn dispatch(&self, reminder: &MeetingReminder, now: DateTime<Utc>) -> crate::Result<()> {
        let meeting = db::meetings::get_meeting(&self.pool, reminder.meeting_id)
            .await?
            .ok_or(crate::Error::NotFound("Meeting"))?;
        let user = db::users::get_user(&self.pool, reminder.user_id)
            .await?
            .ok_or(crate::Error::NotFound("User"))?;
        let text = reminder_text(&meeting, now);

        match reminder.reminder_type {
            ReminderType::Email => {
                self.emails
                    .send_system_email(
                        &user.email,
                        &reminder_subject(&meeting),
                        &text,
                        "",
                        meeting.case_id,
                        Some(user.id),
                    )
                    .await?;
            }
            ReminderType::Sms => {
                if self
                    .sms
                    .send_sms_to_user(&user, &text, meeting.case_id)
                    .await
                    .is_none()
                {
                    return Err(crate::Error::Other("SMS reminder not sent".into()));
                }
            }
            ReminderType::Push | ReminderType::Calendar => {
                db::notifications::create_notification(
                    &self.pool,
                    &NewNotification {
                        notification_type: NotificationType::MeetingReminder,
                        title: reminder_subject(&meeting),
                        message: text,
                        recipient_id: user.id,
                    },
                )
                .await?;
            }
        }

        debug!(
            reminder_id = reminder.id,
            meeting_id = meeting.id,
            user_id = user.id,
            reminder_type = reminder.reminder_type.as_str(),
            "Meeting reminder sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LocationType, MeetingStatus, MeetingType, Priority};
    use chrono::TimeZone;

    fn meeting(start: DateTime<Utc>) -> Meeting {
        Meeting {
            id: 1,
            title: "Quarterly review".into(),
            description: String::new(),
            meeting_type: MeetingType::Review,
            status: MeetingStatus::Scheduled,
            priority: Priority::Medium,
            start_time: start,
            end_time: start + chrono::Duration::hours(1),
            timezone: "UTC".into(),
            all_day: false,
            location: "Room 4".into(),
            location_type: LocationType::Physical,
            meeting_url: String::new(),
            organizer_id: 1,
            category_id: None,
            case_id: None,
            contact_id: None,
            company_id: None,
            is_recurring: false,
            recurrence_rule: serde_json::json!({}),
            parent_meeting_id: None,
            reminder_minutes: 15,
            send_reminders: true,
            agenda: String::new(),
            notes: String::new(),
            outcome: String::new(),
            is_active: true,
            is_private: false,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn test_reminder_text() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let m = meeting(start);
        assert_eq!(
            reminder_text(&m, start - chrono::Duration::minutes(15)),
            "Your meeting \"Quarterly review\" starts in 15 minutes (2025-03-01 10:00 UTC). Location: Room 4."
        );
        assert_eq!(
            reminder_text(&m, start + chrono::Duration::minutes(2)),
            "Your meeting \"Quarterly review\" is starting now. Location: Room 4."
        );
        assert_eq!(reminder_subject(&m), "Reminder: Quarterly review");
    }

    #[test]
    fn test_config_default() {
        let config = ReminderWorkerConfig::default();
        assert!(config.enabled);
        assert_eq!(config.poll_interval, Duration::from_secs(60));
    }
}
