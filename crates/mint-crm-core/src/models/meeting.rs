// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Meetings, categories, attendance, reminders and reusable templates.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::Priority;

crm_enum! {
    pub enum MeetingType {
        #[default]
        Internal => ("internal", "Internal Meeting"),
        Client => ("client", "Client Meeting"),
        Sales => ("sales", "Sales Meeting"),
        Support => ("support", "Support Meeting"),
        Training => ("training", "Training Session"),
        Review => ("review", "Review Meeting"),
        Other => ("other", "Other"),
    }
}

crm_enum! {
    pub enum MeetingStatus {
        #[default]
        Scheduled => ("scheduled", "Scheduled"),
        Confirmed => ("confirmed", "Confirmed"),
        InProgress => ("in_progress", "In Progress"),
        Completed => ("completed", "Completed"),
        Cancelled => ("cancelled", "Cancelled"),
        Rescheduled => ("rescheduled", "Rescheduled"),
    }
}

crm_enum! {
    pub enum LocationType {
        Physical => ("physical", "Physical Location"),
        #[default]
        Virtual => ("virtual", "Virtual Meeting"),
        Hybrid => ("hybrid", "Hybrid"),
    }
}

crm_enum! {
    pub enum AttendanceStatus {
        #[default]
        Invited => ("invited", "Invited"),
        Accepted => ("accepted", "Accepted"),
        Declined => ("declined", "Declined"),
        Tentative => ("tentative", "Tentative"),
        Attended => ("attended", "Attended"),
        NoShow => ("no_show", "No Show"),
    }
}

impl AttendanceStatus {
    /// Statuses an attendee may pick when answering an invitation.
    pub fn is_rsvp(&self) -> bool {
        matches!(
            self,
            AttendanceStatus::Accepted | AttendanceStatus::Declined | AttendanceStatus::Tentative
        )
    }
}

crm_enum! {
    pub enum ReminderType {
        #[default]
        Email => ("email", "Email"),
        Sms => ("sms", "SMS"),
        Push => ("push", "Push Notification"),
        Calendar => ("calendar", "Calendar Reminder"),
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MeetingCategory {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub description: String,
    pub is_active: bool,
    pub created_by_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeetingCategoryInput {
    pub name: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Meeting {
    pub id: i64,
    pub title: String,
    pub description: String,
    #[sqlx(try_from = "String")]
    pub meeting_type: MeetingType,
    #[sqlx(try_from = "String")]
    pub status: MeetingStatus,
    #[sqlx(try_from = "String")]
    pub priority: Priority,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub timezone: String,
    pub all_day: bool,
    pub location: String,
    #[sqlx(try_from = "String")]
    pub location_type: LocationType,
    pub meeting_url: String,
    pub organizer_id: i64,
    pub category_id: Option<i64>,
    pub case_id: Option<i64>,
    pub contact_id: Option<i64>,
    pub company_id: Option<i64>,
    pub is_recurring: bool,
    pub recurrence_rule: serde_json::Value,
    pub parent_meeting_id: Option<i64>,
    pub reminder_minutes: i32,
    pub send_reminders: bool,
    pub agenda: String,
    pub notes: String,
    pub outcome: String,
    pub is_active: bool,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meeting {
    /// Length in minutes; all-day meetings count as a full day.
    pub fn duration_minutes(&self) -> i64 {
        if self.all_day {
            1440
        } else {
            (self.end_time - self.start_time).num_minutes()
        }
    }

    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.end_time < now
    }

    pub fn is_ongoing(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now <= self.end_time
    }

    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.start_time > now
    }

    pub fn is_today(&self, now: DateTime<Utc>) -> bool {
        self.start_time.date_naive() == now.date_naive()
    }

    /// When reminders for this meeting fire.
    pub fn reminder_time(&self) -> DateTime<Utc> {
        self.start_time - Duration::minutes(i64::from(self.reminder_minutes))
    }
}

/// Meeting plus the computed flags returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct MeetingView {
    #[serde(flatten)]
    pub meeting: Meeting,
    pub duration_minutes: i64,
    pub is_past: bool,
    pub is_ongoing: bool,
    pub is_upcoming: bool,
    pub is_today: bool,
    pub attendee_ids: Vec<i64>,
}

impl MeetingView {
    pub fn new(meeting: Meeting, attendee_ids: Vec<i64>, now: DateTime<Utc>) -> Self {
        Self {
            duration_minutes: meeting.duration_minutes(),
            is_past: meeting.is_past(now),
            is_ongoing: meeting.is_ongoing(now),
            is_upcoming: meeting.is_upcoming(now),
            is_today: meeting.is_today(now),
            meeting,
            attendee_ids,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeetingInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub meeting_type: Option<MeetingType>,
    pub status: Option<MeetingStatus>,
    pub priority: Option<Priority>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
    pub all_day: Option<bool>,
    pub location: Option<String>,
    pub location_type: Option<LocationType>,
    pub meeting_url: Option<String>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub category_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub case_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub contact_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub company_id: Option<Option<i64>>,
    pub is_recurring: Option<bool>,
    pub recurrence_rule: Option<serde_json::Value>,
    pub parent_meeting_id: Option<i64>,
    pub reminder_minutes: Option<i32>,
    pub send_reminders: Option<bool>,
    pub agenda: Option<String>,
    pub notes: Option<String>,
    pub outcome: Option<String>,
    pub is_active: Option<bool>,
    pub is_private: Option<bool>,
    pub attendee_ids: Option<Vec<i64>>,
}

impl MeetingInput {
    /// True when the update changes when or to whom reminders go.
    pub fn touches_reminders(&self) -> bool {
        self.start_time.is_some()
            || self.reminder_minutes.is_some()
            || self.send_reminders.is_some()
            || self.attendee_ids.is_some()
    }

    /// Checks the time window when both ends are known.
    pub fn validate_window(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> crate::Result<()> {
        if end <= start {
            return Err(crate::Error::validation(
                "End time must be after start time",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeetingFilter {
    pub meeting_type: Option<MeetingType>,
    pub status: Option<MeetingStatus>,
    pub priority: Option<Priority>,
    pub category: Option<i64>,
    pub organizer: Option<i64>,
    pub case: Option<i64>,
    pub contact: Option<i64>,
    pub company: Option<i64>,
    pub attendee: Option<i64>,
    pub start_after: Option<DateTime<Utc>>,
    pub start_before: Option<DateTime<Utc>>,
    pub end_before: Option<DateTime<Utc>>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MeetingAttendance {
    pub id: i64,
    pub meeting_id: i64,
    pub user_id: i64,
    #[sqlx(try_from = "String")]
    pub status: AttendanceStatus,
    pub response_time: Option<DateTime<Utc>>,
    pub joined_at: Option<DateTime<Utc>>,
    pub left_at: Option<DateTime<Utc>>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MeetingReminder {
    pub id: i64,
    pub meeting_id: i64,
    pub user_id: i64,
    #[sqlx(try_from = "String")]
    pub reminder_type: ReminderType,
    pub scheduled_for: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub is_sent: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MeetingTemplate {
    pub id: i64,
    pub name: String,
    pub description: String,
    #[sqlx(try_from = "String")]
    pub meeting_type: MeetingType,
    pub duration_minutes: i32,
    pub default_agenda: String,
    pub default_location: String,
    #[sqlx(try_from = "String")]
    pub default_location_type: LocationType,
    pub category_id: Option<i64>,
    pub is_active: bool,
    pub created_by_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeetingTemplateInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub meeting_type: Option<MeetingType>,
    pub duration_minutes: Option<i32>,
    pub default_agenda: Option<String>,
    pub default_location: Option<String>,
    pub default_location_type: Option<LocationType>,
    pub category_id: Option<i64>,
    pub is_active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn meeting(start: DateTime<Utc>, minutes: i64) -> Meeting {
        Meeting {
            id: 1,
            title: "Weekly sync".into(),
            description: String::new(),
            meeting_type: MeetingType::Internal,
            status: MeetingStatus::Scheduled,
            priority: Priority::Medium,
            start_time: start,
            end_time: start + Duration::minutes(minutes),
            timezone: "UTC".into(),
            all_day: false,
            location: String::new(),
            location_type: LocationType::Virtual,
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
    fn test_duration_and_all_day() {
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        let mut m = meeting(start, 45);
        assert_eq!(m.duration_minutes(), 45);
        m.all_day = true;
        assert_eq!(m.duration_minutes(), 1440);
    }

    #[test]
    fn test_time_flags() {
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        let m = meeting(start, 60);

        let before = start - Duration::hours(1);
        assert!(m.is_upcoming(before) && !m.is_ongoing(before) && !m.is_past(before));

        let during = start + Duration::minutes(30);
        assert!(m.is_ongoing(during) && !m.is_upcoming(during));

        let after = start + Duration::hours(2);
        assert!(m.is_past(after) && m.is_today(after));

        assert!(!m.is_today(start + Duration::days(1)));
    }

    #[test]
    fn test_reminder_time() {
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        let m = meeting(start, 60);
        assert_eq!(m.reminder_time(), start - Duration::minutes(15));
    }

    #[test]
    fn test_window_validation() {
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        assert!(MeetingInput::validate_window(start, start).is_err());
        assert!(MeetingInput::validate_window(start, start + Duration::minutes(1)).is_ok());
    }

    #[test]
    fn test_rsvp_statuses() {
        assert!(AttendanceStatus::Accepted.is_rsvp());
        assert!(AttendanceStatus::Tentative.is_rsvp());
        assert!(!AttendanceStatus::Attended.is_rsvp());
    }
}
