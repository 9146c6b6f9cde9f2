// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Outbound email and SMS.
//!
//! Transports sit behind the [`Mailer`] and [`SmsGateway`] traits. The
//! services on top record every message in the database, and
//! [`CaseNotifier`] fans case events out over all channels.

pub mod email_service;
pub mod mailer;
pub mod notifier;
pub mod sms_gateway;
pub mod sms_service;

pub use email_service::EmailService;
pub use mailer::{LogMailer, MailError, Mailer, MockMailer, OutgoingEmail, SmtpMailer, SmtpSettings};
pub use notifier::{CaseNotifier, NotificationOutcome};
pub use sms_gateway::{DisabledSmsGateway, HttpSmsGateway, MockSmsGateway, SmsError, SmsGateway};
pub use sms_service::{BulkSmsResult, BulkStatus, SmsService, normalize_phone};
