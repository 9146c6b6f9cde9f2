// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! MINT CRM core
//!
//! Domain model, PostgreSQL persistence and business services for the MINT
//! CRM backend. The HTTP layer lives in `mint-crm-server`; everything here is
//! usable without it (the admin CLI and the background workers call straight
//! into this crate).
//!
//! # Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`models`] | records, inputs, filters and choice enums |
//! | [`db`] | free functions over a `PgPool`, one submodule per table family |
//! | [`services`] | case numbering, SLA, assignment, escalation, email intake, template seeding |
//! | [`messaging`] | `Mailer` and `SmsGateway` seams, the email/SMS services and the case notifier |
//! | [`reports`] | report generators and JSON/CSV export |
//! | [`workers`] | escalation, email queue, email cleanup, meeting reminder and report jobs |
//! | [`permissions`] | role-based visibility scopes |
//! | [`templating`] | `{{ path }}` placeholder rendering |

pub mod db;
pub mod error;
pub mod messaging;
pub mod migrations;
pub mod models;
pub mod permissions;
pub mod reports;
pub mod services;
pub mod templating;
pub mod workers;

pub use error::{Error, Result};
