// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Business operations composed from data access and messaging.

pub mod assignment;
pub mod case_numbers;
pub mod case_updates;
pub mod escalation;
pub mod intake;
pub mod sla;
pub mod templates;

pub use assignment::{AssignmentOutcome, assign_case, auto_assign};
pub use case_updates::{CaseUpdateOutcome, update_priority, update_status};
pub use escalation::{escalate_case, escalate_overdue_cases};
pub use intake::{InboundEmail, create_case_from_email};
pub use sla::SlaReport;
