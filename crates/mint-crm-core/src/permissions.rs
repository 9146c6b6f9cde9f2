// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Role-based visibility rules.
//!
//! | Role | Cases | SMS | Meetings |
//! |------|-------|-----|----------|
//! | admin / manager | all | all | all |
//! | agent | assigned to them or unassigned | their own or on their cases | organised, attending or public |
//! | customer | cases of the contact linked to them | their own | organised, attending or public |
//!
//! Scopes are passed into the list queries in [`crate::db`] as a mode string
//! and a user id so that filtering happens in SQL.

use crate::models::User;

/// Which cases a user can see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseScope {
    All,
    /// Assigned to this agent or unassigned.
    Agent(i64),
    /// Cases whose customer contact is linked to this user.
    Customer(i64),
}

impl CaseScope {
    pub fn for_user(user: &User) -> Self {
        if user.is_manager() {
            CaseScope::All
        } else if user.is_agent() {
            CaseScope::Agent(user.id)
        } else {
            CaseScope::Customer(user.id)
        }
    }

    pub(crate) fn mode(&self) -> &'static str {
        match self {
            CaseScope::All => "all",
            CaseScope::Agent(_) => "agent",
            CaseScope::Customer(_) => "customer",
        }
    }

    pub(crate) fn user_id(&self) -> Option<i64> {
        match self {
            CaseScope::All => None,
            CaseScope::Agent(id) | CaseScope::Customer(id) => Some(*id),
        }
    }
}

/// Which SMS records a user can see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsScope {
    All,
    /// Sent by this user or attached to a case assigned to them.
    Agent(i64),
    /// Sent by this user.
    Own(i64),
}

impl SmsScope {
    pub fn for_user(user: &User) -> Self {
        if user.is_manager() {
            SmsScope::All
        } else if user.is_agent() {
            SmsScope::Agent(user.id)
        } else {
            SmsScope::Own(user.id)
        }
    }

    pub(crate) fn mode(&self) -> &'static str {
        match self {
            SmsScope::All => "all",
            SmsScope::Agent(_) => "agent",
            SmsScope::Own(_) => "own",
        }
    }

    pub(crate) fn user_id(&self) -> Option<i64> {
        match self {
            SmsScope::All => None,
            SmsScope::Agent(id) | SmsScope::Own(id) => Some(*id),
        }
    }
}

/// Meetings are hidden from non-managers only when private and not theirs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingScope {
    All,
    Member(i64),
}

impl MeetingScope {
    pub fn for_user(user: &User) -> Self {
        if user.is_manager() {
            MeetingScope::All
        } else {
            MeetingScope::Member(user.id)
        }
    }

    pub(crate) fn user_id(&self) -> Option<i64> {
        match self {
            MeetingScope::All => None,
            MeetingScope::Member(id) => Some(*id),
        }
    }
}

/// A user may edit or delete their own account; admins may edit anyone.
pub fn can_modify_user(actor: &User, target_id: i64) -> bool {
    actor.is_admin() || actor.id == target_id
}
