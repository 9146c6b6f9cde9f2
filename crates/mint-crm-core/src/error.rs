// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for mint-crm-core.

use thiserror::Error;

/// Core errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Applying migrations failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Outbound email could not be built or delivered.
    #[error("Mail error: {0}")]
    Mail(#[from] crate::messaging::mailer::MailError),

    /// The SMS gateway rejected or failed the request.
    #[error("SMS error: {0}")]
    Sms(#[from] crate::messaging::sms_gateway::SmsError),

    /// A referenced record does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Input failed a business rule.
    #[error("{0}")]
    Validation(String),

    /// The operation conflicts with the current state of a record.
    #[error("{0}")]
    Conflict(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type using the core Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a validation failure.
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }
}
