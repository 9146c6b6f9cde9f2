// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use mint_crm_core::messaging::{SmtpSettings, sms_service};

/// MINT CRM server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// HTTP listen address
    pub http_addr: SocketAddr,
    /// HS256 secret for access and refresh tokens
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub db_max_connections: u32,
    /// Allowed CORS origins; empty means any origin.
    pub cors_origins: Vec<String>,
    /// Where uploaded documents are stored
    pub media_dir: PathBuf,
    /// Default outbound SMTP server; `None` logs mail instead of sending it.
    pub smtp: Option<SmtpSettings>,
    pub default_from_email: String,
    /// SMS gateway base URL; `None` disables SMS.
    pub sms_base_url: Option<String>,
    pub sms_from_number: String,
    pub sms_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `MINT_CRM_DATABASE_URL` (or `DATABASE_URL`): PostgreSQL connection string
    /// - `MINT_CRM_JWT_SECRET`: token signing secret
    ///
    /// Optional (with defaults):
    /// - `MINT_CRM_HTTP_PORT`: HTTP port (default: 8000)
    /// - `MINT_CRM_ACCESS_TOKEN_TTL_SECS` (default: 3600)
    /// - `MINT_CRM_REFRESH_TOKEN_TTL_SECS` (default: 604800)
    /// - `MINT_CRM_DB_MAX_CONNECTIONS` (default: 10)
    /// - `MINT_CRM_CORS_ORIGINS`: comma separated origins (default: `*`)
    /// - `MINT_CRM_MEDIA_DIR` (default: `.media`)
    /// - `SMTP_HOST`, `SMTP_PORT` (587), `SMTP_USERNAME`, `SMTP_PASSWORD`, `SMTP_USE_TLS` (true)
    /// - `DEFAULT_FROM_EMAIL` (default: `noreply@mintcrm.local`)
    /// - `BASE_SMS_URL`, `DEFAULT_SMS_FROM_NUMBER` (`SYSTEM`), `SMS_TIMEOUT_SECS` (10)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("MINT_CRM_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .map_err(|_| ConfigError::Missing("MINT_CRM_DATABASE_URL"))?;

        let jwt_secret = std::env::var("MINT_CRM_JWT_SECRET")
            .map_err(|_| ConfigError::Missing("MINT_CRM_JWT_SECRET"))?;
        if jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "MINT_CRM_JWT_SECRET",
                "must not be empty",
            ));
        }

        let http_port: u16 = parse_var("MINT_CRM_HTTP_PORT", 8000, "must be a valid port number")?;
        let access_ttl: u64 = parse_var(
            "MINT_CRM_ACCESS_TOKEN_TTL_SECS",
            3600,
            "must be a positive integer",
        )?;
        let refresh_ttl: u64 = parse_var(
            "MINT_CRM_REFRESH_TOKEN_TTL_SECS",
            604_800,
            "must be a positive integer",
        )?;
        let db_max_connections: u32 = parse_var(
            "MINT_CRM_DB_MAX_CONNECTIONS",
            10,
            "must be a positive integer",
        )?;

        let cors_origins = parse_origins(
            &std::env::var("MINT_CRM_CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()),
        );

        let media_dir = PathBuf::from(
            std::env::var("MINT_CRM_MEDIA_DIR").unwrap_or_else(|_| ".media".to_string()),
        );

        let smtp = match non_empty_var("SMTP_HOST") {
            Some(host) => Some(SmtpSettings {
                host,
                port: parse_var("SMTP_PORT", 587, "must be a valid port number")?,
                username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
                password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
                use_tls: parse_bool("SMTP_USE_TLS", true)?,
                use_ssl: false,
                timeout: Duration::from_secs(30),
            }),
            None => None,
        };

        Ok(Self {
            database_url,
            http_addr: SocketAddr::from(([0, 0, 0, 0], http_port)),
            jwt_secret,
            access_token_ttl: Duration::from_secs(access_ttl),
            refresh_token_ttl: Duration::from_secs(refresh_ttl),
            db_max_connections,
            cors_origins,
            media_dir,
            smtp,
            default_from_email: non_empty_var("DEFAULT_FROM_EMAIL")
                .unwrap_or_else(|| "noreply@mintcrm.local".to_string()),
            sms_base_url: non_empty_var("BASE_SMS_URL"),
            sms_from_number: non_empty_var("DEFAULT_SMS_FROM_NUMBER")
                .unwrap_or_else(|| sms_service::DEFAULT_FROM_NUMBER.to_string()),
            sms_timeout: Duration::from_secs(parse_var(
                "SMS_TIMEOUT_SECS",
                10,
                "must be a positive integer",
            )?),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(
    key: &'static str,
    default: T,
    reason: &'static str,
) -> Result<T, ConfigError> {
    match non_empty_var(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid(key, reason)),
        None => Ok(default),
    }
}

fn parse_bool(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match non_empty_var(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(_) => Err(ConfigError::Invalid(key, "must be true or false")),
    }
}

/// `*` (or nothing) allows any origin.
fn parse_origins(raw: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect();
    if origins.iter().any(|o| o == "*") {
        Vec::new()
    } else {
        origins
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
