// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Outbound SMS transport.
//!
//! The production gateway is a plain HTTP GET endpoint: the configured base URL
//! already carries credentials as query parameters, and the phone number and
//! message are appended.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by an [`SmsGateway`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SmsError {
    /// No gateway URL is configured.
    #[error("SMS gateway is not configured")]
    NotConfigured,

    /// The request could not be sent or timed out.
    #[error("SMS request failed: {0}")]
    Request(String),

    /// The gateway answered with a non-success status.
    #[error("SMS gateway returned HTTP {0}")]
    Status(u16),

    /// The gateway answered with something other than JSON.
    #[error("Invalid SMS gateway response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait SmsGateway: Send + Sync {
    /// Send `message` to `phone`, returning the gateway's JSON reply.
    async fn send(&self, phone: &str, message: &str) -> Result<serde_json::Value, SmsError>;
}

/// Build the request URL for one message.
pub fn request_url(base_url: &str, phone: &str, message: &str) -> String {
    format!(
        "{base_url}&phonenumber={}&message={}",
        urlencoding::encode(phone),
        urlencoding::encode(message)
    )
}

/// GET-based gateway.
#[derive(Debug, Clone)]
pub struct HttpSmsGateway {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpSmsGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    async fn send(&self, phone: &str, message: &str) -> Result<serde_json::Value, SmsError> {
        let url = request_url(&self.base_url, phone, message);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SmsError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SmsError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SmsError::Request(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| SmsError::InvalidResponse(e.to_string()))
    }
}

/// Gateway used when no base URL is configured. Every send fails with
/// [`SmsError::NotConfigured`].
#[derive(Debug, Default, Clone)]
pub struct DisabledSmsGateway;

#[async_trait]
impl SmsGateway for DisabledSmsGateway {
    async fn send(&self, phone: &str, _message: &str) -> Result<serde_json::Value, SmsError> {
        tracing::warn!(phone = %phone, "SMS gateway not configured, message not sent");
        Err(SmsError::NotConfigured)
    }
}

/// Recorded call to a [`MockSmsGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentSms {
    pub phone: String,
    pub message: String,
}

/// In-memory gateway for tests.
#[derive(Debug, Default, Clone)]
pub struct MockSmsGateway {
    sent: Arc<Mutex<Vec<SentSms>>>,
    fail: bool,
}

impl MockSmsGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentSms> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SmsGateway for MockSmsGateway {
    async fn send(&self, phone: &str, message: &str) -> Result<serde_json::Value, SmsError> {
        if self.fail {
            return Err(SmsError::Status(500));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentSms {
                phone: phone.to_string(),
                message: message.to_string(),
            });
        }
        Ok(serde_json::json!({ "status": "success" }))
    }
}
