// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP handlers, one module per resource family.
//!
//! Handlers stay thin: they authorise, call into `mint_crm_core` and shape
//! the JSON. List endpoints share [`PageParams`] and [`Paginated`].

pub mod cases;
pub mod contacts;
pub mod documents;
pub mod emails;
pub mod meetings;
pub mod notifications;
pub mod reports;
pub mod sms;
pub mod tasks;
pub mod users;

use axum::{Json, extract::State, http::StatusCode};
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use mint_crm_core::db::{self, PageRequest};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `?page=&page_size=` on list endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl PageParams {
    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.page, self.page_size)
    }
}

/// A page of results.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub count: i64,
    pub page: i64,
    pub page_size: i64,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn new(count: i64, page: PageRequest, results: Vec<T>) -> Self {
        Self {
            count,
            page: page.page_number(),
            page_size: page.limit,
            results,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            count: self.count,
            page: self.page,
            page_size: self.page_size,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

/// `?days=` on statistics endpoints.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DaysParam {
    pub days: Option<i64>,
}

impl DaysParam {
    pub fn days(&self) -> i64 {
        self.days.unwrap_or(30).clamp(1, 3650)
    }

    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.days())
    }
}

/// `{"message": ...}` body for actions that only acknowledge.
pub fn message(text: impl Into<String>) -> Json<Value> {
    Json(json!({ "message": text.into() }))
}

/// Parse a JSON body that callers may omit entirely.
pub fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))
}

/// Empty 204 for successful deletes.
pub fn no_content() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    if db::health_check(&state.pool).await {
        (StatusCode::OK, Json(json!({ "status": "ok" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable" })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginated_shape() {
        let page = PageRequest::new(Some(2), Some(5));
        let body = serde_json::to_value(Paginated::new(12, page, vec![6, 7, 8, 9, 10])).unwrap();
        assert_eq!(
            body,
            json!({ "count": 12, "page": 2, "page_size": 5, "results": [6, 7, 8, 9, 10] })
        );
    }

    #[test]
    fn test_days_param_defaults_and_clamps() {
        assert_eq!(DaysParam { days: None }.days(), 30);
        assert_eq!(DaysParam { days: Some(0) }.days(), 1);
        assert_eq!(DaysParam { days: Some(7) }.days(), 7);
    }

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Body {
        reason: Option<String>,
    }

    #[test]
    fn test_optional_json() {
        let empty: Body = optional_json(&Bytes::new()).unwrap();
        assert_eq!(empty, Body::default());
        let parsed: Body = optional_json(&Bytes::from_static(br#"{"reason":"late"}"#)).unwrap();
        assert_eq!(parsed.reason.as_deref(), Some("late"));
        assert!(optional_json::<Body>(&Bytes::from_static(b"{oops")).is_err());
    }
}
