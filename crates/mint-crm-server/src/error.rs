// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! API error type and its JSON rendering.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn forbidden() -> Self {
        ApiError::Forbidden("You do not have permission to perform this action.".to_string())
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(what.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<mint_crm_core::Error> for ApiError {
    fn from(err: mint_crm_core::Error) -> Self {
        use mint_crm_core::Error;
        match err {
            Error::NotFound(what) => ApiError::NotFound(what.to_string()),
            Error::Validation(msg) => ApiError::BadRequest(msg),
            Error::Conflict(msg) => ApiError::Conflict(msg),
            Error::Database(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Record".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ApiError::BadRequest(unique_violation_message(db.constraint()))
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                ApiError::BadRequest("Referenced record does not exist".to_string())
            }
            sqlx::Error::Database(db) if db.is_check_violation() => {
                ApiError::BadRequest(check_violation_message(db.constraint()))
            }
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

fn unique_violation_message(constraint: Option<&str>) -> String {
    match constraint {
        Some(c) if c.contains("email") => "A record with this email already exists".to_string(),
        Some(c) if c.contains("name") => "A record with this name already exists".to_string(),
        _ => "A record with these values already exists".to_string(),
    }
}

fn check_violation_message(constraint: Option<&str>) -> String {
    match constraint {
        Some("meetings_check") => "End time must be after start time".to_string(),
        Some(c) if c.contains("message") => "Message must be at most 1600 characters".to_string(),
        Some(c) => format!("Value violates constraint {c}"),
        None => "Invalid value".to_string(),
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::bad_request("Passwords don't match").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Passwords don't match");
        assert_eq!(body["status"], 400);
    }

    #[test]
    fn test_core_error_mapping() {
        let err: ApiError = mint_crm_core::Error::NotFound("Case").into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Case not found");

        let err: ApiError = mint_crm_core::Error::validation("No agents available").into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: ApiError = mint_crm_core::Error::Conflict("busy".into()).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: ApiError = mint_crm_core::Error::Other("boom".into()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err: ApiError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
