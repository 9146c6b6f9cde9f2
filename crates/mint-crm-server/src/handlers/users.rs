// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tokens, sign-up and user accounts.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use mint_crm_core::db;
use mint_crm_core::models::{NewUser, User, UserFilter, UserPatch, UserRole};
use mint_crm_core::permissions::can_modify_user;

use super::{PageParams, Paginated, message, no_content};
use crate::auth::{CurrentUser, TokenType, hash_password, verify_password};
use crate::error::{ApiError, ApiResult};
use crate::extract::{AppJson, AppQuery};
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenUser {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    pub user: TokenUser,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub role: Option<UserRole>,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub department: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub new_password_confirm: String,
}

fn validate_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> ApiResult<()> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ApiError::bad_request("Enter a valid email address")),
    }
}

/// `POST /api/token/`
pub async fn obtain_token(
    State(state): State<AppState>,
    AppJson(body): AppJson<TokenRequest>,
) -> ApiResult<Json<TokenPair>> {
    let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());

    let user = db::users::get_user_by_email(&state.pool, &body.email)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(invalid)?;
    if !verify_password(&body.password, &user.password_hash) {
        tracing::info!(user_id = user.id, "Rejected login with wrong password");
        return Err(invalid());
    }

    db::users::touch_last_login(&state.pool, user.id).await?;
    let access = state.tokens.issue(&user, TokenType::Access)?;
    let refresh = state.tokens.issue(&user, TokenType::Refresh)?;
    tracing::info!(user_id = user.id, "User logged in");

    Ok(Json(TokenPair {
        access,
        refresh,
        user: TokenUser {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
        },
    }))
}

/// `POST /api/token/refresh/`
pub async fn refresh_token(
    State(state): State<AppState>,
    AppJson(body): AppJson<RefreshRequest>,
) -> ApiResult<Json<Value>> {
    let claims = state.tokens.verify(&body.refresh, TokenType::Refresh)?;
    let user = db::users::get_user(&state.pool, claims.user_id()?)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::Unauthorized("User not found or inactive".to_string()))?;
    let access = state.tokens.issue(&user, TokenType::Access)?;
    Ok(Json(json!({ "access": access })))
}

/// `POST /api/users/` and `POST /api/users/signup/`
pub async fn signup(
    State(state): State<AppState>,
    AppJson(body): AppJson<SignupRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    if body.password != body.password_confirm {
        return Err(ApiError::bad_request("Passwords don't match"));
    }
    validate_email(&body.email)?;
    validate_password(&body.password)?;

    // Public sign-up never grants administrator rights.
    let role = body.role.unwrap_or_default();
    if role == UserRole::Admin {
        return Err(ApiError::bad_request("Cannot sign up as an administrator"));
    }

    if db::users::get_user_by_email(&state.pool, &body.email)
        .await?
        .is_some()
    {
        return Err(ApiError::bad_request("A user with this email already exists"));
    }

    let user = db::users::create_user(
        &state.pool,
        &NewUser {
            email: body.email,
            password_hash: hash_password(&body.password)?,
            first_name: body.first_name,
            last_name: body.last_name,
            role,
            company: body.company,
            phone: body.phone,
            department: body.department,
            is_active: true,
        },
    )
    .await?;

    tracing::info!(user_id = user.id, role = user.role.as_str(), "User signed up");
    Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /api/users/`
pub async fn list_users(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
    AppQuery(filter): AppQuery<UserFilter>,
) -> ApiResult<Json<Paginated<User>>> {
    let page = page.request();
    let count = db::users::count_users(&state.pool, &filter).await?;
    let users = db::users::list_users(&state.pool, &filter, page).await?;
    Ok(Json(Paginated::new(count, page, users)))
}

/// `GET /api/users/{id}/`
pub async fn get_user(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<User>> {
    let user = db::users::get_user(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Ok(Json(user))
}

/// `PUT/PATCH /api/users/{id}/`
///
/// Users may edit their own profile; role and activation are admin-only.
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<i64>,
    AppJson(patch): AppJson<UserPatch>,
) -> ApiResult<Json<User>> {
    if !can_modify_user(&actor, id) {
        return Err(ApiError::forbidden());
    }
    if !actor.is_admin() && (patch.role.is_some() || patch.is_active.is_some()) {
        return Err(ApiError::forbidden());
    }
    if let Some(email) = &patch.email {
        validate_email(email)?;
        if let Some(other) = db::users::get_user_by_email(&state.pool, email).await? {
            if other.id != id {
                return Err(ApiError::bad_request("A user with this email already exists"));
            }
        }
    }

    let user = db::users::update_user(&state.pool, id, &patch)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Ok(Json(user))
}

/// `DELETE /api/users/{id}/`
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !can_modify_user(&actor, id) {
        return Err(ApiError::forbidden());
    }
    if !db::users::delete_user(&state.pool, id).await? {
        return Err(ApiError::not_found("User"));
    }
    tracing::info!(user_id = id, actor_id = actor.id, "User deleted");
    Ok(no_content())
}

/// `POST /api/users/change_password/`
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(body): AppJson<ChangePasswordRequest>,
) -> ApiResult<Json<Value>> {
    if !verify_password(&body.old_password, &user.password_hash) {
        return Err(ApiError::bad_request("Invalid old password"));
    }
    if body.new_password != body.new_password_confirm {
        return Err(ApiError::bad_request("New passwords don't match"));
    }
    validate_password(&body.new_password)?;

    db::users::set_password_hash(&state.pool, user.id, &hash_password(&body.new_password)?)
        .await?;
    tracing::info!(user_id = user.id, "Password changed");
    Ok(message("Password changed successfully"))
}

/// `GET /api/users/me/`
pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

/// `GET /api/users/agents/`
pub async fn agents(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> ApiResult<Json<Vec<User>>> {
    let users = db::users::list_active_with_roles(
        &state.pool,
        &[UserRole::Agent, UserRole::Manager, UserRole::Admin],
    )
    .await?;
    Ok(Json(users))
}

/// `GET /api/users/managers/`
pub async fn managers(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> ApiResult<Json<Vec<User>>> {
    let users =
        db::users::list_active_with_roles(&state.pool, &[UserRole::Manager, UserRole::Admin])
            .await?;
    Ok(Json(users))
}
