// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Companies and contacts.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use mint_crm_core::db::{
    self,
    companies::CompanyStats,
    contacts::ContactStats,
};
use mint_crm_core::models::{
    Company, CompanyFilter, CompanyInput, Contact, ContactFilter, ContactInput,
};

use super::{PageParams, Paginated, no_content};
use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{AppJson, AppQuery};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CompanyView {
    #[serde(flatten)]
    pub company: Company,
    pub full_address: String,
}

impl From<Company> for CompanyView {
    fn from(company: Company) -> Self {
        Self {
            full_address: company.full_address(),
            company,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ContactView {
    #[serde(flatten)]
    pub contact: Contact,
    pub full_name: String,
    pub primary_phone: Option<String>,
}

impl From<Contact> for ContactView {
    fn from(contact: Contact) -> Self {
        Self {
            full_name: contact.full_name(),
            primary_phone: contact.primary_phone().map(String::from),
            contact,
        }
    }
}

async fn company_page(
    state: &AppState,
    filter: &CompanyFilter,
    page: PageParams,
) -> ApiResult<Paginated<CompanyView>> {
    let page = page.request();
    let count = db::companies::count_companies(&state.pool, filter).await?;
    let companies = db::companies::list_companies(&state.pool, filter, page).await?;
    Ok(Paginated::new(count, page, companies).map(CompanyView::from))
}

pub async fn list_companies(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
    AppQuery(filter): AppQuery<CompanyFilter>,
) -> ApiResult<Json<Paginated<CompanyView>>> {
    Ok(Json(company_page(&state, &filter, page).await?))
}

pub async fn create_company(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(input): AppJson<CompanyInput>,
) -> ApiResult<(StatusCode, Json<CompanyView>)> {
    user.require_agent()?;
    if input.name.as_deref().is_none_or(|n| n.trim().is_empty()) {
        return Err(ApiError::bad_request("Company name is required"));
    }
    let company = db::companies::create_company(&state.pool, &input).await?;
    tracing::info!(company_id = company.id, "Company created");
    Ok((StatusCode::CREATED, Json(company.into())))
}

pub async fn get_company(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<CompanyView>> {
    let company = db::companies::get_company(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Company"))?;
    Ok(Json(company.into()))
}

pub async fn update_company(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    AppJson(input): AppJson<CompanyInput>,
) -> ApiResult<Json<CompanyView>> {
    user.require_agent()?;
    let company = db::companies::update_company(&state.pool, id, &input)
        .await?
        .ok_or_else(|| ApiError::not_found("Company"))?;
    Ok(Json(company.into()))
}

pub async fn delete_company(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    user.require_agent()?;
    if !db::companies::delete_company(&state.pool, id).await? {
        return Err(ApiError::not_found("Company"));
    }
    Ok(no_content())
}

/// `GET /api/companies/customers/`
pub async fn customer_companies(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
) -> ApiResult<Json<Paginated<CompanyView>>> {
    let filter = CompanyFilter {
        is_customer: Some(true),
        ..Default::default()
    };
    Ok(Json(company_page(&state, &filter, page).await?))
}

/// `GET /api/companies/prospects/`
pub async fn prospect_companies(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
) -> ApiResult<Json<Paginated<CompanyView>>> {
    let filter = CompanyFilter {
        is_prospect: Some(true),
        ..Default::default()
    };
    Ok(Json(company_page(&state, &filter, page).await?))
}

pub async fn company_stats(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> ApiResult<Json<CompanyStats>> {
    Ok(Json(db::companies::company_stats(&state.pool).await?))
}

async fn contact_page(
    state: &AppState,
    filter: &ContactFilter,
    page: PageParams,
) -> ApiResult<Paginated<ContactView>> {
    let page = page.request();
    let count = db::contacts::count_contacts(&state.pool, filter).await?;
    let contacts = db::contacts::list_contacts(&state.pool, filter, page).await?;
    Ok(Paginated::new(count, page, contacts).map(ContactView::from))
}

pub async fn list_contacts(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
    AppQuery(filter): AppQuery<ContactFilter>,
) -> ApiResult<Json<Paginated<ContactView>>> {
    Ok(Json(contact_page(&state, &filter, page).await?))
}

pub async fn create_contact(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(input): AppJson<ContactInput>,
) -> ApiResult<(StatusCode, Json<ContactView>)> {
    user.require_agent()?;
    let blank = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());
    if blank(&input.first_name) || blank(&input.last_name) || blank(&input.email) {
        return Err(ApiError::bad_request(
            "first_name, last_name and email are required",
        ));
    }
    input.validate()?;

    let contact = db::contacts::create_contact(&state.pool, &input).await?;
    tracing::info!(contact_id = contact.id, "Contact created");
    Ok((StatusCode::CREATED, Json(contact.into())))
}

pub async fn get_contact(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ContactView>> {
    let contact = db::contacts::get_contact(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Contact"))?;
    Ok(Json(contact.into()))
}

pub async fn update_contact(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    AppJson(input): AppJson<ContactInput>,
) -> ApiResult<Json<ContactView>> {
    user.require_agent()?;
    input.validate()?;
    let contact = db::contacts::update_contact(&state.pool, id, &input)
        .await?
        .ok_or_else(|| ApiError::not_found("Contact"))?;
    Ok(Json(contact.into()))
}

pub async fn delete_contact(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    user.require_agent()?;
    if !db::contacts::delete_contact(&state.pool, id).await? {
        return Err(ApiError::not_found("Contact"));
    }
    Ok(no_content())
}

pub async fn customer_contacts(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
) -> ApiResult<Json<Paginated<ContactView>>> {
    let filter = ContactFilter {
        is_customer: Some(true),
        ..Default::default()
    };
    Ok(Json(contact_page(&state, &filter, page).await?))
}

pub async fn prospect_contacts(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
) -> ApiResult<Json<Paginated<ContactView>>> {
    let filter = ContactFilter {
        is_prospect: Some(true),
        ..Default::default()
    };
    Ok(Json(contact_page(&state, &filter, page).await?))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

/// `GET /api/contacts/search/?q=`
pub async fn search_contacts(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
    AppQuery(params): AppQuery<SearchParams>,
) -> ApiResult<Json<Paginated<ContactView>>> {
    let q = params
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Search query required"))?;
    let filter = ContactFilter {
        search: Some(q),
        ..Default::default()
    };
    Ok(Json(contact_page(&state, &filter, page).await?))
}

pub async fn contact_stats(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> ApiResult<Json<ContactStats>> {
    Ok(Json(db::contacts::contact_stats(&state.pool).await?))
}

/// `POST /api/contacts/{id}/convert_to_customer/`
pub async fn convert_to_customer(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ContactView>> {
    user.require_agent()?;
    let contact = db::contacts::get_contact(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Contact"))?;
    if contact.is_customer {
        return Err(ApiError::bad_request("Contact is already a customer"));
    }
    let contact = db::contacts::convert_to_customer(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Contact"))?;
    tracing::info!(contact_id = id, "Contact converted to customer");
    Ok(Json(contact.into()))
}
