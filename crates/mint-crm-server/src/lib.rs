// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! MINT CRM HTTP API server.
//!
//! The REST surface over `mint_crm_core`: JWT authentication, per-resource
//! handlers, the router and the background workers that run next to it.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod workers;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
