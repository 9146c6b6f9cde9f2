// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! API routes.
//!
//! Every resource lives under `/api/` with a trailing slash. Detail routes
//! accept both PUT and PATCH as partial updates.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{
    self, cases, contacts, documents, emails, meetings, notifications, reports, sms, tasks, users,
};
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        .merge(user_routes())
        .merge(contact_routes())
        .merge(case_routes())
        .merge(email_routes())
        .merge(sms_routes())
        .merge(notification_routes())
        .merge(meeting_routes())
        .merge(task_routes())
        .merge(document_routes())
        .merge(report_routes())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// An empty origin list allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(values)
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/token/", post(users::obtain_token))
        .route("/api/token/refresh/", post(users::refresh_token))
        // POST is public sign-up, GET needs a token
        .route("/api/users/", get(users::list_users).post(users::signup))
        .route("/api/users/signup/", post(users::signup))
        .route("/api/users/me/", get(users::me))
        .route("/api/users/agents/", get(users::agents))
        .route("/api/users/managers/", get(users::managers))
        .route("/api/users/change_password/", post(users::change_password))
        .route(
            "/api/users/{id}/",
            get(users::get_user)
                .put(users::update_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
}

fn contact_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/companies/",
            get(contacts::list_companies).post(contacts::create_company),
        )
        .route("/api/companies/customers/", get(contacts::customer_companies))
        .route("/api/companies/prospects/", get(contacts::prospect_companies))
        .route("/api/companies/stats/", get(contacts::company_stats))
        .route(
            "/api/companies/{id}/",
            get(contacts::get_company)
                .put(contacts::update_company)
                .patch(contacts::update_company)
                .delete(contacts::delete_company),
        )
        .route(
            "/api/contacts/",
            get(contacts::list_contacts).post(contacts::create_contact),
        )
        .route("/api/contacts/customers/", get(contacts::customer_contacts))
        .route("/api/contacts/prospects/", get(contacts::prospect_contacts))
        .route("/api/contacts/search/", get(contacts::search_contacts))
        .route("/api/contacts/stats/", get(contacts::contact_stats))
        .route(
            "/api/contacts/{id}/",
            get(contacts::get_contact)
                .put(contacts::update_contact)
                .patch(contacts::update_contact)
                .delete(contacts::delete_contact),
        )
        .route(
            "/api/contacts/{id}/convert_to_customer/",
            post(contacts::convert_to_customer),
        )
}

fn case_routes() -> Router<AppState> {
    Router::new()
        .route("/api/cases/", get(cases::list_cases).post(cases::create_case))
        .route("/api/cases/dashboard_stats/", get(cases::dashboard_stats))
        .route("/api/cases/my_cases/", get(cases::my_cases))
        .route("/api/cases/urgent_cases/", get(cases::urgent_cases))
        .route(
            "/api/cases/{id}/",
            get(cases::get_case)
                .put(cases::update_case)
                .patch(cases::update_case)
                .delete(cases::delete_case),
        )
        .route("/api/cases/{id}/assign/", post(cases::assign))
        .route("/api/cases/{id}/auto_assign/", post(cases::auto_assign))
        .route("/api/cases/{id}/update_priority/", post(cases::update_priority))
        .route("/api/cases/{id}/update_status/", post(cases::update_status))
        .route("/api/cases/{id}/escalate/", post(cases::escalate))
        .route("/api/cases/{id}/sla/", get(cases::sla))
        .route(
            "/api/case-responses/",
            get(cases::list_responses).post(cases::create_response),
        )
        .route(
            "/api/case-responses/{id}/",
            get(cases::get_response)
                .put(cases::update_response)
                .patch(cases::update_response)
                .delete(cases::delete_response),
        )
        .route(
            "/api/case-responses/{id}/send_email/",
            post(cases::send_response_email),
        )
}

fn email_routes() -> Router<AppState> {
    Router::new()
        .route("/api/emails/", get(emails::list_emails))
        .route("/api/emails/send_email/", post(emails::send_email))
        .route("/api/emails/stats/", get(emails::email_stats))
        .route(
            "/api/emails/{id}/",
            get(emails::get_email).delete(emails::delete_email),
        )
        .route("/api/emails/{id}/retry/", post(emails::retry_email))
        .route("/api/emails/{id}/reply/", post(emails::reply))
        .route("/api/emails/{id}/forward/", post(emails::forward))
        .route("/api/emails/{id}/create_case/", post(emails::create_case))
        .route("/api/emails/{id}/mark_read/", post(emails::mark_read))
        .route("/api/emails/{id}/toggle_star/", post(emails::toggle_star))
        .route("/api/emails/{id}/archive/", post(emails::archive))
        .route(
            "/api/email-templates/",
            get(emails::list_templates).post(emails::create_template),
        )
        .route("/api/email-templates/by_type/", get(emails::templates_by_type))
        .route(
            "/api/email-templates/{id}/",
            get(emails::get_template)
                .put(emails::update_template)
                .patch(emails::update_template)
                .delete(emails::delete_template),
        )
        .route("/api/email-templates/{id}/render/", post(emails::render_template))
        .route("/api/email-templates/{id}/send_test/", post(emails::send_test))
        .route(
            "/api/email-configs/",
            get(emails::list_configs).post(emails::save_config),
        )
        .route("/api/email-configs/providers/", get(emails::providers))
        .route(
            "/api/email-configs/{id}/",
            get(emails::get_config)
                .put(emails::update_config)
                .patch(emails::update_config)
                .delete(emails::delete_config),
        )
        .route(
            "/api/email-configs/{id}/test_connection/",
            post(emails::test_connection),
        )
        .route("/api/email-configs/{id}/verify/", post(emails::verify_config))
}

fn sms_routes() -> Router<AppState> {
    Router::new()
        .route("/api/sms/", get(sms::list_sms))
        .route("/api/sms/send_sms/", post(sms::send_sms))
        .route("/api/sms/send_bulk/", post(sms::send_bulk))
        .route("/api/sms/stats/", get(sms::sms_stats))
        .route("/api/sms/{id}/", get(sms::get_sms).delete(sms::delete_sms))
        .route("/api/sms/{id}/resend/", post(sms::resend))
        .route("/api/sms/{id}/mark_read/", post(sms::mark_read))
        .route("/api/sms/{id}/toggle_star/", post(sms::toggle_star))
        .route(
            "/api/sms-templates/",
            get(sms::list_templates).post(sms::create_template),
        )
        .route(
            "/api/sms-templates/{id}/",
            get(sms::get_template)
                .put(sms::update_template)
                .patch(sms::update_template)
                .delete(sms::delete_template),
        )
        .route("/api/sms-templates/{id}/test/", post(sms::test_template))
        .route(
            "/api/sms-configs/",
            get(sms::list_configs).post(sms::save_config),
        )
        .route("/api/sms-configs/providers/", get(sms::providers))
        .route(
            "/api/sms-configs/{id}/",
            get(sms::get_config)
                .put(sms::update_config)
                .patch(sms::update_config)
                .delete(sms::delete_config),
        )
        .route("/api/sms-configs/{id}/verify/", post(sms::verify_config))
        .route(
            "/api/sms-configs/{id}/test_connection/",
            post(sms::test_connection),
        )
}

fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/api/notifications/", get(notifications::list_notifications))
        .route(
            "/api/notifications/mark_all_read/",
            post(notifications::mark_all_read),
        )
        .route(
            "/api/notifications/unread_count/",
            get(notifications::unread_count),
        )
        .route(
            "/api/notifications/{id}/",
            get(notifications::get_notification).delete(notifications::delete_notification),
        )
        .route(
            "/api/notifications/{id}/mark_read/",
            post(notifications::mark_read),
        )
}

fn meeting_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/meetings/",
            get(meetings::list_meetings).post(meetings::create_meeting),
        )
        .route("/api/meetings/today/", get(meetings::today))
        .route("/api/meetings/upcoming/", get(meetings::upcoming))
        .route("/api/meetings/past/", get(meetings::past))
        .route("/api/meetings/stats/", get(meetings::stats))
        .route("/api/meetings/search/", post(meetings::search))
        .route(
            "/api/meetings/{id}/",
            get(meetings::get_meeting)
                .put(meetings::update_meeting)
                .patch(meetings::update_meeting)
                .delete(meetings::delete_meeting),
        )
        .route("/api/meetings/{id}/join/", post(meetings::join))
        .route("/api/meetings/{id}/leave/", post(meetings::leave))
        .route("/api/meetings/{id}/complete/", post(meetings::complete))
        .route("/api/meetings/{id}/cancel/", post(meetings::cancel))
        .route(
            "/api/meeting-categories/",
            get(meetings::list_categories).post(meetings::create_category),
        )
        .route(
            "/api/meeting-categories/active/",
            get(meetings::active_categories),
        )
        .route(
            "/api/meeting-categories/{id}/",
            get(meetings::get_category)
                .put(meetings::update_category)
                .patch(meetings::update_category)
                .delete(meetings::delete_category),
        )
        .route("/api/meeting-attendance/", get(meetings::list_attendance))
        .route(
            "/api/meeting-attendance/{id}/",
            get(meetings::get_attendance),
        )
        .route(
            "/api/meeting-attendance/{id}/respond/",
            post(meetings::respond),
        )
        .route("/api/meeting-reminders/", get(meetings::list_reminders))
        .route("/api/meeting-reminders/{id}/", get(meetings::get_reminder))
        .route(
            "/api/meeting-templates/",
            get(meetings::list_templates).post(meetings::create_template),
        )
        .route(
            "/api/meeting-templates/active/",
            get(meetings::active_templates),
        )
        .route(
            "/api/meeting-templates/{id}/",
            get(meetings::get_template)
                .put(meetings::update_template)
                .patch(meetings::update_template)
                .delete(meetings::delete_template),
        )
        .route(
            "/api/meeting-templates/{id}/create_meeting/",
            post(meetings::create_from_template),
        )
}

fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/api/tasks/", get(tasks::list_tasks).post(tasks::create_task))
        .route("/api/tasks/my_tasks/", get(tasks::my_tasks))
        .route("/api/tasks/overdue/", get(tasks::overdue))
        .route(
            "/api/tasks/{id}/",
            get(tasks::get_task)
                .put(tasks::update_task)
                .patch(tasks::update_task)
                .delete(tasks::delete_task),
        )
}

fn document_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/folders/",
            get(documents::list_folders).post(documents::create_folder),
        )
        .route(
            "/api/folders/{id}/",
            get(documents::get_folder)
                .put(documents::update_folder)
                .patch(documents::update_folder)
                .delete(documents::delete_folder),
        )
        .route(
            "/api/documents/",
            get(documents::list_documents)
                .post(documents::upload_document)
                .layer(DefaultBodyLimit::max(documents::MAX_UPLOAD_BYTES)),
        )
        .route(
            "/api/documents/{id}/",
            get(documents::get_document)
                .put(documents::update_document)
                .patch(documents::update_document)
                .delete(documents::delete_document),
        )
        .route("/api/documents/{id}/download/", get(documents::download))
}

fn report_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/reports/",
            get(reports::list_reports).post(reports::create_report),
        )
        .route(
            "/api/reports/{id}/",
            get(reports::get_report)
                .put(reports::update_report)
                .patch(reports::update_report)
                .delete(reports::delete_report),
        )
        .route("/api/reports/{id}/generate/", post(reports::generate))
        .route("/api/reports/{id}/executions/", get(reports::executions))
        .route("/api/reports/{id}/export/", get(reports::export))
}

