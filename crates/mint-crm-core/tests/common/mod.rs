// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared fixtures for mint-crm-core database tests.

#![allow(dead_code)]

use std::sync::Arc;

use mint_crm_core::db;
use mint_crm_core::messaging::{
    CaseNotifier, EmailService, MockMailer, MockSmsGateway, SmsService,
};
use mint_crm_core::models::{
    Case, Contact, ContactInput, NewCase, NewUser, Priority, User, UserRole,
};
use sqlx::PgPool;
use uuid::Uuid;

/// Skip the test when no database is configured.
macro_rules! skip_if_no_db {
    () => {
        if std::env::var("TEST_DATABASE_URL").is_err() {
            eprintln!("Skipping test: TEST_DATABASE_URL not set");
            return;
        }
    };
}

/// Connect to `TEST_DATABASE_URL` and apply migrations.
pub async fn test_pool() -> PgPool {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL not set");
    let pool = PgPool::connect(&url)
        .await
        .expect("Failed to connect to test database");
    mint_crm_core::migrations::run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@test.mintcrm.local", Uuid::new_v4().simple())
}

pub async fn create_user(pool: &PgPool, role: UserRole, phone: &str) -> User {
    db::users::create_user(
        pool,
        &NewUser {
            email: unique_email(role.as_str()),
            password_hash: "not-a-real-hash".into(),
            first_name: "Test".into(),
            last_name: role.label().into(),
            role,
            phone: phone.into(),
            is_active: true,
            ..Default::default()
        },
    )
    .await
    .expect("Failed to create user")
}

pub async fn create_contact(pool: &PgPool, mobile: &str) -> Contact {
    db::contacts::create_contact(
        pool,
        &ContactInput {
            first_name: Some("Abebe".into()),
            last_name: Some("Kebede".into()),
            email: Some(unique_email("customer")),
            mobile: Some(mobile.into()),
            ..Default::default()
        },
    )
    .await
    .expect("Failed to create contact")
}

pub async fn create_case(
    pool: &PgPool,
    customer: &Contact,
    creator: &User,
    priority: Priority,
) -> Case {
    db::cases::create_case(
        pool,
        &NewCase {
            title: "Printer on fire".into(),
            description: "Smoke everywhere".into(),
            priority,
            customer_id: customer.id,
            ..Default::default()
        },
        creator.id,
    )
    .await
    .expect("Failed to create case")
}

/// Notifier wired to in-memory mail and SMS doubles.
pub struct TestNotifier {
    pub notifier: Arc<CaseNotifier>,
    pub mailer: Arc<MockMailer>,
    pub gateway: Arc<MockSmsGateway>,
}

pub fn test_notifier(pool: &PgPool) -> TestNotifier {
    let mailer = Arc::new(MockMailer::new());
    let gateway = Arc::new(MockSmsGateway::new());
    let emails = EmailService::new(pool.clone(), mailer.clone(), "noreply@test.mintcrm.local");
    let sms = SmsService::new(pool.clone(), gateway.clone(), "SYSTEM");
    TestNotifier {
        notifier: Arc::new(CaseNotifier::new(pool.clone(), emails, sms)),
        mailer,
        gateway,
    }
}
