// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared state handed to every handler.

use std::path::PathBuf;
use std::sync::Arc;

use sqlx::PgPool;

use mint_crm_core::messaging::{
    CaseNotifier, DisabledSmsGateway, EmailService, HttpSmsGateway, LogMailer, MailError, Mailer,
    SmsGateway, SmsService, SmtpMailer,
};

use crate::auth::TokenIssuer;
use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub tokens: TokenIssuer,
    pub notifier: Arc<CaseNotifier>,
    pub media_dir: PathBuf,
}

impl AppState {
    /// State with the transports described by `config`: SMTP when
    /// `SMTP_HOST` is set (a logging mailer otherwise) and the HTTP SMS
    /// gateway when `BASE_SMS_URL` is set (SMS disabled otherwise).
    pub fn new(pool: PgPool, config: Config) -> Result<Self, MailError> {
        let mailer: Arc<dyn Mailer> = match &config.smtp {
            Some(settings) => Arc::new(SmtpMailer::new(settings)?),
            None => {
                tracing::warn!("SMTP_HOST not set, outbound email will only be logged");
                Arc::new(LogMailer)
            }
        };
        let gateway: Arc<dyn SmsGateway> = match &config.sms_base_url {
            Some(url) => Arc::new(HttpSmsGateway::new(url.clone(), config.sms_timeout)),
            None => {
                tracing::warn!("BASE_SMS_URL not set, SMS sending is disabled");
                Arc::new(DisabledSmsGateway)
            }
        };
        Ok(Self::with_transports(pool, config, mailer, gateway))
    }

    /// State with explicit transports, used by tests.
    pub fn with_transports(
        pool: PgPool,
        config: Config,
        mailer: Arc<dyn Mailer>,
        gateway: Arc<dyn SmsGateway>,
    ) -> Self {
        let emails = EmailService::new(pool.clone(), mailer, config.default_from_email.clone());
        let sms = SmsService::new(pool.clone(), gateway, config.sms_from_number.clone());
        let notifier = Arc::new(CaseNotifier::new(pool.clone(), emails, sms));
        let tokens = TokenIssuer::new(
            &config.jwt_secret,
            config.access_token_ttl,
            config.refresh_token_ttl,
        );
        Self {
            pool,
            media_dir: config.media_dir.clone(),
            config: Arc::new(config),
            tokens,
            notifier,
        }
    }

    pub fn emails(&self) -> &EmailService {
        self.notifier.emails()
    }

    pub fn sms(&self) -> &SmsService {
        self.notifier.sms()
    }
}
