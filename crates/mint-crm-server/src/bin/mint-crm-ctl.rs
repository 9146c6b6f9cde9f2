// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! MINT CRM admin CLI
//!
//! ```text
//! mint-crm-ctl migrate
//! mint-crm-ctl create-admin --email E --password P [--first-name F] [--last-name L]
//! mint-crm-ctl seed-templates
//! mint-crm-ctl renumber-cases
//! mint-crm-ctl escalate
//! ```
//!
//! Reads `MINT_CRM_DATABASE_URL` (or `DATABASE_URL`). `escalate` loads the
//! full server configuration so escalation mail goes out the usual way.

use std::process::ExitCode;

use anyhow::{Context, bail};
use chrono::Utc;
use sqlx::PgPool;

use mint_crm_core::models::{NewUser, UserRole};
use mint_crm_core::services::{escalation, templates};
use mint_crm_core::{db, migrations};
use mint_crm_server::auth::hash_password;
use mint_crm_server::{AppState, Config};

const USAGE: &str = "usage: mint-crm-ctl <migrate|create-admin|seed-templates|renumber-cases|escalate> [options]

  migrate                         apply pending database migrations
  create-admin --email E --password P [--first-name F] [--last-name L]
  seed-templates                  create default email and SMS templates
  renumber-cases                  renumber all cases as CASE-NNNNNN by id
  escalate                        run one overdue-case escalation sweep";

#[derive(Debug, PartialEq)]
enum Command {
    Migrate,
    CreateAdmin {
        email: String,
        password: String,
        first_name: String,
        last_name: String,
    },
    SeedTemplates,
    RenumberCases,
    Escalate,
}

fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let Some((command, rest)) = args.split_first() else {
        bail!("missing command");
    };
    let command = match command.as_str() {
        "migrate" => Command::Migrate,
        "seed-templates" => Command::SeedTemplates,
        "renumber-cases" => Command::RenumberCases,
        "escalate" => Command::Escalate,
        "create-admin" => {
            let mut email = None;
            let mut password = None;
            let mut first_name = String::new();
            let mut last_name = String::new();
            let mut iter = rest.iter();
            while let Some(flag) = iter.next() {
                let value = iter
                    .next()
                    .with_context(|| format!("{flag} needs a value"))?
                    .clone();
                match flag.as_str() {
                    "--email" => email = Some(value),
                    "--password" => password = Some(value),
                    "--first-name" => first_name = value,
                    "--last-name" => last_name = value,
                    other => bail!("unknown option {other}"),
                }
            }
            return Ok(Command::CreateAdmin {
                email: email.context("--email is required")?,
                password: password.context("--password is required")?,
                first_name,
                last_name,
            });
        }
        other => bail!("unknown command {other}"),
    };
    if let Some(extra) = rest.first() {
        bail!("unexpected argument {extra}");
    }
    Ok(command)
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mint_crm_core=info,mint_crm_server=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("error: {e:#}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create tokio runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(command)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn connect() -> anyhow::Result<PgPool> {
    let url = std::env::var("MINT_CRM_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .context("MINT_CRM_DATABASE_URL is not set")?;
    PgPool::connect(&url)
        .await
        .context("failed to connect to database")
}

async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Migrate => {
            let pool = connect().await?;
            migrations::run(&pool).await?;
            println!("Migrations applied");
        }
        Command::CreateAdmin {
            email,
            password,
            first_name,
            last_name,
        } => {
            if !email.contains('@') {
                bail!("invalid email address {email}");
            }
            if password.chars().count() < 8 {
                bail!("password must be at least 8 characters");
            }
            let pool = connect().await?;
            if db::users::get_user_by_email(&pool, &email.trim().to_lowercase())
                .await?
                .is_some()
            {
                bail!("a user with email {email} already exists");
            }
            let user = db::users::create_user(
                &pool,
                &NewUser {
                    email,
                    password_hash: hash_password(&password)?,
                    first_name,
                    last_name,
                    role: UserRole::Admin,
                    company: String::new(),
                    phone: String::new(),
                    department: String::new(),
                    is_active: true,
                },
            )
            .await?;
            println!("Created admin {} (id {})", user.email, user.id);
        }
        Command::SeedTemplates => {
            let pool = connect().await?;
            let author = db::users::first_manager(&pool).await?.map(|u| u.id);
            let summary = templates::seed_default_templates(&pool, author).await?;
            println!(
                "Created {} email templates and {} SMS templates",
                summary.email_templates_created, summary.sms_templates_created
            );
        }
        Command::RenumberCases => {
            let pool = connect().await?;
            let count = db::cases::renumber_all(&pool).await?;
            println!("Renumbered {count} cases");
        }
        Command::Escalate => {
            let config = Config::from_env()?;
            let pool = PgPool::connect(&config.database_url)
                .await
                .context("failed to connect to database")?;
            let state = AppState::new(pool, config)?;
            let count =
                escalation::escalate_overdue_cases(&state.pool, &state.notifier, Utc::now())
                    .await?;
            println!("Escalated {count} overdue cases");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_args(&args(&["migrate"])).unwrap(), Command::Migrate);
        assert_eq!(
            parse_args(&args(&["renumber-cases"])).unwrap(),
            Command::RenumberCases
        );
        assert!(parse_args(&args(&["migrate", "now"])).is_err());
        assert!(parse_args(&args(&["frobnicate"])).is_err());
        assert!(parse_args(&[]).is_err());
    }

    #[test]
    fn test_parse_create_admin() {
        let cmd = parse_args(&args(&[
            "create-admin",
            "--email",
            "root@example.com",
            "--password",
            "hunter22!",
            "--first-name",
            "Ada",
        ]))
        .unwrap();
        assert_eq!(
            cmd,
            Command::CreateAdmin {
                email: "root@example.com".into(),
                password: "hunter22!".into(),
                first_name: "Ada".into(),
                last_name: String::new(),
            }
        );

        assert!(parse_args(&args(&["create-admin", "--email", "a@b.c"])).is_err());
        assert!(parse_args(&args(&["create-admin", "--email"])).is_err());
        assert!(parse_args(&args(&["create-admin", "--role", "x"])).is_err());
    }
}
