// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Contacts.
//!
//! A contact flagged as a customer promotes its company to customer status in
//! the same transaction as the contact write.

use sqlx::{PgPool, Postgres, Transaction};

use super::{PageRequest, order_by, search_pattern};
use crate::models::{Contact, ContactFilter, ContactInput};

const CONTACT_ORDERING: &[(&str, &str)] = &[
    ("first_name", "ct.first_name"),
    ("last_name", "ct.last_name"),
    ("email", "ct.email"),
    ("created_at", "ct.created_at"),
];

const CONTACT_FILTER_SQL: &str = r#"
    ($1::BIGINT IS NULL OR ct.company_id = $1)
    AND ($2::BOOLEAN IS NULL OR ct.is_active = $2)
    AND ($3::BOOLEAN IS NULL OR ct.is_customer = $3)
    AND ($4::BOOLEAN IS NULL OR ct.is_prospect = $4)
    AND ($5::TEXT IS NULL OR (
        ct.first_name ILIKE $5 OR ct.last_name ILIKE $5 OR ct.email ILIKE $5
        OR ct.phone ILIKE $5 OR ct.mobile ILIKE $5 OR co.name ILIKE $5
    ))
"#;

async fn promote_company(
    tx: &mut Transaction<'_, Postgres>,
    contact: &Contact,
) -> Result<(), sqlx::Error> {
    if let (true, Some(company_id)) = (contact.is_customer, contact.company_id) {
        sqlx::query(
            r#"
            UPDATE companies
            SET is_customer = TRUE, is_prospect = FALSE, updated_at = NOW()
            WHERE id = $1 AND (NOT is_customer OR is_prospect)
            "#,
        )
        .bind(company_id)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

pub async fn create_contact(pool: &PgPool, input: &ContactInput) -> Result<Contact, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let contact = sqlx::query_as::<_, Contact>(
        r#"
        INSERT INTO contacts (
            title, first_name, last_name, email, phone, mobile, company_id,
            job_title, department, address, city, state, country, postal_code,
            notes, birthday, linkedin_url, twitter_handle, is_active, is_customer,
            is_prospect, email_opt_out, phone_opt_out, user_id
        ) VALUES (
            COALESCE($1, ''), $2, $3, $4, COALESCE($5, ''), COALESCE($6, ''), $7,
            COALESCE($8, ''), COALESCE($9, ''), COALESCE($10, ''), COALESCE($11, ''),
            COALESCE($12, ''), COALESCE($13, ''), COALESCE($14, ''), COALESCE($15, ''),
            $16, COALESCE($17, ''), COALESCE($18, ''), COALESCE($19, TRUE),
            COALESCE($20, FALSE), COALESCE($21, TRUE), COALESCE($22, FALSE),
            COALESCE($23, FALSE), $24
        )
        RETURNING *
        "#,
    )
    .bind(&input.title)
    .bind(input.first_name.as_deref().unwrap_or_default())
    .bind(input.last_name.as_deref().unwrap_or_default())
    .bind(input.email.as_deref().unwrap_or_default().trim().to_lowercase())
    .bind(&input.phone)
    .bind(&input.mobile)
    .bind(input.company_id.flatten())
    .bind(&input.job_title)
    .bind(&input.department)
    .bind(&input.address)
    .bind(&input.city)
    .bind(&input.state)
    .bind(&input.country)
    .bind(&input.postal_code)
    .bind(&input.notes)
    .bind(input.birthday.flatten())
    .bind(&input.linkedin_url)
    .bind(&input.twitter_handle)
    .bind(input.is_active)
    .bind(input.is_customer)
    .bind(input.is_prospect)
    .bind(input.email_opt_out)
    .bind(input.phone_opt_out)
    .bind(input.user_id.flatten())
    .fetch_one(&mut *tx)
    .await?;

    promote_company(&mut tx, &contact).await?;
    tx.commit().await?;

    Ok(contact)
}

pub async fn get_contact(pool: &PgPool, id: i64) -> Result<Option<Contact>, sqlx::Error> {
    sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_contact_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<Contact>, sqlx::Error> {
    sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE email = $1")
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await
}

/// The contact record linked to a portal user, if any.
pub async fn get_contact_for_user(
    pool: &PgPool,
    user_id: i64,
) -> Result<Option<Contact>, sqlx::Error> {
    sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Look up a contact by email, creating a minimal one when absent.
///
/// Returns the contact and whether it was created.
pub async fn get_or_create_by_email(
    pool: &PgPool,
    email: &str,
    first_name: &str,
    last_name: &str,
) -> Result<(Contact, bool), sqlx::Error> {
    let inserted = sqlx::query_as::<_, Contact>(
        r#"
        INSERT INTO contacts (first_name, last_name, email)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(first_name)
    .bind(last_name)
    .bind(email.trim().to_lowercase())
    .fetch_optional(pool)
    .await?;

    match inserted {
        Some(contact) => Ok((contact, true)),
        None => {
            let existing = get_contact_by_email(pool, email)
                .await?
                .ok_or(sqlx::Error::RowNotFound)?;
            Ok((existing, false))
        }
    }
}

pub async fn update_contact(
    pool: &PgPool,
    id: i64,
    input: &ContactInput,
) -> Result<Option<Contact>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let contact = sqlx::query_as::<_, Contact>(
        r#"
        UPDATE contacts SET
            title = COALESCE($2, title),
            first_name = COALESCE($3, first_name),
            last_name = COALESCE($4, last_name),
            email = COALESCE($5, email),
            phone = COALESCE($6, phone),
            mobile = COALESCE($7, mobile),
            company_id = CASE WHEN $26 THEN $8 ELSE company_id END,
            job_title = COALESCE($9, job_title),
            department = COALESCE($10, department),
            address = COALESCE($11, address),
            city = COALESCE($12, city),
            state = COALESCE($13, state),
            country = COALESCE($14, country),
            postal_code = COALESCE($15, postal_code),
            notes = COALESCE($16, notes),
            birthday = CASE WHEN $27 THEN $17 ELSE birthday END,
            linkedin_url = COALESCE($18, linkedin_url),
            twitter_handle = COALESCE($19, twitter_handle),
            is_active = COALESCE($20, is_active),
            is_customer = COALESCE($21, is_customer),
            is_prospect = COALESCE($22, is_prospect),
            email_opt_out = COALESCE($23, email_opt_out),
            phone_opt_out = COALESCE($24, phone_opt_out),
            user_id = CASE WHEN $28 THEN $25 ELSE user_id END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&input.title)
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(input.email.as_ref().map(|e| e.trim().to_lowercase()))
    .bind(&input.phone)
    .bind(&input.mobile)
    .bind(input.company_id.flatten())
    .bind(&input.job_title)
    .bind(&input.department)
    .bind(&input.address)
    .bind(&input.city)
    .bind(&input.state)
    .bind(&input.country)
    .bind(&input.postal_code)
    .bind(&input.notes)
    .bind(input.birthday.flatten())
    .bind(&input.linkedin_url)
    .bind(&input.twitter_handle)
    .bind(input.is_active)
    .bind(input.is_customer)
    .bind(input.is_prospect)
    .bind(input.email_opt_out)
    .bind(input.phone_opt_out)
    .bind(input.user_id.flatten())
    .bind(input.company_id.is_some())
    .bind(input.birthday.is_some())
    .bind(input.user_id.is_some())
    .fetch_optional(&mut *tx)
    .await?;

    if let Some(contact) = &contact {
        promote_company(&mut tx, contact).await?;
    }
    tx.commit().await?;

    Ok(contact)
}

/// Flag a prospect as a customer.
pub async fn convert_to_customer(pool: &PgPool, id: i64) -> Result<Option<Contact>, sqlx::Error> {
    update_contact(
        pool,
        id,
        &ContactInput {
            is_customer: Some(true),
            is_prospect: Some(false),
            ..Default::default()
        },
    )
    .await
}

pub async fn delete_contact(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM contacts WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_contacts(
    pool: &PgPool,
    filter: &ContactFilter,
    page: PageRequest,
) -> Result<Vec<Contact>, sqlx::Error> {
    let order = order_by(
        filter.ordering.as_deref(),
        CONTACT_ORDERING,
        "ct.last_name ASC, ct.first_name ASC",
    );
    let query = format!(
        r#"
        SELECT ct.* FROM contacts ct
        LEFT JOIN companies co ON co.id = ct.company_id
        WHERE {CONTACT_FILTER_SQL}
        ORDER BY {order}, ct.id ASC
        LIMIT $6 OFFSET $7
        "#
    );
    sqlx::query_as::<_, Contact>(&query)
        .bind(filter.company)
        .bind(filter.is_active)
        .bind(filter.is_customer)
        .bind(filter.is_prospect)
        .bind(search_pattern(filter.search.as_deref()))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await
}

pub async fn count_contacts(pool: &PgPool, filter: &ContactFilter) -> Result<i64, sqlx::Error> {
    let query = format!(
        r#"
        SELECT COUNT(*) FROM contacts ct
        LEFT JOIN companies co ON co.id = ct.company_id
        WHERE {CONTACT_FILTER_SQL}
        "#
    );
    let count: (i64,) = sqlx::query_as(&query)
        .bind(filter.company)
        .bind(filter.is_active)
        .bind(filter.is_customer)
        .bind(filter.is_prospect)
        .bind(search_pattern(filter.search.as_deref()))
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

/// Contacts per company, for the stats endpoint.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct CompanyContactCount {
    pub company: String,
    pub count: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ContactStats {
    pub total_contacts: i64,
    pub customers: i64,
    pub prospects: i64,
    pub by_company: Vec<CompanyContactCount>,
}

pub async fn contact_stats(pool: &PgPool) -> Result<ContactStats, sqlx::Error> {
    let totals: (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COUNT(*) FILTER (WHERE is_customer),
               COUNT(*) FILTER (WHERE is_prospect)
        FROM contacts
        "#,
    )
    .fetch_one(pool)
    .await?;

    let by_company = sqlx::query_as::<_, CompanyContactCount>(
        r#"
        SELECT co.name AS company, COUNT(*) AS count
        FROM contacts ct
        JOIN companies co ON co.id = ct.company_id
        GROUP BY co.id, co.name
        ORDER BY count DESC, company
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(ContactStats {
        total_contacts: totals.0,
        customers: totals.1,
        prospects: totals.2,
        by_company,
    })
}
