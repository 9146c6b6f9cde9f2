// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Folders and uploaded documents. File bytes live on disk; rows keep the path.

use sqlx::PgPool;

use super::{PageRequest, search_pattern};
use crate::models::{
    Document, DocumentFilter, DocumentPatch, Folder, FolderFilter, FolderInput, NewDocument,
};

const FOLDER_FILTER_SQL: &str = r#"
    ($1::BIGINT IS NULL OR parent_id = $1)
    AND ($2::BIGINT IS NULL OR created_by_id = $2)
    AND ($3::TEXT IS NULL OR name ILIKE $3)
"#;

const DOCUMENT_FILTER_SQL: &str = r#"
    ($1::BIGINT IS NULL OR folder_id = $1)
    AND ($2::BIGINT IS NULL OR uploaded_by_id = $2)
    AND ($3::TEXT IS NULL OR file_type = $3)
    AND ($4::TEXT IS NULL OR (title ILIKE $4 OR description ILIKE $4))
"#;

pub async fn create_folder(
    pool: &PgPool,
    input: &FolderInput,
    created_by_id: i64,
) -> Result<Folder, sqlx::Error> {
    sqlx::query_as::<_, Folder>(
        "INSERT INTO folders (name, parent_id, created_by_id) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(input.name.as_deref().unwrap_or_default())
    .bind(input.parent_id)
    .bind(created_by_id)
    .fetch_one(pool)
    .await
}

pub async fn get_folder(pool: &PgPool, id: i64) -> Result<Option<Folder>, sqlx::Error> {
    sqlx::query_as::<_, Folder>("SELECT * FROM folders WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn update_folder(
    pool: &PgPool,
    id: i64,
    input: &FolderInput,
) -> Result<Option<Folder>, sqlx::Error> {
    sqlx::query_as::<_, Folder>(
        r#"
        UPDATE folders SET
            name = COALESCE($2, name),
            parent_id = COALESCE($3, parent_id),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&input.name)
    .bind(input.parent_id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_folder(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM folders WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_folders(
    pool: &PgPool,
    filter: &FolderFilter,
    page: PageRequest,
) -> Result<Vec<Folder>, sqlx::Error> {
    let query = format!(
        "SELECT * FROM folders WHERE {FOLDER_FILTER_SQL} ORDER BY name ASC, id ASC LIMIT $4 OFFSET $5"
    );
    sqlx::query_as::<_, Folder>(&query)
        .bind(filter.parent)
        .bind(filter.created_by)
        .bind(search_pattern(filter.search.as_deref()))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await
}

pub async fn count_folders(pool: &PgPool, filter: &FolderFilter) -> Result<i64, sqlx::Error> {
    let query = format!("SELECT COUNT(*) FROM folders WHERE {FOLDER_FILTER_SQL}");
    let count: (i64,) = sqlx::query_as(&query)
        .bind(filter.parent)
        .bind(filter.created_by)
        .bind(search_pattern(filter.search.as_deref()))
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

pub async fn create_document(pool: &PgPool, input: &NewDocument) -> Result<Document, sqlx::Error> {
    sqlx::query_as::<_, Document>(
        r#"
        INSERT INTO documents (
            title, description, file_path, file_type, file_size, uploaded_by_id, folder_id
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(&input.title)
    .bind(&input.description)
    .bind(&input.file_path)
    .bind(&input.file_type)
    .bind(input.file_size)
    .bind(input.uploaded_by_id)
    .bind(input.folder_id)
    .fetch_one(pool)
    .await
}

pub async fn get_document(pool: &PgPool, id: i64) -> Result<Option<Document>, sqlx::Error> {
    sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn update_document(
    pool: &PgPool,
    id: i64,
    patch: &DocumentPatch,
) -> Result<Option<Document>, sqlx::Error> {
    sqlx::query_as::<_, Document>(
        r#"
        UPDATE documents SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            folder_id = COALESCE($4, folder_id),
            is_active = COALESCE($5, is_active),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&patch.title)
    .bind(&patch.description)
    .bind(patch.folder_id)
    .bind(patch.is_active)
    .fetch_optional(pool)
    .await
}

/// Delete the row, returning it so the caller can remove the stored file.
pub async fn delete_document(pool: &PgPool, id: i64) -> Result<Option<Document>, sqlx::Error> {
    sqlx::query_as::<_, Document>("DELETE FROM documents WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_documents(
    pool: &PgPool,
    filter: &DocumentFilter,
    page: PageRequest,
) -> Result<Vec<Document>, sqlx::Error> {
    let query = format!(
        "SELECT * FROM documents WHERE {DOCUMENT_FILTER_SQL} ORDER BY created_at DESC, id DESC LIMIT $5 OFFSET $6"
    );
    sqlx::query_as::<_, Document>(&query)
        .bind(filter.folder)
        .bind(filter.uploaded_by)
        .bind(&filter.file_type)
        .bind(search_pattern(filter.search.as_deref()))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(pool)
        .await
}

pub async fn count_documents(pool: &PgPool, filter: &DocumentFilter) -> Result<i64, sqlx::Error> {
    let query = format!("SELECT COUNT(*) FROM documents WHERE {DOCUMENT_FILTER_SQL}");
    let count: (i64,) = sqlx::query_as(&query)
        .bind(filter.folder)
        .bind(filter.uploaded_by)
        .bind(&filter.file_type)
        .bind(search_pattern(filter.search.as_deref()))
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}
