// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Folders and uploaded documents.
//!
//! Files live under `<media dir>/documents/`; the database keeps the path
//! relative to the media dir.

use std::path::{Component, Path as FsPath, PathBuf};

use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;

use mint_crm_core::db;
use mint_crm_core::models::{
    Document, DocumentFilter, DocumentPatch, Folder, FolderFilter, FolderInput, NewDocument, User,
    file_type_of,
};

use super::{PageParams, Paginated, no_content};
use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{AppJson, AppQuery};
use crate::state::AppState;

const DOCUMENTS_SUBDIR: &str = "documents";

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

// Folders

pub async fn list_folders(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
    AppQuery(filter): AppQuery<FolderFilter>,
) -> ApiResult<Json<Paginated<Folder>>> {
    let page = page.request();
    let count = db::documents::count_folders(&state.pool, &filter).await?;
    let folders = db::documents::list_folders(&state.pool, &filter, page).await?;
    Ok(Json(Paginated::new(count, page, folders)))
}

pub async fn get_folder(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Folder>> {
    let folder = db::documents::get_folder(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Folder"))?;
    Ok(Json(folder))
}

pub async fn create_folder(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(input): AppJson<FolderInput>,
) -> ApiResult<(StatusCode, Json<Folder>)> {
    let actor = user.require_agent()?;
    if input.name.as_deref().is_none_or(|n| n.trim().is_empty()) {
        return Err(ApiError::bad_request("Folder name is required"));
    }
    let folder = db::documents::create_folder(&state.pool, &input, actor.id).await?;
    Ok((StatusCode::CREATED, Json(folder)))
}

pub async fn update_folder(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    AppJson(input): AppJson<FolderInput>,
) -> ApiResult<Json<Folder>> {
    user.require_agent()?;
    if input.parent_id == Some(id) {
        return Err(ApiError::bad_request("A folder cannot be its own parent"));
    }
    let folder = db::documents::update_folder(&state.pool, id, &input)
        .await?
        .ok_or_else(|| ApiError::not_found("Folder"))?;
    Ok(Json(folder))
}

pub async fn delete_folder(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    user.require_agent()?;
    if !db::documents::delete_folder(&state.pool, id).await? {
        return Err(ApiError::not_found("Folder"));
    }
    Ok(no_content())
}

// Documents

async fn document(state: &AppState, id: i64) -> ApiResult<Document> {
    db::documents::get_document(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Document"))
}

fn can_manage(user: &User, document: &Document) -> bool {
    user.is_manager() || document.uploaded_by_id == user.id
}

pub async fn list_documents(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppQuery(page): AppQuery<PageParams>,
    AppQuery(filter): AppQuery<DocumentFilter>,
) -> ApiResult<Json<Paginated<Document>>> {
    let page = page.request();
    let count = db::documents::count_documents(&state.pool, &filter).await?;
    let documents = db::documents::list_documents(&state.pool, &filter, page).await?;
    Ok(Json(Paginated::new(count, page, documents)))
}

pub async fn get_document(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Document>> {
    Ok(Json(document(&state, id).await?))
}

/// Keep a client-supplied file name to one safe path segment.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
}

#[derive(Default)]
struct Upload {
    file_name: Option<String>,
    data: Option<bytes::Bytes>,
    title: Option<String>,
    description: Option<String>,
    folder_id: Option<i64>,
}

async fn read_upload(mut multipart: Multipart) -> ApiResult<Upload> {
    let mut upload = Upload::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                upload.file_name = field.file_name().map(str::to_string);
                upload.data = Some(field.bytes().await.map_err(multipart_error)?);
            }
            "title" => upload.title = Some(field.text().await.map_err(multipart_error)?),
            "description" => {
                upload.description = Some(field.text().await.map_err(multipart_error)?)
            }
            "folder_id" | "folder" => {
                let text = field.text().await.map_err(multipart_error)?;
                let text = text.trim();
                if !text.is_empty() {
                    upload.folder_id = Some(
                        text.parse()
                            .map_err(|_| ApiError::bad_request("folder_id must be an integer"))?,
                    );
                }
            }
            _ => {}
        }
    }
    Ok(upload)
}

/// `POST /api/documents/` (multipart: `file`, `title?`, `description?`, `folder_id?`)
pub async fn upload_document(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Document>)> {
    let actor = user.require_agent()?;
    let upload = read_upload(multipart).await?;
    let data = upload
        .data
        .ok_or_else(|| ApiError::bad_request("No file provided"))?;
    let original_name = upload.file_name.unwrap_or_else(|| "upload".to_string());

    if let Some(folder_id) = upload.folder_id {
        db::documents::get_folder(&state.pool, folder_id)
            .await?
            .ok_or_else(|| ApiError::bad_request("Folder does not exist"))?;
    }

    let stored_name = format!(
        "{}-{}",
        uuid::Uuid::new_v4().simple(),
        sanitize_file_name(&original_name)
    );
    let relative = format!("{DOCUMENTS_SUBDIR}/{stored_name}");
    let dir = state.media_dir.join(DOCUMENTS_SUBDIR);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to create media directory: {e}")))?;
    let full_path = dir.join(&stored_name);
    tokio::fs::write(&full_path, &data)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to store file: {e}")))?;

    let title = upload
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| original_name.clone());
    let created = db::documents::create_document(
        &state.pool,
        &NewDocument {
            title,
            description: upload.description.unwrap_or_default(),
            file_path: relative,
            file_type: file_type_of(&original_name),
            file_size: i64::try_from(data.len()).unwrap_or(i64::MAX),
            uploaded_by_id: actor.id,
            folder_id: upload.folder_id,
        },
    )
    .await;

    match created {
        Ok(document) => {
            tracing::info!(
                document_id = document.id,
                size = document.file_size,
                "Document uploaded"
            );
            Ok((StatusCode::CREATED, Json(document)))
        }
        Err(e) => {
            if let Err(io) = tokio::fs::remove_file(&full_path).await {
                tracing::warn!(
                    path = %full_path.display(),
                    error = %io,
                    "Failed to remove orphaned upload"
                );
            }
            Err(e.into())
        }
    }
}

pub async fn update_document(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    AppJson(patch): AppJson<DocumentPatch>,
) -> ApiResult<Json<Document>> {
    let existing = document(&state, id).await?;
    if !can_manage(&user, &existing) {
        return Err(ApiError::forbidden());
    }
    if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ApiError::bad_request("Title is required"));
    }
    let updated = db::documents::update_document(&state.pool, id, &patch)
        .await?
        .ok_or_else(|| ApiError::not_found("Document"))?;
    Ok(Json(updated))
}

/// Deletes the row, then the stored file.
pub async fn delete_document(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let existing = document(&state, id).await?;
    if !can_manage(&user, &existing) {
        return Err(ApiError::forbidden());
    }
    let deleted = db::documents::delete_document(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Document"))?;

    if let Some(path) = resolve_media_path(&state.media_dir, &deleted.file_path) {
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!(document_id = id, error = %e, "Failed to remove document file");
        }
    }
    Ok(no_content())
}

/// Join a stored relative path onto the media dir, refusing anything that
/// would escape it.
fn resolve_media_path(media_dir: &FsPath, relative: &str) -> Option<PathBuf> {
    let relative = FsPath::new(relative);
    if relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        Some(media_dir.join(relative))
    } else {
        None
    }
}

fn content_type_for(file_type: &str) -> &'static str {
    match file_type {
        "pdf" => "application/pdf",
        "txt" | "log" => "text/plain; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "zip" => "application/zip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

/// `GET /api/documents/{id}/download/`
pub async fn download(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let document = document(&state, id).await?;
    let path = resolve_media_path(&state.media_dir, &document.file_path)
        .ok_or_else(|| ApiError::not_found("File"))?;
    let file = tokio::fs::File::open(&path).await.map_err(|e| {
        tracing::warn!(
            document_id = id,
            path = %path.display(),
            error = %e,
            "Document file missing"
        );
        ApiError::not_found("File")
    })?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.split_once('-').map(|(_, rest)| rest))
        .unwrap_or("download");
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(content_type_for(&document.file_type)),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("report.pdf"), "report.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\temp\\my file.txt"), "my_file.txt");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "upload");
    }

    #[test]
    fn test_resolve_media_path_stays_inside() {
        let media = FsPath::new("/srv/media");
        assert_eq!(
            resolve_media_path(media, "documents/a.pdf"),
            Some(PathBuf::from("/srv/media/documents/a.pdf"))
        );
        assert_eq!(resolve_media_path(media, "../secret"), None);
        assert_eq!(resolve_media_path(media, "/etc/passwd"), None);
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("pdf"), "application/pdf");
        assert_eq!(content_type_for("bin"), "application/octet-stream");
    }
}
