// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Uploaded files and the folders they live in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Folder {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub created_by_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FolderInput {
    pub name: Option<String>,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FolderFilter {
    pub parent: Option<i64>,
    pub created_by: Option<i64>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Path relative to the media directory.
    pub file_path: String,
    pub file_type: String,
    pub file_size: i64,
    pub uploaded_by_id: i64,
    pub folder_id: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub title: String,
    pub description: String,
    pub file_path: String,
    pub file_type: String,
    pub file_size: i64,
    pub uploaded_by_id: i64,
    pub folder_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub folder_id: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentFilter {
    pub folder: Option<i64>,
    pub uploaded_by: Option<i64>,
    pub file_type: Option<String>,
    pub search: Option<String>,
}

/// Lower-cased extension of a file name, without the dot.
pub fn file_type_of(file_name: &str) -> String {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}
