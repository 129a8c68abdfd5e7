use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

/// What an upload produced. The object store is the source of truth for existence.
#[derive(Debug, Clone, Serialize)]
pub struct ImageDescriptor {
    pub image_id: String,
    pub original_filename: String,
    pub storage_key: String,
    pub content_type: String,
    pub size_bytes: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Variant name -> URL. Only `original` is written; resized renditions are not produced.
pub type Variants = BTreeMap<String, String>;

/// Row in the optional `images` metadata table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ImageRecord {
    pub id: Uuid,
    pub image_id: String,
    pub filename: String,
    pub s3_key: String,
    pub s3_url: String,
    pub variants: Option<Json<Variants>>,
    pub file_size: Option<i64>,
    pub content_type: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
