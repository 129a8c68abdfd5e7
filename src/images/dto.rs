use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageUploadResponse {
    pub image_id: String,
    pub filename: String,
    pub s3_key: String,
    pub s3_url: String,
    pub file_size: u64,
    pub content_type: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ImageBase64Upload {
    pub filename: String,
    pub base64_data: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// `?s3_key=` on download / delete / check.
#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    #[serde(default)]
    pub s3_key: String,
}

#[derive(Debug, Deserialize)]
pub struct PresignQuery {
    #[serde(default)]
    pub s3_key: String,
    #[serde(default = "default_expiration")]
    pub expiration: u64,
}
fn default_expiration() -> u64 { 3600 }

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}
fn default_prefix() -> String { "images/".into() }
fn default_max_results() -> usize { 100 }

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageDeleteResponse {
    pub image_id: String,
    pub message: String,
    pub deleted_from_s3: bool,
    pub deleted_from_db: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageListItem {
    pub s3_key: String,
    pub s3_url: String,
    pub size: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_modified: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageListResponse {
    pub count: usize,
    pub images: Vec<ImageListItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PresignedUrlResponse {
    pub image_id: String,
    pub presigned_url: String,
    pub expires_in: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageCheckResponse {
    pub image_id: String,
    pub s3_key: String,
    pub exists: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageServiceHealth {
    pub status: String,
    pub service: String,
    pub s3_bucket: String,
    pub s3_region: String,
    pub max_file_size_mb: f64,
    pub allowed_extensions: Vec<String>,
    pub metadata_enabled: bool,
}
