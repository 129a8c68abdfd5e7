use std::collections::{BTreeMap, HashMap};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use time::OffsetDateTime;
use tracing::{info, warn};

use super::keys::{base_filename, derive_storage_key, generate_image_id};
use super::repo::ImageMetadataStore;
use super::repo_types::ImageDescriptor;
use super::validation::{
    validate_expiration, validate_extension, validate_key, validate_max_results, validate_size,
};
use crate::config::ImageLimits;
use crate::errors::AppError;
use crate::state::AppState;
use crate::storage::{collect_listing, ObjectSummary, StoredObject};

pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug)]
pub struct UploadItem {
    pub filename: String,
    pub content_type: String,
    pub body: Bytes,
}

#[derive(Debug)]
pub struct Uploaded {
    pub image: ImageDescriptor,
    pub url: String,
}

/// Validates, derives a fresh key and stores the object. Shared by both upload routes.
pub async fn upload_image(st: &AppState, item: UploadItem) -> Result<Uploaded, AppError> {
    let limits = &st.config.images;
    let filename = base_filename(&item.filename)?.to_string();
    validate_extension(limits, &filename)?;
    let size = item.body.len() as u64;
    validate_size(limits, size)?;

    let now = OffsetDateTime::now_utc();
    let image_id = generate_image_id(now);
    let key = derive_storage_key(&image_id, &filename, now)?;

    let metadata = HashMap::from([
        ("image_id".to_string(), image_id.clone()),
        ("original_filename".to_string(), filename.clone()),
    ]);
    let url = st
        .storage
        .put_object(&key, item.body, &item.content_type, metadata)
        .await?;

    let image = ImageDescriptor {
        image_id,
        original_filename: filename,
        storage_key: key,
        content_type: item.content_type,
        size_bytes: size,
        created_at: now,
    };
    info!(image_id = %image.image_id, key = %image.storage_key, size, "image uploaded");

    if let Some(store) = &st.metadata {
        let variants = BTreeMap::from([("original".to_string(), url.clone())]);
        if let Err(e) = store.record(&image, &url, &variants).await {
            warn!(error = %e, image_id = %image.image_id, "metadata record failed; object kept");
        }
    }

    Ok(Uploaded { image, url })
}

/// Turns a base64 payload into an upload item. Accepts an optional `data:...;base64,` prefix.
pub fn decode_base64_upload(
    limits: &ImageLimits,
    filename: String,
    base64_data: &str,
    content_type: Option<String>,
) -> Result<UploadItem, AppError> {
    validate_extension(limits, &filename)?;

    let payload = match base64_data.split_once(',') {
        Some((_, data)) => data,
        None => base64_data,
    };
    let decoded = STANDARD
        .decode(payload.trim())
        .map_err(|_| AppError::invalid("Invalid base64 data"))?;
    validate_size(limits, decoded.len() as u64)?;

    let sniffed = infer::get(&decoded)
        .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
        .ok_or_else(|| {
            AppError::invalid("Invalid image data. Please provide a valid base64 encoded image.")
        })?;

    let content_type = content_type
        .filter(|ct| !ct.trim().is_empty())
        .unwrap_or_else(|| sniffed.mime_type().to_string());

    Ok(UploadItem {
        filename,
        content_type,
        body: Bytes::from(decoded),
    })
}

pub async fn download_image(st: &AppState, key: &str) -> Result<StoredObject, AppError> {
    validate_key(key)?;
    st.storage.get_object(key).await
}

pub struct Deleted {
    pub from_storage: bool,
    pub from_metadata: bool,
}

/// Removes the object; with no metadata store configured `from_metadata` is always false.
pub async fn delete_image(st: &AppState, image_id: &str, key: &str) -> Result<Deleted, AppError> {
    validate_key(key)?;
    let from_storage = st.storage.delete_object(key).await?;

    let from_metadata = match &st.metadata {
        Some(store) => remove_matching_record(&**store, image_id, key)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, image_id, "metadata remove failed");
                false
            }),
        None => false,
    };

    info!(image_id, key, from_storage, from_metadata, "image delete");
    Ok(Deleted {
        from_storage,
        from_metadata,
    })
}

/// The row goes only when it describes the object that was addressed.
async fn remove_matching_record(
    store: &dyn ImageMetadataStore,
    image_id: &str,
    key: &str,
) -> Result<bool, AppError> {
    match store.find(image_id).await? {
        Some(row) if row.s3_key == key => store.remove(image_id).await,
        Some(row) => {
            warn!(image_id, key, recorded = %row.s3_key, "metadata row belongs to another key; kept");
            Ok(false)
        }
        None => Ok(false),
    }
}

pub async fn list_images(
    st: &AppState,
    prefix: &str,
    max_results: usize,
) -> Result<Vec<ObjectSummary>, AppError> {
    let max_results = validate_max_results(max_results)?;
    collect_listing(st.storage.list_objects(prefix, max_results)).await
}

pub async fn presign_image(st: &AppState, key: &str, expiration: u64) -> Result<String, AppError> {
    let expires_in = validate_expiration(&st.config.images, expiration)?;
    validate_key(key)?;
    st.storage.presign_get(key, expires_in).await
}

pub async fn image_exists(st: &AppState, key: &str) -> Result<bool, AppError> {
    validate_key(key)?;
    Ok(st.storage.exists(key).await)
}
