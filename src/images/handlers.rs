use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use super::dto::{
    ImageBase64Upload, ImageCheckResponse, ImageDeleteResponse, ImageListItem, ImageListResponse,
    ImageServiceHealth, ImageUploadResponse, KeyQuery, ListQuery, PresignQuery,
    PresignedUrlResponse,
};
use super::keys::filename_from_key;
use super::repo_types::ImageRecord;
use super::services::{
    self, decode_base64_upload, upload_image, UploadItem, Uploaded, DEFAULT_CONTENT_TYPE,
};
use super::validation::validate_extension;
use crate::{errors::AppError, state::AppState};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/images/download/:image_id", get(download_image))
        .route("/images/list", get(list_images))
        .route("/images/presigned-url/:image_id", get(presigned_url))
        .route("/images/check/:image_id", get(check_image))
        .route("/images/health", get(images_health))
        .route("/images/:image_id/metadata", get(image_metadata))
}

pub fn write_routes(max_file_size: u64) -> Router<AppState> {
    // base64 inflates by 4/3; leave room for the JSON envelope and multipart framing
    let limit = usize::try_from(max_file_size / 3 * 4 + 64 * 1024).unwrap_or(usize::MAX);
    Router::new()
        .route("/images/upload", post(upload_multipart))
        .route("/images/upload-base64", post(upload_base64))
        .route("/images/:image_id", delete(delete_image))
        .layer(DefaultBodyLimit::max(limit))
}

fn upload_response(up: Uploaded, message: &str) -> ImageUploadResponse {
    ImageUploadResponse {
        image_id: up.image.image_id,
        filename: up.image.original_filename,
        s3_key: up.image.storage_key,
        s3_url: up.url,
        file_size: up.image.size_bytes,
        content_type: up.image.content_type,
        message: message.into(),
    }
}

/// POST /images/upload (multipart, field `file`)
#[instrument(skip(state, mp))]
pub async fn upload_multipart(
    State(state): State<AppState>,
    mut mp: Multipart,
) -> Result<(StatusCode, Json<ImageUploadResponse>), AppError> {
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::invalid(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|f| !f.trim().is_empty())
            .ok_or_else(|| AppError::invalid("file field must carry a filename"))?;
        // reject by extension before buffering the body
        validate_extension(&state.config.images, &filename)?;

        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.into());
        let body = field
            .bytes()
            .await
            .map_err(|e| AppError::invalid(format!("Failed to read uploaded file: {}", e)))?;

        let up = upload_image(
            &state,
            UploadItem {
                filename,
                content_type,
                body,
            },
        )
        .await?;
        return Ok((
            StatusCode::CREATED,
            Json(upload_response(up, "Image uploaded successfully to S3")),
        ));
    }
    Err(AppError::invalid("file is required"))
}

/// POST /images/upload-base64 { filename, base64_data, content_type? }
#[instrument(skip(state, body))]
pub async fn upload_base64(
    State(state): State<AppState>,
    Json(body): Json<ImageBase64Upload>,
) -> Result<(StatusCode, Json<ImageUploadResponse>), AppError> {
    let item = decode_base64_upload(
        &state.config.images,
        body.filename,
        &body.base64_data,
        body.content_type,
    )?;
    let up = upload_image(&state, item).await?;
    Ok((
        StatusCode::CREATED,
        Json(upload_response(up, "Base64 image uploaded successfully to S3")),
    ))
}

/// GET /images/download/:image_id?s3_key=
#[instrument(skip(state))]
pub async fn download_image(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
    Query(q): Query<KeyQuery>,
) -> Result<Response, AppError> {
    let obj = services::download_image(&state, &q.s3_key).await?;

    let mut resp = Response::new(Body::from_stream(obj.body));
    let headers = resp.headers_mut();
    if let Ok(ct) = HeaderValue::from_str(&obj.content_type) {
        headers.insert(header::CONTENT_TYPE, ct);
    }
    if let Some(len) = obj.content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }
    let filename = filename_from_key(&q.s3_key, &image_id);
    match HeaderValue::from_str(&content_disposition(filename)) {
        Ok(v) => {
            headers.insert(header::CONTENT_DISPOSITION, v);
        }
        Err(_) => warn!(filename, "filename not representable in Content-Disposition"),
    }
    Ok(resp)
}

/// `inline; filename="..."`, plus an RFC 5987 `filename*` when the name is not plain ASCII.
fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    if ascii == filename {
        format!("inline; filename=\"{}\"", ascii)
    } else {
        format!(
            "inline; filename=\"{}\"; filename*=UTF-8''{}",
            ascii,
            urlencoding::encode(filename)
        )
    }
}

/// DELETE /images/:image_id?s3_key=
#[instrument(skip(state))]
pub async fn delete_image(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
    Query(q): Query<KeyQuery>,
) -> Result<Json<ImageDeleteResponse>, AppError> {
    let deleted = services::delete_image(&state, &image_id, &q.s3_key).await?;
    let message = if deleted.from_storage {
        format!("Image {} deleted successfully from S3", image_id)
    } else {
        format!("Image {} was not present in S3", image_id)
    };
    Ok(Json(ImageDeleteResponse {
        image_id,
        message,
        deleted_from_s3: deleted.from_storage,
        deleted_from_db: deleted.from_metadata,
    }))
}

/// GET /images/list?prefix=&max_results=
#[instrument(skip(state))]
pub async fn list_images(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<ImageListResponse>, AppError> {
    let objects = services::list_images(&state, &q.prefix, q.max_results).await?;
    let images: Vec<ImageListItem> = objects
        .into_iter()
        .map(|o| ImageListItem {
            s3_key: o.key,
            s3_url: o.url,
            size: o.size,
            last_modified: o.last_modified,
        })
        .collect();
    Ok(Json(ImageListResponse {
        count: images.len(),
        images,
    }))
}

/// GET /images/presigned-url/:image_id?s3_key=&expiration=
#[instrument(skip(state))]
pub async fn presigned_url(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
    Query(q): Query<PresignQuery>,
) -> Result<Json<PresignedUrlResponse>, AppError> {
    let presigned_url = services::presign_image(&state, &q.s3_key, q.expiration).await?;
    Ok(Json(PresignedUrlResponse {
        image_id,
        presigned_url,
        expires_in: q.expiration,
    }))
}

/// GET /images/check/:image_id?s3_key=
#[instrument(skip(state))]
pub async fn check_image(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
    Query(q): Query<KeyQuery>,
) -> Result<Json<ImageCheckResponse>, AppError> {
    let exists = services::image_exists(&state, &q.s3_key).await?;
    Ok(Json(ImageCheckResponse {
        image_id,
        s3_key: q.s3_key,
        exists,
        message: if exists {
            "Image found in S3".into()
        } else {
            "Image not found in S3".into()
        },
    }))
}

/// GET /images/:image_id/metadata; 404 unless metadata persistence is enabled and has the row.
#[instrument(skip(state))]
pub async fn image_metadata(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
) -> Result<Json<ImageRecord>, AppError> {
    let Some(store) = &state.metadata else {
        return Err(AppError::not_found("Image metadata is not persisted"));
    };
    store
        .find(&image_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Image not found"))
}

pub async fn images_health(State(state): State<AppState>) -> impl IntoResponse {
    let cfg = &state.config;
    Json(ImageServiceHealth {
        status: "healthy".into(),
        service: "Image Service".into(),
        s3_bucket: cfg.s3.bucket.clone(),
        s3_region: cfg.s3.region.clone(),
        max_file_size_mb: cfg.images.max_file_size_mb(),
        allowed_extensions: cfg.images.allowed_extensions.clone(),
        metadata_enabled: state.metadata.is_some(),
    })
}
