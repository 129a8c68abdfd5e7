use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::repo_types::{ImageDescriptor, ImageRecord, Variants};
use crate::errors::AppError;

/// Optional persistence of upload metadata alongside the stored object.
#[async_trait]
pub trait ImageMetadataStore: Send + Sync {
    async fn record(
        &self,
        image: &ImageDescriptor,
        s3_url: &str,
        variants: &Variants,
    ) -> Result<(), AppError>;

    async fn find(&self, image_id: &str) -> Result<Option<ImageRecord>, AppError>;

    /// Returns whether a row was removed.
    async fn remove(&self, image_id: &str) -> Result<bool, AppError>;
}

#[derive(Clone)]
pub struct PgImageMetadata {
    db: PgPool,
}

impl PgImageMetadata {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ImageMetadataStore for PgImageMetadata {
    async fn record(
        &self,
        image: &ImageDescriptor,
        s3_url: &str,
        variants: &Variants,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO images (id, image_id, filename, s3_key, s3_url, variants, file_size, content_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&image.image_id)
        .bind(&image.original_filename)
        .bind(&image.storage_key)
        .bind(s3_url)
        .bind(Json(variants))
        .bind(i64::try_from(image.size_bytes).unwrap_or(i64::MAX))
        .bind(&image.content_type)
        .bind(image.created_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find(&self, image_id: &str) -> Result<Option<ImageRecord>, AppError> {
        let row = sqlx::query_as::<_, ImageRecord>(
            r#"
            SELECT id, image_id, filename, s3_key, s3_url, variants, file_size, content_type, created_at
              FROM images
             WHERE image_id = $1
            "#,
        )
        .bind(image_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn remove(&self, image_id: &str) -> Result<bool, AppError> {
        let res = sqlx::query("DELETE FROM images WHERE image_id = $1")
            .bind(image_id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
