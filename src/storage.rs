use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    error::DisplayErrorContext,
    presigning::PresigningConfig,
    Client,
};
use aws_smithy_types::{byte_stream::ByteStream, DateTime as SmithyDateTime};
use bytes::Bytes;
use futures::{stream, Stream, StreamExt};
use time::OffsetDateTime;
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument};

use crate::config::S3Config;
use crate::errors::AppError;

/// Object body as a lazily pulled stream of chunks.
pub type ObjectBody = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Listing results; finite, lazy and consumed once.
pub type ObjectListing = Pin<Box<dyn Stream<Item = Result<ObjectSummary, AppError>> + Send>>;

pub struct StoredObject {
    pub content_type: String,
    pub content_length: Option<u64>,
    pub body: ObjectBody,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSummary {
    pub key: String,
    pub url: String,
    pub size: u64,
    pub last_modified: Option<OffsetDateTime>,
}

/// Thin adapter over an object store. Holds no per-request state.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Stores `body` under `key`, returning the object's public URL.
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> Result<String, AppError>;

    /// Fails with `NotFound` when the key is absent.
    async fn get_object(&self, key: &str) -> Result<StoredObject, AppError>;

    /// Returns whether an object was actually removed; a missing key is `Ok(false)`.
    async fn delete_object(&self, key: &str) -> Result<bool, AppError>;

    fn list_objects(&self, prefix: &str, max_results: usize) -> ObjectListing;

    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, AppError>;

    /// Never fails; any lookup error reads as absent.
    async fn exists(&self, key: &str) -> bool;

    fn public_url(&self, key: &str) -> String;
}

#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    base_url: String,
}

impl S3Storage {
    pub async fn new(cfg: &S3Config) -> anyhow::Result<Self> {
        let mut loader = defaults(BehaviorVersion::latest()).region(Region::new(cfg.region.clone()));
        if let (Some(access_key), Some(secret_key)) = (&cfg.access_key_id, &cfg.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key.as_str(),
                secret_key.as_str(),
                None,
                None,
                "static",
            ));
        }
        if let Some(endpoint) = &cfg.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let mut builder = S3ConfigBuilder::from(&shared);
        if let Some(endpoint) = &cfg.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: cfg.bucket.clone(),
            base_url: public_base_url(cfg),
        })
    }

    async fn head(&self, key: &str) -> Result<bool, AppError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().map(|se| se.is_not_found()).unwrap_or(false) => {
                Ok(false)
            }
            Err(e) => Err(AppError::storage(format!(
                "Failed to look up object in S3: {}",
                DisplayErrorContext(&e)
            ))),
        }
    }
}

/// `https://{bucket}.s3.{region}.amazonaws.com`, or `{endpoint}/{bucket}` for S3-compatible hosts.
pub fn public_base_url(cfg: &S3Config) -> String {
    match &cfg.endpoint_url {
        Some(endpoint) => format!("{}/{}", endpoint, cfg.bucket),
        None => format!("https://{}.s3.{}.amazonaws.com", cfg.bucket, cfg.region),
    }
}

#[async_trait]
impl StorageGateway for S3Storage {
    #[instrument(skip(self, body, metadata), fields(size = body.len()))]
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> Result<String, AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .set_metadata(Some(metadata))
            .send()
            .await
            .map_err(|e| {
                AppError::storage(format!(
                    "Failed to upload image to S3: {}",
                    DisplayErrorContext(&e)
                ))
            })?;
        debug!(key, "s3 put_object ok");
        Ok(self.public_url(key))
    }

    #[instrument(skip(self))]
    async fn get_object(&self, key: &str) -> Result<StoredObject, AppError> {
        let out = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(out) => out,
            Err(e) if e.as_service_error().map(|se| se.is_no_such_key()).unwrap_or(false) => {
                return Err(AppError::not_found("Image not found in S3"));
            }
            Err(e) => {
                return Err(AppError::storage(format!(
                    "Failed to download image from S3: {}",
                    DisplayErrorContext(&e)
                )))
            }
        };

        let content_type = out
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let content_length = out.content_length().and_then(|n| u64::try_from(n).ok());
        let reader = out.body.into_async_read();

        Ok(StoredObject {
            content_type,
            content_length,
            body: Box::pin(ReaderStream::new(reader)),
        })
    }

    #[instrument(skip(self))]
    async fn delete_object(&self, key: &str) -> Result<bool, AppError> {
        // S3 deletes are silent on missing keys, so look first to report what happened.
        if !self.head(key).await? {
            return Ok(false);
        }
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                AppError::storage(format!(
                    "Failed to delete image from S3: {}",
                    DisplayErrorContext(&e)
                ))
            })?;
        debug!(key, "s3 delete_object ok");
        Ok(true)
    }

    fn list_objects(&self, prefix: &str, max_results: usize) -> ObjectListing {
        let state = ListState {
            client: self.client.clone(),
            bucket: self.bucket.clone(),
            base_url: self.base_url.clone(),
            prefix: prefix.to_string(),
            token: None,
            buffered: VecDeque::new(),
            remaining: max_results,
            exhausted: max_results == 0,
        };

        Box::pin(stream::unfold(state, |mut st| async move {
            loop {
                if st.remaining == 0 {
                    return None;
                }
                if let Some(item) = st.buffered.pop_front() {
                    st.remaining -= 1;
                    return Some((Ok(item), st));
                }
                if st.exhausted {
                    return None;
                }
                if let Err(e) = st.fetch_page().await {
                    st.exhausted = true;
                    st.remaining = 0;
                    return Some((Err(e), st));
                }
            }
        }))
    }

    #[instrument(skip(self))]
    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, AppError> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| AppError::invalid(format!("Invalid expiration: {}", e)))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| {
                AppError::storage(format!(
                    "Failed to generate presigned URL: {}",
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(presigned.uri().to_string())
    }

    #[instrument(skip(self))]
    async fn exists(&self, key: &str) -> bool {
        match self.head(key).await {
            Ok(found) => found,
            Err(e) => {
                debug!(error = %e, "head_object failed; reporting absent");
                false
            }
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

struct ListState {
    client: Client,
    bucket: String,
    base_url: String,
    prefix: String,
    token: Option<String>,
    buffered: VecDeque<ObjectSummary>,
    remaining: usize,
    exhausted: bool,
}

impl ListState {
    async fn fetch_page(&mut self) -> Result<(), AppError> {
        let page_size = self.remaining.min(1000) as i32;
        let out = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&self.prefix)
            .max_keys(page_size)
            .set_continuation_token(self.token.take())
            .send()
            .await
            .map_err(|e| {
                AppError::storage(format!(
                    "Failed to list images from S3: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        for obj in out.contents() {
            let Some(key) = obj.key() else { continue };
            self.buffered.push_back(ObjectSummary {
                key: key.to_string(),
                url: format!("{}/{}", self.base_url, key),
                size: obj.size().and_then(|s| u64::try_from(s).ok()).unwrap_or(0),
                last_modified: obj.last_modified().and_then(to_offset_datetime),
            });
        }

        self.token = out.next_continuation_token().map(str::to_string);
        if !out.is_truncated().unwrap_or(false) || self.token.is_none() {
            self.exhausted = true;
        }
        Ok(())
    }
}

fn to_offset_datetime(dt: &SmithyDateTime) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(dt.as_nanos()).ok()
}

/// Collects a listing, stopping at the first error.
pub async fn collect_listing(mut listing: ObjectListing) -> Result<Vec<ObjectSummary>, AppError> {
    let mut out = Vec::new();
    while let Some(item) = listing.next().await {
        out.push(item?);
    }
    Ok(out)
}
