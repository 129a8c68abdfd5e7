use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};

/// Longest presign window S3 accepts (seven days).
pub const MAX_PRESIGN_SECONDS: u64 = 604_800;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    pub max_overflow: u32,
    pub pre_ping: bool,
    pub recycle: Duration,
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub region: String,
    pub bucket: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Custom S3-compatible endpoint (MinIO etc.); path-style addressing is used when set.
    pub endpoint_url: Option<String>,
}

/// Limits applied to uploads and presigned links.
#[derive(Debug, Clone)]
pub struct ImageLimits {
    pub max_file_size: u64,
    pub allowed_extensions: Vec<String>,
    pub presign_expiration: RangeInclusive<u64>,
    pub metadata_enabled: bool,
}

impl ImageLimits {
    pub fn max_file_size_mb(&self) -> f64 {
        self.max_file_size as f64 / (1024.0 * 1024.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub app_version: String,
    pub environment: String,
    pub database: DatabaseConfig,
    pub s3: S3Config,
    pub images: ImageLimits,
    pub cors_origins: CorsOrigins,
    pub secret_key: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database = DatabaseConfig {
            url: lookup("DATABASE_URL").context("DATABASE_URL is not set")?,
            pool_size: parse_or(&lookup, "DATABASE_POOL_SIZE", 5)?,
            max_overflow: parse_or(&lookup, "DATABASE_MAX_OVERFLOW", 10)?,
            pre_ping: parse_or(&lookup, "DATABASE_POOL_PRE_PING", true)?,
            recycle: Duration::from_secs(parse_or(&lookup, "DATABASE_POOL_RECYCLE", 3600)?),
        };

        let s3 = S3Config {
            region: lookup("AWS_REGION").unwrap_or_else(|| "eu-north-1".into()),
            bucket: lookup("AWS_S3_BUCKET_NAME").unwrap_or_else(|| "sports-images-test".into()),
            access_key_id: non_empty(lookup("AWS_ACCESS_KEY_ID")),
            secret_access_key: non_empty(lookup("AWS_SECRET_ACCESS_KEY")),
            endpoint_url: non_empty(lookup("AWS_S3_ENDPOINT_URL"))
                .map(|v| v.trim_end_matches('/').to_string()),
        };

        let presign_min: u64 = parse_or(&lookup, "PRESIGN_MIN_EXPIRATION", 60)?;
        let presign_max: u64 = parse_or(&lookup, "PRESIGN_MAX_EXPIRATION", MAX_PRESIGN_SECONDS)?;
        if presign_min < 1 || presign_max > MAX_PRESIGN_SECONDS || presign_min > presign_max {
            bail!(
                "PRESIGN_MIN_EXPIRATION/PRESIGN_MAX_EXPIRATION must satisfy 1 <= min <= max <= {}, got {}..={}",
                MAX_PRESIGN_SECONDS,
                presign_min,
                presign_max
            );
        }

        let images = ImageLimits {
            max_file_size: parse_or(&lookup, "AWS_S3_MAX_FILE_SIZE", 10 * 1024 * 1024)?,
            allowed_extensions: parse_extensions(
                &lookup("AWS_S3_ALLOWED_EXTENSIONS").unwrap_or_else(|| "jpg,jpeg,png,gif,webp".into()),
            ),
            presign_expiration: presign_min..=presign_max,
            metadata_enabled: parse_or(&lookup, "IMAGE_METADATA_ENABLED", false)?,
        };

        Ok(Self {
            app_name: lookup("APP_NAME").unwrap_or_else(|| "EduSportsConnect API".into()),
            app_version: lookup("APP_VERSION").unwrap_or_else(|| "1.0.0".into()),
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".into()),
            database,
            s3,
            images,
            cors_origins: parse_origins(&lookup("ALLOWED_ORIGINS").unwrap_or_else(|| "*".into())),
            secret_key: non_empty(lookup("SECRET_KEY")),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid value for {}: {} ({})", key, raw, e)),
        _ => Ok(default),
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

fn parse_origins(raw: &str) -> CorsOrigins {
    let origins: Vec<String> = raw
        .split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();
    if origins.iter().any(|o| o == "*") {
        return CorsOrigins::Any;
    }
    CorsOrigins::List(origins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = load(&[("DATABASE_URL", "postgres://localhost/test")]).unwrap();
        assert_eq!(cfg.s3.region, "eu-north-1");
        assert_eq!(cfg.s3.bucket, "sports-images-test");
        assert_eq!(cfg.images.max_file_size, 10_485_760);
        assert_eq!(cfg.images.allowed_extensions, vec!["jpg", "jpeg", "png", "gif", "webp"]);
        assert_eq!(cfg.images.presign_expiration, 60..=604_800);
        assert!(!cfg.images.metadata_enabled);
        assert_eq!(cfg.database.pool_size, 5);
        assert_eq!(cfg.database.max_overflow, 10);
        assert_eq!(cfg.cors_origins, CorsOrigins::Any);
        assert!(cfg.secret_key.is_none());
    }

    #[test]
    fn missing_database_url_fails() {
        let err = load(&[]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn extensions_are_normalized() {
        let cfg = load(&[
            ("DATABASE_URL", "postgres://localhost/test"),
            ("AWS_S3_ALLOWED_EXTENSIONS", " JPG, .Png ,,webp "),
        ])
        .unwrap();
        assert_eq!(cfg.images.allowed_extensions, vec!["jpg", "png", "webp"]);
    }

    #[test]
    fn origins_are_split() {
        let cfg = load(&[
            ("DATABASE_URL", "postgres://localhost/test"),
            ("ALLOWED_ORIGINS", "http://localhost:3000, https://app.example.com"),
        ])
        .unwrap();
        assert_eq!(
            cfg.cors_origins,
            CorsOrigins::List(vec![
                "http://localhost:3000".into(),
                "https://app.example.com".into()
            ])
        );
    }

    #[test]
    fn bad_number_names_the_key() {
        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/test"),
            ("AWS_S3_MAX_FILE_SIZE", "ten megs"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("AWS_S3_MAX_FILE_SIZE"));
    }

    #[test]
    fn presign_window_is_checked() {
        assert!(load(&[
            ("DATABASE_URL", "postgres://localhost/test"),
            ("PRESIGN_MAX_EXPIRATION", "604801"),
        ])
        .is_err());
        assert!(load(&[
            ("DATABASE_URL", "postgres://localhost/test"),
            ("PRESIGN_MIN_EXPIRATION", "900"),
            ("PRESIGN_MAX_EXPIRATION", "600"),
        ])
        .is_err());
    }

    #[test]
    fn endpoint_trailing_slash_is_trimmed() {
        let cfg = load(&[
            ("DATABASE_URL", "postgres://localhost/test"),
            ("AWS_S3_ENDPOINT_URL", "http://minio:9000/"),
        ])
        .unwrap();
        assert_eq!(cfg.s3.endpoint_url.as_deref(), Some("http://minio:9000"));
    }
}
