use std::time::Duration;

use crate::config::ImageLimits;
use crate::errors::AppError;

pub const MAX_KEY_LEN: usize = 1024;
pub const MAX_LIST_RESULTS: usize = 1000;

/// Lowercased extension after the last dot, empty when there is none.
pub fn file_extension(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_lowercase(),
        _ => String::new(),
    }
}

pub fn validate_extension(limits: &ImageLimits, filename: &str) -> Result<(), AppError> {
    let ext = file_extension(filename);
    if limits.allowed_extensions.iter().any(|a| *a == ext) {
        return Ok(());
    }
    Err(AppError::UnsupportedMediaType(format!(
        "File type not allowed. Allowed types: {}",
        limits.allowed_extensions.join(", ")
    )))
}

pub fn validate_size(limits: &ImageLimits, size: u64) -> Result<(), AppError> {
    if size <= limits.max_file_size {
        return Ok(());
    }
    Err(AppError::PayloadTooLarge(format!(
        "File size exceeds maximum allowed size of {}MB",
        limits.max_file_size_mb()
    )))
}

pub fn validate_expiration(limits: &ImageLimits, seconds: u64) -> Result<Duration, AppError> {
    if limits.presign_expiration.contains(&seconds) {
        return Ok(Duration::from_secs(seconds));
    }
    Err(AppError::invalid(format!(
        "expiration must be between {} and {} seconds",
        limits.presign_expiration.start(),
        limits.presign_expiration.end()
    )))
}

pub fn validate_max_results(max_results: usize) -> Result<usize, AppError> {
    if (1..=MAX_LIST_RESULTS).contains(&max_results) {
        return Ok(max_results);
    }
    Err(AppError::invalid(format!(
        "max_results must be between 1 and {}",
        MAX_LIST_RESULTS
    )))
}

/// Sanity checks for client-supplied object keys.
pub fn validate_key(key: &str) -> Result<(), AppError> {
    if key.is_empty() {
        return Err(AppError::invalid("s3_key is required"));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(AppError::invalid("s3_key is too long (max 1024)"));
    }
    if key.starts_with('/') || key.contains('\\') || key.split('/').any(|seg| seg == "..") {
        return Err(AppError::invalid("s3_key contains an invalid path"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ImageLimits {
        ImageLimits {
            max_file_size: 10 * 1024 * 1024,
            allowed_extensions: vec!["jpg".into(), "jpeg".into(), "png".into(), "gif".into(), "webp".into()],
            presign_expiration: 60..=604_800,
            metadata_enabled: false,
        }
    }

    #[test]
    fn allowed_extensions_accept_any_case() {
        let l = limits();
        for name in ["a.jpg", "a.JPG", "b.Jpeg", "c.png", "d.GIF", "e.webP", "dir.v2.png"] {
            assert!(validate_extension(&l, name).is_ok(), "{name} should pass");
        }
    }

    #[test]
    fn other_extensions_are_unsupported() {
        let l = limits();
        for name in ["a.bmp", "a.exe", "noext", ".jpg", "a.jpg.txt", "a."] {
            let err = validate_extension(&l, name).unwrap_err();
            assert!(matches!(err, AppError::UnsupportedMediaType(_)), "{name}");
        }
    }

    #[test]
    fn size_limit_is_inclusive() {
        let l = limits();
        assert!(validate_size(&l, 0).is_ok());
        assert!(validate_size(&l, 10 * 1024 * 1024).is_ok());
        let err = validate_size(&l, 10 * 1024 * 1024 + 1).unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge(_)));
        assert!(err.to_string().contains("10MB"));
    }

    #[test]
    fn expiration_bounds() {
        let l = limits();
        assert!(matches!(validate_expiration(&l, 59), Err(AppError::InvalidInput(_))));
        assert_eq!(validate_expiration(&l, 60).unwrap(), Duration::from_secs(60));
        assert_eq!(
            validate_expiration(&l, 604_800).unwrap(),
            Duration::from_secs(604_800)
        );
        assert!(matches!(validate_expiration(&l, 604_801), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn max_results_bounds() {
        assert!(validate_max_results(0).is_err());
        assert_eq!(validate_max_results(1).unwrap(), 1);
        assert_eq!(validate_max_results(1000).unwrap(), 1000);
        assert!(validate_max_results(1001).is_err());
    }

    #[test]
    fn keys_are_sanity_checked() {
        assert!(validate_key("images/2026/02/20/img_x_photo.jpg").is_ok());
        assert!(validate_key("images/a..b.jpg").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/images/a.jpg").is_err());
        assert!(validate_key("images/../secret").is_err());
        assert!(validate_key("images\\a.jpg").is_err());
        assert!(validate_key(&"a".repeat(1025)).is_err());
    }
}
