use time::OffsetDateTime;
use uuid::Uuid;

use super::validation::{validate_key, MAX_KEY_LEN};
use crate::errors::AppError;

/// `img_{16 random hex}_{unix seconds}`.
pub fn generate_image_id(now: OffsetDateTime) -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("img_{}_{}", &token[..16], now.unix_timestamp())
}

/// Last segment of a client-supplied filename. Browsers on Windows may send the full local path.
pub fn base_filename(raw: &str) -> Result<&str, AppError> {
    let name = raw
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(raw)
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(AppError::invalid("Filename must not be empty"));
    }
    Ok(name)
}

/// Builds `images/{YYYY}/{MM}/{DD}/{image_id}_{filename}` for the UTC date of `now`.
/// Every key returned here passes `validate_key`.
pub fn derive_storage_key(
    image_id: &str,
    filename: &str,
    now: OffsetDateTime,
) -> Result<String, AppError> {
    if filename.trim().is_empty() {
        return Err(AppError::invalid("Filename must not be empty"));
    }
    if filename.contains(|c: char| c == '/' || c == '\\') {
        return Err(AppError::invalid("Filename must not contain path separators"));
    }
    if image_id.is_empty() {
        return Err(AppError::invalid("Image id must not be empty"));
    }
    let date = now.to_offset(time::UtcOffset::UTC).date();
    let key = format!(
        "images/{:04}/{:02}/{:02}/{}_{}",
        date.year(),
        u8::from(date.month()),
        date.day(),
        image_id,
        filename
    );
    if key.len() > MAX_KEY_LEN {
        return Err(AppError::invalid(format!(
            "Filename is too long; the storage key may not exceed {} bytes",
            MAX_KEY_LEN
        )));
    }
    validate_key(&key)?;
    Ok(key)
}

/// Recovers the original filename from a derived key, falling back to the last segment.
pub fn filename_from_key<'a>(key: &'a str, image_id: &str) -> &'a str {
    let last = key.rsplit('/').next().unwrap_or(key);
    last.strip_prefix(image_id)
        .and_then(|rest| rest.strip_prefix('_'))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(last)
}
