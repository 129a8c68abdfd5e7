use lazy_static::lazy_static;
use regex::Regex;

use super::dto::{CreateUserRequest, Pagination, UpdateUserRequest};
use super::repo::UserChanges;
use crate::errors::AppError;

const MAX_NAME_LEN: usize = 100;
const MAX_PAGE: i64 = 1000;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::invalid("Invalid email"));
    }
    Ok(email)
}

fn normalize_name(raw: &str) -> Result<String, AppError> {
    let name = raw.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(AppError::invalid(format!(
            "name must be between 1 and {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

/// Returns the normalized `(name, email)` pair.
pub fn validate_new_user(req: &CreateUserRequest) -> Result<(String, String), AppError> {
    Ok((normalize_name(&req.name)?, normalize_email(&req.email)?))
}

pub fn validate_changes(req: UpdateUserRequest) -> Result<UserChanges, AppError> {
    Ok(UserChanges {
        name: req.name.as_deref().map(normalize_name).transpose()?,
        email: req.email.as_deref().map(normalize_email).transpose()?,
        is_active: req.is_active,
    })
}

pub fn validate_page(p: &Pagination) -> Result<(i64, i64), AppError> {
    if p.skip < 0 {
        return Err(AppError::invalid("skip must not be negative"));
    }
    if !(1..=MAX_PAGE).contains(&p.limit) {
        return Err(AppError::invalid(format!("limit must be between 1 and {}", MAX_PAGE)));
    }
    Ok((p.skip, p.limit))
}
