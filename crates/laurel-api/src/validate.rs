//! Field validation shared by the account and catalog surfaces. Limits match
//! the stored schema; everything here rejects before a row is written.

use chrono::{Datelike, Utc};

use crate::error::ApiError;

pub const MAX_USERNAME_LEN: usize = 150;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_NAME_LEN: usize = 256;
pub const MAX_SLUG_LEN: usize = 50;
pub const MIN_YEAR: i32 = 1888;

pub fn username(value: &str) -> Result<(), ApiError> {
    if value.is_empty() || value.len() > MAX_USERNAME_LEN {
        return Err(ApiError::validation("username must be 1-150 characters"));
    }
    if !value
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-'))
    {
        return Err(ApiError::validation(
            "username may contain only letters, digits and @/./+/-/_",
        ));
    }
    if value == "me" {
        return Err(ApiError::validation("'me' is a reserved username"));
    }
    Ok(())
}

pub fn email(value: &str) -> Result<(), ApiError> {
    let ok = !value.is_empty()
        && value.len() <= MAX_EMAIL_LEN
        && !value.contains(char::is_whitespace)
        && value.split_once('@').is_some_and(|(local, domain)| {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        });
    if ok {
        Ok(())
    } else {
        Err(ApiError::validation("enter a valid email address"))
    }
}

pub fn name(value: &str) -> Result<(), ApiError> {
    if value.is_empty() || value.len() > MAX_NAME_LEN {
        return Err(ApiError::validation("name must be 1-256 characters"));
    }
    Ok(())
}

pub fn slug(value: &str) -> Result<(), ApiError> {
    if value.is_empty() || value.len() > MAX_SLUG_LEN {
        return Err(ApiError::validation("slug must be 1-50 characters"));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ApiError::validation(
            "slug may contain only ASCII letters, digits, hyphens and underscores",
        ));
    }
    Ok(())
}

/// 1888 is the year of the earliest surviving film; the future is not a
/// valid release year.
pub fn year(value: i32) -> Result<(), ApiError> {
    let current = Utc::now().year();
    if value < MIN_YEAR || value > current {
        return Err(ApiError::validation(format!(
            "year must be between {MIN_YEAR} and {current}"
        )));
    }
    Ok(())
}

pub fn score(value: i64) -> Result<(), ApiError> {
    if !(1..=10).contains(&value) {
        return Err(ApiError::validation("score must be an integer from 1 to 10"));
    }
    Ok(())
}

pub fn required_text(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("{field} must not be blank")));
    }
    Ok(())
}
