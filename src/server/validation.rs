//! Request validation utilities for the staffroom API.
//!
//! Validators return the parsed value where there is one, so handlers can
//! validate and convert a field in a single `?`.

use std::fmt;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles")
});

static DEPARTMENT_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9_-]{2,16}$").expect("department code regex compiles"));

/// Validation error type.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate that a string is not empty or whitespace only.
pub fn validate_not_empty(value: &str, field_name: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        Err(ValidationError::new(field_name, "cannot be empty"))
    } else {
        Ok(())
    }
}

/// Validate string length (in characters) is within bounds.
///
/// # Example
/// ```
/// use staffroom::server::validation::validate_length;
///
/// assert!(validate_length("Maths", 1, 10, "name").is_ok());
/// assert!(validate_length("", 1, 10, "name").is_err());
/// ```
pub fn validate_length(
    value: &str,
    min: usize,
    max: usize,
    field_name: &str,
) -> ValidationResult<()> {
    let len = value.chars().count();
    if len < min {
        Err(ValidationError::new(
            field_name,
            format!("must be at least {} characters", min),
        ))
    } else if len > max {
        Err(ValidationError::new(
            field_name,
            format!("must be at most {} characters", max),
        ))
    } else {
        Ok(())
    }
}

/// Trim a required text field and check its length.
pub fn required_text(value: &str, max: usize, field_name: &str) -> ValidationResult<String> {
    validate_not_empty(value, field_name)?;
    let trimmed = value.trim();
    validate_length(trimmed, 1, max, field_name)?;
    Ok(trimmed.to_string())
}

/// Trim an optional text field. Blank values become `None`.
pub fn optional_text(
    value: Option<&str>,
    max: usize,
    field_name: &str,
) -> ValidationResult<Option<String>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => {
            validate_length(v, 1, max, field_name)?;
            Ok(Some(v.to_string()))
        }
        None => Ok(None),
    }
}

/// Validate and normalize an email address (lowercased).
pub fn validate_email(value: &str, field_name: &str) -> ValidationResult<String> {
    let email = value.trim().to_lowercase();
    validate_length(&email, 3, 254, field_name)?;
    if EMAIL_RE.is_match(&email) {
        Ok(email)
    } else {
        Err(ValidationError::new(field_name, "invalid email address"))
    }
}

/// Validate and normalize a department code (uppercased).
///
/// Codes are 2-16 characters of `A-Z`, `0-9`, `_` and `-`.
pub fn validate_department_code(value: &str, field_name: &str) -> ValidationResult<String> {
    let code = value.trim().to_uppercase();
    if DEPARTMENT_CODE_RE.is_match(&code) {
        Ok(code)
    } else {
        Err(ValidationError::new(
            field_name,
            "must be 2-16 characters of A-Z, 0-9, '_' or '-'",
        ))
    }
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(value: &str, field_name: &str) -> ValidationResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        ValidationError::new(field_name, "invalid date format (expected: YYYY-MM-DD)")
    })
}

/// Parse a time of day as `HH:MM` or `HH:MM:SS`.
pub fn parse_time(value: &str, field_name: &str) -> ValidationResult<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| ValidationError::new(field_name, "invalid time format (expected: HH:MM)"))
}

/// Parse an optional date field.
pub fn parse_optional_date(
    value: Option<&str>,
    field_name: &str,
) -> ValidationResult<Option<NaiveDate>> {
    value.map(|v| parse_date(v, field_name)).transpose()
}

/// Parse an optional time field.
pub fn parse_optional_time(
    value: Option<&str>,
    field_name: &str,
) -> ValidationResult<Option<NaiveTime>> {
    value.map(|v| parse_time(v, field_name)).transpose()
}

/// Parse a text value into one of the crate's closed enums.
pub fn parse_enum<T>(value: &str, field_name: &str) -> ValidationResult<T>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .to_lowercase()
        .parse::<T>()
        .map_err(|e| ValidationError::new(field_name, e.to_string()))
}

/// `from` must not be after `to` when both are given.
pub fn validate_date_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> ValidationResult<()> {
    match (from, to) {
        (Some(from), Some(to)) if from > to => Err(ValidationError::new(
            "from",
            format!("must not be after 'to' ({to})"),
        )),
        _ => Ok(()),
    }
}
