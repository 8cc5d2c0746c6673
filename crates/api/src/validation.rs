use crate::error::ApiError;
use validator::Validate;

const MAX_ID_LENGTH: usize = 128;

pub fn validate<T: Validate>(value: &T) -> Result<(), ApiError> {
    value
        .validate()
        .map_err(|err| ApiError::Validation(err.to_string()))
}

/// Trimmed, non-empty identifier taken from a path segment.
pub fn path_id(value: &str, field: &str) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() || value.len() > MAX_ID_LENGTH {
        return Err(ApiError::Validation(format!(
            "{field} must be between 1 and {MAX_ID_LENGTH} characters"
        )));
    }
    Ok(value.to_string())
}
