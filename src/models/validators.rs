use std::borrow::Cow;

use validator::ValidationError;

/// Reject empty or whitespace-only strings.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some(Cow::Borrowed("Field cannot be empty"));
        return Err(err);
    }
    Ok(())
}
