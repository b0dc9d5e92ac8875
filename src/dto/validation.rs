//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::dao::models::ConversationScope;

/// Validates that a conversation surface key is `court-<id>` or `session-<id>`.
///
/// # Examples
///
/// ```ignore
/// validate_surface_key("court-3")     // Ok
/// validate_surface_key("session-12")  // Ok
/// validate_surface_key("direct-3")    // Err - unknown kind
/// validate_surface_key("court-")      // Err - missing id
/// ```
pub fn validate_surface_key(key: &str) -> Result<(), ValidationError> {
    if ConversationScope::from_surface_key(key).is_some() {
        return Ok(());
    }

    let mut err = ValidationError::new("surface_key_format");
    err.message =
        Some(format!("Surface key must look like `court-<id>` or `session-<id>` (got `{key}`)").into());
    Err(err)
}

/// Validates that a bearer token is non-blank and free of whitespace.
pub fn validate_token(token: &str) -> Result<(), ValidationError> {
    if token.trim().is_empty() {
        let mut err = ValidationError::new("token_empty");
        err.message = Some("Token must not be empty".into());
        return Err(err);
    }

    if token.chars().any(char::is_whitespace) {
        let mut err = ValidationError::new("token_format");
        err.message = Some("Token must not contain whitespace".into());
        return Err(err);
    }

    Ok(())
}
