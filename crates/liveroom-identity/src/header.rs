//! `Authorization` header parsing.

use crate::IdentityError;

/// Extracts the token from an `Authorization` header value.
///
/// The value must be exactly two space-separated parts, the first being the
/// literal `Bearer`. Anything else is [`IdentityError::MalformedHeader`]; an
/// empty value is [`IdentityError::MissingHeader`].
pub fn bearer_token(header: &str) -> Result<&str, IdentityError> {
    if header.is_empty() {
        return Err(IdentityError::MissingHeader);
    }
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(IdentityError::MalformedHeader),
    }
}
