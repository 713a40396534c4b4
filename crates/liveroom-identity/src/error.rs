//! Error types for the identity layer.

/// Errors that can occur while identifying a caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// No `Authorization` header was supplied.
    #[error("authorization header is missing")]
    MissingHeader,

    /// The header is not of the form `Bearer <token>`.
    #[error("authorization header must be 'Bearer <token>'")]
    MalformedHeader,

    /// The token was not recognised by the [`Authenticator`](crate::Authenticator).
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}
