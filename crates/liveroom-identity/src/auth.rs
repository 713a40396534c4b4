//! The identity collaborator contract.
//!
//! Where tokens come from (a users table, an OAuth provider, a signed JWT)
//! is not the engine's business. [`Authenticator`] is the one method the
//! engine needs from whoever does know.

use liveroom_protocol::UserId;

use crate::IdentityError;

/// Resolves a bearer token to the user it belongs to.
///
/// `Send + Sync + 'static` so one authenticator can be shared by every
/// request task for the lifetime of the process.
///
/// # Example
///
/// ```rust
/// use liveroom_identity::{Authenticator, IdentityError};
/// use liveroom_protocol::UserId;
///
/// /// Treats the token as a decimal user id. Development only.
/// struct NumericTokens;
///
/// impl Authenticator for NumericTokens {
///     async fn authenticate(
///         &self,
///         token: &str,
///     ) -> Result<UserId, IdentityError> {
///         token
///             .parse()
///             .map(UserId)
///             .map_err(|_| IdentityError::Unauthorized("not a number".into()))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Returns the user owning `token`, or [`IdentityError::Unauthorized`].
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<UserId, IdentityError>> + Send;
}
