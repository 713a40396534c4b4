//! Unified error type for Liveroom.

use liveroom_identity::IdentityError;
use liveroom_room::RoomError;

/// Top-level error returned by every [`Lobby`](crate::Lobby) operation.
///
/// Store failures and undecodable wire values reach callers inside
/// [`RoomError`], as `Unavailable` and `InvalidArgument`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LiveroomError {
    /// The caller could not be identified.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// A room operation was rejected.
    #[error(transparent)]
    Room(#[from] RoomError),
}

impl LiveroomError {
    /// Whether the caller failed to authenticate.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Identity(_))
    }
}
