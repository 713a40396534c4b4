//! Error types for the room layer.

use liveroom_protocol::{JoinResult, ProtocolError, RoomId, UserId};
use liveroom_store::StoreError;

/// Errors that can occur during room operations.
///
/// None of these are fatal to the engine. The transport layer decides how
/// each kind is shown to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The request itself is malformed (e.g. the wildcard live id used to
    /// create a room).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Only the room owner may do this.
    #[error("{user_id} is not the owner of room {room_id}")]
    PermissionDenied { user_id: UserId, room_id: RoomId },

    /// The room or session is in a state that doesn't allow this operation.
    #[error("invalid room state for this operation: {0}")]
    InvalidState(String),

    /// The user is not a member (or not in the live roster) of this room.
    #[error("{0} is not a member of room {1}")]
    NotAMember(UserId, RoomId),

    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The room has no free slot.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The room has been dissolved.
    #[error("room {0} is dissolved")]
    RoomDissolved(RoomId),

    /// The store could not complete the operation: retries ran out on a
    /// contended room, or the backend failed.
    #[error("room store unavailable: {0}")]
    Unavailable(String),
}

impl RoomError {
    /// Maps a non-`Ok` join outcome to the matching error.
    ///
    /// Returns `None` for [`JoinResult::Ok`].
    pub fn from_join(room_id: RoomId, result: JoinResult) -> Option<Self> {
        match result {
            JoinResult::Ok => None,
            JoinResult::RoomFull => Some(Self::RoomFull(room_id)),
            JoinResult::RoomDissolved => Some(Self::RoomDissolved(room_id)),
            JoinResult::AlreadyLiveStarted => Some(Self::InvalidState(format!(
                "live already started in room {room_id}"
            ))),
        }
    }
}

impl From<StoreError> for RoomError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(room_id) => Self::NotFound(room_id),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

impl From<ProtocolError> for RoomError {
    fn from(err: ProtocolError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}
