//! Error types for the storage layer.

use liveroom_protocol::RoomId;

/// Errors a [`RoomStore`](crate::RoomStore) can report.
///
/// The split between [`Conflict`](Self::Conflict) and
/// [`Backend`](Self::Backend) matters to callers: a conflict means the write
/// was definitely rejected and can be retried against a fresh read, while a
/// backend failure leaves the outcome unknown.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The record changed since it was read. Nothing was written.
    #[error("room {room_id} changed concurrently (expected v{expected}, found v{actual})")]
    Conflict {
        room_id: RoomId,
        expected: u64,
        actual: u64,
    },

    /// No record exists under this id.
    #[error("room {0} not found in store")]
    NotFound(RoomId),

    /// A record already exists under this id.
    #[error("room {0} already exists in store")]
    AlreadyExists(RoomId),

    /// The backend failed; the write may or may not have been applied.
    #[error("store backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns `true` if the operation definitely did not apply and a fresh
    /// read-modify-write may be attempted.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
