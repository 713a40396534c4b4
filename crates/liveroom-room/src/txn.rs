//! Read-modify-write against the room store.
//!
//! Every mutation in this crate goes through [`update_room`]: load the
//! versioned record, apply a closure to a copy, and swap the copy in only
//! if the version is unchanged. The closure sees a consistent record and
//! either edits it or returns an error; it may run more than once, so it
//! must not have side effects outside the record.

use liveroom_protocol::RoomId;
use liveroom_store::{RoomRecord, RoomStore};

use crate::RoomError;

/// Applies `apply` to the room atomically and returns its output together
/// with the record as written.
///
/// Only [`StoreError::Conflict`](liveroom_store::StoreError::Conflict) is
/// retried, since it guarantees the swap did not land. Any other store
/// failure is returned at once: retrying a write whose outcome is unknown
/// could apply it twice. If the closure leaves the record unchanged,
/// nothing is written.
pub(crate) async fn update_room<S, T, F>(
    store: &S,
    room_id: RoomId,
    max_attempts: u32,
    mut apply: F,
) -> Result<(T, RoomRecord), RoomError>
where
    S: RoomStore + ?Sized,
    F: FnMut(&mut RoomRecord) -> Result<T, RoomError> + Send,
    T: Send,
{
    for attempt in 1..=max_attempts {
        let current = store
            .load(room_id)
            .await?
            .ok_or(RoomError::NotFound(room_id))?;

        let mut next = current.value.clone();
        let output = apply(&mut next)?;
        if next == current.value {
            return Ok((output, next));
        }

        match store
            .compare_and_swap(room_id, current.version, next.clone())
            .await
        {
            Ok(_) => return Ok((output, next)),
            Err(err) if err.is_retryable() => {
                tracing::debug!(
                    %room_id,
                    attempt,
                    error = %err,
                    "room write conflict, retrying"
                );
                tokio::task::yield_now().await;
            }
            Err(err) => return Err(err.into()),
        }
    }

    tracing::warn!(%room_id, attempts = max_attempts, "room write attempts exhausted");
    Err(RoomError::Unavailable(format!(
        "room {room_id} stayed contended for {max_attempts} attempts"
    )))
}
