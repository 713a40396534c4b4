//! Read-only room queries.

use std::sync::Arc;

use liveroom_protocol::{
    LiveId, MemberView, RoomId, RoomSnapshot, RoomStatus, RoomSummary, UserId,
};
use liveroom_store::{RoomFilter, RoomRecord, RoomStore};

use crate::RoomError;

/// Room browsing for lobby screens.
///
/// Never writes. Listings are ordered by room id, so the same store state
/// always yields the same list.
pub struct RoomDirectory<S: RoomStore> {
    store: Arc<S>,
    max_members: usize,
}

impl<S: RoomStore> Clone for RoomDirectory<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            max_members: self.max_members,
        }
    }
}

impl<S: RoomStore> RoomDirectory<S> {
    pub fn new(store: Arc<S>, max_members: usize) -> Self {
        Self { store, max_members }
    }

    /// Lists rooms that are still waiting for players.
    ///
    /// [`LiveId::ANY`] lists every waiting room; any other id only the
    /// rooms playing that live.
    pub async fn list_rooms(
        &self,
        live_id: LiveId,
    ) -> Result<Vec<RoomSummary>, RoomError> {
        let mut filter = RoomFilter::with_status(RoomStatus::Waiting);
        if !live_id.is_any() {
            filter = filter.live(live_id);
        }

        let rooms = self.store.scan(filter).await?;
        Ok(rooms
            .into_iter()
            .map(|record| RoomSummary {
                room_id: record.room_id,
                live_id: record.live_id,
                member_count: record.member_count(),
                max_members: self.max_members,
            })
            .collect())
    }

    /// Current status and members of a room, as seen by `user_id`.
    ///
    /// Members may poll their room at any time. Once a room is dissolved
    /// anyone may look, so a player who already left still learns how it
    /// ended.
    pub async fn snapshot(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<RoomSnapshot, RoomError> {
        let record = self.record(room_id).await?;
        if !record.status.is_terminal() && !record.is_member(user_id) {
            return Err(RoomError::NotAMember(user_id, room_id));
        }

        let members = record
            .members
            .iter()
            .map(|(member, difficulty)| MemberView {
                user_id: *member,
                difficulty: *difficulty,
                is_host: *member == record.owner,
                is_me: *member == user_id,
            })
            .collect();

        Ok(RoomSnapshot {
            room_id,
            status: record.status,
            members,
        })
    }

    /// The raw record, or [`RoomError::NotFound`].
    pub async fn record(&self, room_id: RoomId) -> Result<RoomRecord, RoomError> {
        self.store
            .load(room_id)
            .await?
            .map(|current| current.value)
            .ok_or(RoomError::NotFound(room_id))
    }
}
