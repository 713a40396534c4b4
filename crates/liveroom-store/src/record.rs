//! The room record and its versioned wrapper.

use std::collections::{BTreeMap, BTreeSet};

use liveroom_protocol::{
    Difficulty, LiveId, LiveResult, RoomId, RoomStatus, UserId,
};
use tokio::time::Instant;

/// Everything the store knows about one room.
///
/// Records are plain values: the engine clones one out of the store, edits
/// the clone, and swaps it back in. Ordered collections keep every derived
/// view (listings, owner hand-over, result maps) deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomRecord {
    pub room_id: RoomId,
    pub live_id: LiveId,
    /// Difficulty chosen by the creator. Fixed for the room's lifetime.
    pub difficulty: Difficulty,
    pub status: RoomStatus,
    pub owner: UserId,
    /// Current members and the difficulty each one selected.
    pub members: BTreeMap<UserId, Difficulty>,
    /// Members frozen at live start. Empty until then.
    pub roster: BTreeSet<UserId>,
    /// Submitted (or defaulted) results, keyed by roster member.
    pub results: BTreeMap<UserId, LiveResult>,
    /// When the first result of the live was recorded.
    ///
    /// Both timestamps are monotonic instants local to the process that
    /// wrote them.
    pub first_result_at: Option<Instant>,
    /// When the room reached `Dissolution`.
    pub dissolved_at: Option<Instant>,
}

impl RoomRecord {
    /// A freshly created room: `Waiting`, with the owner as its only member.
    pub fn new(
        room_id: RoomId,
        owner: UserId,
        live_id: LiveId,
        difficulty: Difficulty,
    ) -> Self {
        let mut members = BTreeMap::new();
        members.insert(owner, difficulty);
        Self {
            room_id,
            live_id,
            difficulty,
            status: RoomStatus::Waiting,
            owner,
            members,
            roster: BTreeSet::new(),
            results: BTreeMap::new(),
            first_result_at: None,
            dissolved_at: None,
        }
    }

    pub fn is_member(&self, user_id: UserId) -> bool {
        self.members.contains_key(&user_id)
    }

    pub fn in_roster(&self, user_id: UserId) -> bool {
        self.roster.contains(&user_id)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` once a live has been started in this room.
    pub fn has_session(&self) -> bool {
        !self.roster.is_empty()
    }

    /// Returns `true` if every roster member has a result entry.
    pub fn results_complete(&self) -> bool {
        self.has_session()
            && self.roster.iter().all(|u| self.results.contains_key(u))
    }

    /// Records the zero result for every roster member that has none.
    ///
    /// Returns how many entries were filled in.
    pub fn default_missing_results(&mut self) -> usize {
        let mut filled = 0;
        for user_id in &self.roster {
            if !self.results.contains_key(user_id) {
                self.results.insert(*user_id, LiveResult::default());
                filled += 1;
            }
        }
        filled
    }

    /// Moves the room to its terminal state.
    pub fn dissolve(&mut self, now: Instant) {
        self.status = RoomStatus::Dissolution;
        self.dissolved_at = Some(now);
    }
}

/// A record together with the version it was read at.
///
/// Versions start at 1 on insert and grow by one on every successful swap.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// Scan predicate over `(live_id, status)`. `None` matches anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoomFilter {
    pub live_id: Option<LiveId>,
    pub status: Option<RoomStatus>,
}

impl RoomFilter {
    /// Matches every room.
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches rooms in the given status.
    pub fn with_status(status: RoomStatus) -> Self {
        Self {
            live_id: None,
            status: Some(status),
        }
    }

    /// Further restricts the filter to one live.
    pub fn live(mut self, live_id: LiveId) -> Self {
        self.live_id = Some(live_id);
        self
    }

    pub fn matches(&self, record: &RoomRecord) -> bool {
        self.live_id.is_none_or(|id| id == record.live_id)
            && self.status.is_none_or(|s| s == record.status)
    }
}
