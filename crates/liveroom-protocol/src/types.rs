//! Core value types.
//!
//! Nothing here knows about storage or concurrency. These are plain data
//! structures that get copied between layers and serialized by whichever
//! transport sits on top.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a player, as returned by the identity collaborator.
///
/// Newtype wrapper so a `UserId` can never be passed where a `RoomId` is
/// expected. `#[serde(transparent)]` keeps the wire form a bare number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// A unique identifier for a room.
///
/// Assigned by the room store on creation: positive, monotonic, never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// Identifies the song (live) a room plays.
///
/// `LiveId(0)` is reserved: in listing queries it means "any live", and it
/// is never the live id of a real room.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct LiveId(pub u64);

impl LiveId {
    /// The wildcard used by room listings.
    pub const ANY: LiveId = LiveId(0);

    /// Returns `true` for the wildcard value.
    pub fn is_any(self) -> bool {
        self == Self::ANY
    }
}

impl fmt::Display for LiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Difficulty
// ---------------------------------------------------------------------------

/// The difficulty a member plays at.
///
/// On the wire this is the numeric code (`1` or `2`). Anything else is
/// rejected during deserialization via `TryFrom<u8>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Difficulty {
    Normal,
    Hard,
}

impl TryFrom<u8> for Difficulty {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Normal),
            2 => Ok(Self::Hard),
            other => Err(ProtocolError::UnknownDifficulty(other)),
        }
    }
}

impl From<Difficulty> for u8 {
    fn from(difficulty: Difficulty) -> u8 {
        match difficulty {
            Difficulty::Normal => 1,
            Difficulty::Hard => 2,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomStatus
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// Transitions are strictly ordered, no skipping:
///
/// ```text
/// Waiting → LiveStart → Dissolution
/// ```
///
/// - **Waiting**: accepting joins, the owner may start the live.
/// - **LiveStart**: the live is being played; results are being collected.
/// - **Dissolution**: terminal. Reached when the results settle or the last
///   member leaves. Membership is frozen from here on.
///
/// The one exception to "one step at a time" is the last member leaving a
/// `Waiting` room, which dissolves it directly (see [`RoomStatus::can_dissolve`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RoomStatus {
    Waiting,
    LiveStart,
    Dissolution,
}

impl RoomStatus {
    /// Returns `true` if the room accepts new members.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns `true` once the room reached its terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Dissolution)
    }

    /// The state that follows this one, or `None` for the terminal state.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::LiveStart),
            Self::LiveStart => Some(Self::Dissolution),
            Self::Dissolution => None,
        }
    }

    /// Returns `true` if moving to `target` is a forward step.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }

    /// Returns `true` if an emptied room in this state may be dissolved.
    pub fn can_dissolve(self) -> bool {
        !self.is_terminal()
    }
}

impl TryFrom<u8> for RoomStatus {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Waiting),
            2 => Ok(Self::LiveStart),
            3 => Ok(Self::Dissolution),
            other => Err(ProtocolError::UnknownStatus(other)),
        }
    }
}

impl From<RoomStatus> for u8 {
    fn from(status: RoomStatus) -> u8 {
        match status {
            RoomStatus::Waiting => 1,
            RoomStatus::LiveStart => 2,
            RoomStatus::Dissolution => 3,
        }
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::LiveStart => write!(f, "LiveStart"),
            Self::Dissolution => write!(f, "Dissolution"),
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// One player's result for a live.
///
/// `judge_counts` holds the number of notes per judgement, in the order
/// perfect, great, good, bad, miss. `LiveResult::default()` is the zero
/// result recorded for players who never submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveResult {
    pub score: u32,
    pub judge_counts: [u32; 5],
}

/// Whether result aggregation is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultPhase {
    /// Some roster members may still submit.
    Collecting,
    /// Every roster member has an entry; the set is final.
    Settled,
}

/// What `GetResult` hands back: the phase plus every entry recorded so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultReport {
    pub phase: ResultPhase,
    pub results: BTreeMap<UserId, LiveResult>,
}

// ---------------------------------------------------------------------------
// Join outcome
// ---------------------------------------------------------------------------

/// Outcome of a join attempt against an existing room.
///
/// Joining twice is not an error: a user who is already a member gets `Ok`
/// back and the room is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinResult {
    Ok,
    RoomFull,
    RoomDissolved,
    AlreadyLiveStarted,
}

// ---------------------------------------------------------------------------
// Read models
// ---------------------------------------------------------------------------

/// A waiting room as shown in room listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub live_id: LiveId,
    pub member_count: usize,
    pub max_members: usize,
}

/// One member as seen by another member polling the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberView {
    pub user_id: UserId,
    pub difficulty: Difficulty,
    /// The member currently owns the room.
    pub is_host: bool,
    /// The member is the caller.
    pub is_me: bool,
}

/// Current status and membership of a room, ordered by user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub status: RoomStatus,
    pub members: Vec<MemberView>,
}
