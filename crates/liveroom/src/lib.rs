//! # Liveroom
//!
//! Matchmaking and live-session backend for multiplayer rhythm games.
//!
//! Players create rooms for a live (a song chart), others browse and join
//! them, the owner starts the live, and every player submits a score. The
//! room settles once every result is in, or a fixed window after the
//! first one arrived, whichever comes first.
//!
//! All room state lives in a [`RoomStore`](liveroom_store::RoomStore) and
//! changes only through compare-and-swap, so several engine instances in
//! the same process can share one store. Records carry
//! [`tokio::time::Instant`] timestamps, which only mean something to the
//! process that took them, so a store shared across processes would need
//! wall-clock timestamps instead.
//!
//! ## Quick Start
//!
//! ```rust
//! use liveroom::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), LiveroomError> {
//! let tokens = TokenTable::new();
//! tokens.register("alice-token", UserId(1));
//! let lobby = LobbyBuilder::new().build(tokens);
//!
//! let room = lobby.create_room("Bearer alice-token", 42, 1).await?;
//! let rooms = lobby.list_rooms("Bearer alice-token", 42).await?;
//! assert_eq!(rooms[0].room_id, room);
//! # lobby.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod error;
mod lobby;

pub use error::LiveroomError;
pub use lobby::{Lobby, LobbyBuilder};

/// Re-exports of the commonly used types from all Liveroom crates.
pub mod prelude {
    pub use crate::{Lobby, LobbyBuilder, LiveroomError};
    pub use liveroom_identity::{Authenticator, IdentityError, TokenTable};
    pub use liveroom_protocol::{
        Difficulty, JoinResult, LiveId, LiveResult, MemberView, ResultPhase,
        ResultReport, RoomId, RoomSnapshot, RoomStatus, RoomSummary, UserId,
    };
    pub use liveroom_room::{
        EngineConfig, LeaveOutcome, MatchmakingEngine, RoomError,
    };
    pub use liveroom_store::{MemoryRoomStore, RoomStore};
}
