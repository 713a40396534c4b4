//! Shared vocabulary for Liveroom.
//!
//! Every other crate speaks in these types:
//!
//! - **Identity** ([`UserId`], [`RoomId`], [`LiveId`]): newtype ids.
//! - **Room lifecycle** ([`RoomStatus`], [`Difficulty`]): the enumerations
//!   a room is created with and moves through.
//! - **Results** ([`LiveResult`], [`ResultPhase`], [`ResultReport`]): what
//!   players submit after a live and what they read back.
//! - **Views** ([`RoomSummary`], [`RoomSnapshot`], [`MemberView`],
//!   [`JoinResult`]): read models handed to the transport layer.
//!
//! ```text
//! Transport (out of scope) → Lobby → Engine → Store
//!                 all of them share liveroom-protocol
//! ```

mod error;
mod types;

pub use error::ProtocolError;
pub use types::{
    Difficulty, JoinResult, LiveId, LiveResult, MemberView, ResultPhase,
    ResultReport, RoomId, RoomSnapshot, RoomStatus, RoomSummary, UserId,
};
