//! Room lifecycle and matchmaking for Liveroom.
//!
//! Rooms live in a [`RoomStore`](liveroom_store::RoomStore). Every change
//! to a room is a read-modify-compare-and-swap against that store, so two
//! callers racing on the same room can never both win, while callers on
//! different rooms never wait on each other.
//!
//! # Key types
//!
//! - [`MatchmakingEngine`]: create/join/leave/start, result submission
//! - [`RoomDirectory`]: read-only listings and room polling
//! - [`EngineConfig`]: capacity, result window, compare-and-swap attempts
//! - [`RoomError`]: everything a caller can get back
//!
//! Once a live starts, a per-room session runner task owns the result
//! window: it waits for the first result, then for the window to elapse,
//! and fills in zero results for whoever never submitted.

mod config;
mod directory;
mod error;
mod manager;
mod session;
mod txn;

pub use config::EngineConfig;
pub use directory::RoomDirectory;
pub use error::RoomError;
pub use manager::{LeaveOutcome, MatchmakingEngine};
