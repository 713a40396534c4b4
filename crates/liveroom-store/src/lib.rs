//! Room Store for Liveroom.
//!
//! The store is the single owner of the canonical room record. Callers never
//! lock a room directly: they load a [`Versioned`] record, change a copy, and
//! hand it back through [`RoomStore::compare_and_swap`]. The swap only lands
//! if nobody else wrote the room in between, which is what makes capacity
//! checks and status transitions atomic.
//!
//! # Key types
//!
//! - [`RoomStore`]: the persistence contract (async, object-safe)
//! - [`MemoryRoomStore`]: in-process implementation with per-room locks
//! - [`RoomRecord`]: the full state of one room
//! - [`RoomFilter`]: scan predicate on `(live_id, status)`

mod error;
mod memory;
mod record;
mod store;

pub use error::StoreError;
pub use memory::MemoryRoomStore;
pub use record::{RoomFilter, RoomRecord, Versioned};
pub use store::RoomStore;
