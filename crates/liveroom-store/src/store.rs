//! The persistence contract the engine is written against.
//!
//! Liveroom doesn't pick a database. Anything that can give durable
//! key-value semantics keyed by [`RoomId`], a versioned compare-and-swap on
//! a single record, and a filtered scan can back the engine: a SQL table
//! with a `version` column, a KV store with conditional puts, or the
//! bundled [`MemoryRoomStore`](crate::MemoryRoomStore).

use async_trait::async_trait;
use liveroom_protocol::RoomId;

use crate::{RoomFilter, RoomRecord, StoreError, Versioned};

/// Durable room storage with atomic compare-and-swap.
///
/// `Send + Sync + 'static` because one store is shared by every request
/// handler and by the background session runners.
#[async_trait]
pub trait RoomStore: Send + Sync + 'static {
    /// Reserves a fresh room id. Ids are positive, increasing, and never
    /// handed out twice, even if the reserved id is never inserted.
    async fn allocate_id(&self) -> Result<RoomId, StoreError>;

    /// Durably stores a new record at version 1.
    ///
    /// Fails with [`StoreError::AlreadyExists`] if the id is taken.
    async fn insert(&self, record: RoomRecord) -> Result<u64, StoreError>;

    /// Reads a record and the version it is currently at.
    async fn load(
        &self,
        room_id: RoomId,
    ) -> Result<Option<Versioned<RoomRecord>>, StoreError>;

    /// Replaces the record if, and only if, it is still at
    /// `expected_version`. Returns the new version.
    ///
    /// A version mismatch is reported as [`StoreError::Conflict`] and
    /// guarantees nothing was written.
    async fn compare_and_swap(
        &self,
        room_id: RoomId,
        expected_version: u64,
        record: RoomRecord,
    ) -> Result<u64, StoreError>;

    /// Deletes a record, returning it if it existed.
    async fn remove(
        &self,
        room_id: RoomId,
    ) -> Result<Option<RoomRecord>, StoreError>;

    /// Returns every record matching the filter, ordered by room id.
    async fn scan(
        &self,
        filter: RoomFilter,
    ) -> Result<Vec<RoomRecord>, StoreError>;
}
