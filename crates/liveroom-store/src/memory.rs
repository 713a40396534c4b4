//! In-process room store.
//!
//! Each room lives in its own slot behind its own mutex. The outer map is
//! only write-locked to add or remove slots, so swaps on different rooms
//! never wait on each other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use liveroom_protocol::RoomId;

use crate::{RoomFilter, RoomRecord, RoomStore, StoreError, Versioned};

/// A room's slot. `None` once the room has been removed, so a writer still
/// holding the slot cannot resurrect it.
type Slot = Arc<Mutex<Option<Versioned<RoomRecord>>>>;

/// [`RoomStore`] kept entirely in memory.
///
/// Suitable for tests, demos, and single-process deployments where rooms
/// need not survive a restart.
pub struct MemoryRoomStore {
    next_id: AtomicU64,
    rooms: RwLock<HashMap<RoomId, Slot>>,
}

impl MemoryRoomStore {
    /// Creates an empty store. The first allocated id is 1.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.rooms.read().map(|rooms| rooms.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, room_id: RoomId) -> Result<Option<Slot>, StoreError> {
        let rooms = self.rooms.read().map_err(|_| poisoned())?;
        Ok(rooms.get(&room_id).cloned())
    }
}

impl Default for MemoryRoomStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("memory store lock poisoned".into())
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn allocate_id(&self) -> Result<RoomId, StoreError> {
        Ok(RoomId(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    async fn insert(&self, record: RoomRecord) -> Result<u64, StoreError> {
        let room_id = record.room_id;
        let mut rooms = self.rooms.write().map_err(|_| poisoned())?;
        if rooms.contains_key(&room_id) {
            return Err(StoreError::AlreadyExists(room_id));
        }
        let slot = Versioned {
            version: 1,
            value: record,
        };
        rooms.insert(room_id, Arc::new(Mutex::new(Some(slot))));
        tracing::trace!(%room_id, "room record inserted");
        Ok(1)
    }

    async fn load(
        &self,
        room_id: RoomId,
    ) -> Result<Option<Versioned<RoomRecord>>, StoreError> {
        let Some(slot) = self.slot(room_id)? else {
            return Ok(None);
        };
        let guard = slot.lock().map_err(|_| poisoned())?;
        Ok(guard.clone())
    }

    async fn compare_and_swap(
        &self,
        room_id: RoomId,
        expected_version: u64,
        record: RoomRecord,
    ) -> Result<u64, StoreError> {
        let slot = self.slot(room_id)?.ok_or(StoreError::NotFound(room_id))?;
        let mut guard = slot.lock().map_err(|_| poisoned())?;
        let current = guard.as_mut().ok_or(StoreError::NotFound(room_id))?;

        if current.version != expected_version {
            return Err(StoreError::Conflict {
                room_id,
                expected: expected_version,
                actual: current.version,
            });
        }

        current.version += 1;
        current.value = record;
        Ok(current.version)
    }

    async fn remove(
        &self,
        room_id: RoomId,
    ) -> Result<Option<RoomRecord>, StoreError> {
        let slot = {
            let mut rooms = self.rooms.write().map_err(|_| poisoned())?;
            rooms.remove(&room_id)
        };
        let Some(slot) = slot else {
            return Ok(None);
        };
        let mut guard = slot.lock().map_err(|_| poisoned())?;
        Ok(guard.take().map(|v| v.value))
    }

    async fn scan(
        &self,
        filter: RoomFilter,
    ) -> Result<Vec<RoomRecord>, StoreError> {
        // Snapshot the slots first so no room lock is taken while the map
        // lock is held.
        let slots: Vec<Slot> = {
            let rooms = self.rooms.read().map_err(|_| poisoned())?;
            rooms.values().cloned().collect()
        };

        let mut matched = Vec::new();
        for slot in slots {
            let guard = slot.lock().map_err(|_| poisoned())?;
            if let Some(current) = guard.as_ref() {
                if filter.matches(&current.value) {
                    matched.push(current.value.clone());
                }
            }
        }
        matched.sort_by_key(|r| r.room_id);
        Ok(matched)
    }
}
