//! Integration tests for room creation, admission control, leaving, and
//! listings.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use liveroom_protocol::{
    Difficulty, JoinResult, LiveId, RoomId, RoomStatus, UserId,
};
use liveroom_room::{EngineConfig, LeaveOutcome, MatchmakingEngine, RoomError};
use liveroom_store::{
    MemoryRoomStore, RoomFilter, RoomRecord, RoomStore, StoreError, Versioned,
};

// =========================================================================
// Helpers
// =========================================================================

const MAX: usize = 4;

fn uid(id: u64) -> UserId {
    UserId(id)
}

fn engine() -> MatchmakingEngine<MemoryRoomStore> {
    MatchmakingEngine::new(
        Arc::new(MemoryRoomStore::new()),
        EngineConfig {
            max_members: MAX,
            ..EngineConfig::default()
        },
    )
}

async fn status(
    engine: &MatchmakingEngine<MemoryRoomStore>,
    room: RoomId,
) -> RoomStatus {
    engine.room(room).await.unwrap().status
}

// =========================================================================
// Create + list + join scenario
// =========================================================================

#[tokio::test]
async fn test_create_list_join_until_full() {
    let engine = engine();
    let room = engine
        .create_room(uid(1), LiveId(1), Difficulty::Normal)
        .await
        .unwrap();

    let all = engine.list_rooms(LiveId::ANY).await.unwrap();
    let entry = all.iter().find(|s| s.room_id == room).unwrap();
    assert_eq!(entry.member_count, 1);
    assert_eq!(entry.max_members, MAX);
    assert_eq!(entry.live_id, LiveId(1));

    assert_eq!(
        engine.join_room(uid(2), room, Difficulty::Normal).await.unwrap(),
        JoinResult::Ok
    );
    let live1 = engine.list_rooms(LiveId(1)).await.unwrap();
    assert_eq!(live1.len(), 1);
    assert_eq!(live1[0].member_count, 2);

    for user in 3..=MAX as u64 {
        assert_eq!(
            engine.join_room(uid(user), room, Difficulty::Hard).await.unwrap(),
            JoinResult::Ok
        );
    }
    assert_eq!(
        engine.join_room(uid(99), room, Difficulty::Normal).await.unwrap(),
        JoinResult::RoomFull
    );
    assert_eq!(engine.room(room).await.unwrap().member_count(), MAX);
}

#[tokio::test]
async fn test_created_ids_are_unique_and_positive() {
    let engine = engine();
    let r1 = engine
        .create_room(uid(1), LiveId(1), Difficulty::Normal)
        .await
        .unwrap();
    let r2 = engine
        .create_room(uid(2), LiveId(1), Difficulty::Normal)
        .await
        .unwrap();
    assert!(r1.0 > 0);
    assert_ne!(r1, r2);
}

#[tokio::test]
async fn test_create_with_wildcard_live_id_rejected() {
    let engine = engine();
    let result = engine
        .create_room(uid(1), LiveId::ANY, Difficulty::Normal)
        .await;
    assert!(matches!(result, Err(RoomError::InvalidArgument(_))));
    assert!(engine.list_rooms(LiveId::ANY).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_join_is_idempotent() {
    let engine = engine();
    let room = engine
        .create_room(uid(1), LiveId(1), Difficulty::Normal)
        .await
        .unwrap();

    let first = engine.join_room(uid(2), room, Difficulty::Hard).await.unwrap();
    let second = engine.join_room(uid(2), room, Difficulty::Normal).await.unwrap();

    assert_eq!(first, JoinResult::Ok);
    assert_eq!(second, JoinResult::Ok);
    let record = engine.room(room).await.unwrap();
    assert_eq!(record.member_count(), 2);
    assert_eq!(record.members[&uid(2)], Difficulty::Hard);
}

#[tokio::test]
async fn test_join_unknown_room_not_found() {
    let engine = engine();
    let result = engine.join_room(uid(1), RoomId(404), Difficulty::Normal).await;
    assert_eq!(result, Err(RoomError::NotFound(RoomId(404))));
}

#[tokio::test]
async fn test_join_after_start_and_after_dissolution() {
    let engine = engine();
    let live = engine
        .create_room(uid(1), LiveId(1), Difficulty::Normal)
        .await
        .unwrap();
    engine.start_live(uid(1), live).await.unwrap();
    assert_eq!(
        engine.join_room(uid(2), live, Difficulty::Normal).await.unwrap(),
        JoinResult::AlreadyLiveStarted
    );

    let gone = engine
        .create_room(uid(3), LiveId(1), Difficulty::Normal)
        .await
        .unwrap();
    engine.leave_room(uid(3), gone).await.unwrap();
    assert_eq!(
        engine.join_room(uid(4), gone, Difficulty::Normal).await.unwrap(),
        JoinResult::RoomDissolved
    );

    engine.shutdown().await;
}

// =========================================================================
// Concurrency
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_joins_for_last_slot_admit_exactly_one() {
    let engine = Arc::new(engine());
    let room = engine
        .create_room(uid(1), LiveId(7), Difficulty::Normal)
        .await
        .unwrap();
    for user in 2..MAX as u64 {
        engine.join_room(uid(user), room, Difficulty::Normal).await.unwrap();
    }

    let racers = (100..116u64).map(|user| {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine.join_room(uid(user), room, Difficulty::Normal).await
        })
    });
    let results: Vec<JoinResult> = join_all(racers)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let admitted = results.iter().filter(|r| **r == JoinResult::Ok).count();
    let full = results.iter().filter(|r| **r == JoinResult::RoomFull).count();
    assert_eq!(admitted, 1);
    assert_eq!(full, results.len() - 1);
    assert_eq!(engine.room(room).await.unwrap().member_count(), MAX);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_racing_joins_never_exceed_capacity() {
    let engine = Arc::new(MatchmakingEngine::new(
        Arc::new(MemoryRoomStore::new()),
        EngineConfig {
            max_members: MAX,
            max_cas_attempts: 64,
            ..EngineConfig::default()
        },
    ));
    let room = engine
        .create_room(uid(1), LiveId(7), Difficulty::Normal)
        .await
        .unwrap();

    let racers = (2..34u64).map(|user| {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine.join_room(uid(user), room, Difficulty::Normal).await
        })
    });
    let admitted = join_all(racers)
        .await
        .into_iter()
        .filter(|joined| matches!(joined, Ok(Ok(JoinResult::Ok))))
        .count();

    assert_eq!(admitted, MAX - 1);
    assert_eq!(engine.room(room).await.unwrap().member_count(), MAX);
}

// =========================================================================
// Leave
// =========================================================================

#[tokio::test]
async fn test_owner_leave_transfers_to_lowest_user_id() {
    let engine = engine();
    let room = engine
        .create_room(uid(5), LiveId(1), Difficulty::Normal)
        .await
        .unwrap();
    engine.join_room(uid(9), room, Difficulty::Normal).await.unwrap();
    engine.join_room(uid(7), room, Difficulty::Normal).await.unwrap();

    let outcome = engine.leave_room(uid(5), room).await.unwrap();

    assert_eq!(outcome, LeaveOutcome::OwnerTransferred(uid(7)));
    let record = engine.room(room).await.unwrap();
    assert_eq!(record.owner, uid(7));
    assert_eq!(record.status, RoomStatus::Waiting);
}

#[tokio::test]
async fn test_new_owner_can_start_live() {
    let engine = engine();
    let room = engine
        .create_room(uid(1), LiveId(1), Difficulty::Normal)
        .await
        .unwrap();
    engine.join_room(uid(2), room, Difficulty::Normal).await.unwrap();
    engine.leave_room(uid(1), room).await.unwrap();

    engine.start_live(uid(2), room).await.unwrap();
    assert_eq!(status(&engine, room).await, RoomStatus::LiveStart);
    engine.shutdown().await;
}

#[tokio::test]
async fn test_last_member_leaving_dissolves() {
    let engine = engine();
    let room = engine
        .create_room(uid(1), LiveId(1), Difficulty::Normal)
        .await
        .unwrap();
    engine.join_room(uid(2), room, Difficulty::Normal).await.unwrap();

    assert_eq!(
        engine.leave_room(uid(2), room).await.unwrap(),
        LeaveOutcome::Left
    );
    assert_eq!(
        engine.leave_room(uid(1), room).await.unwrap(),
        LeaveOutcome::Dissolved
    );
    assert_eq!(status(&engine, room).await, RoomStatus::Dissolution);
    assert!(engine.list_rooms(LiveId::ANY).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_leave_errors() {
    let engine = engine();
    let room = engine
        .create_room(uid(1), LiveId(1), Difficulty::Normal)
        .await
        .unwrap();

    assert_eq!(
        engine.leave_room(uid(2), room).await,
        Err(RoomError::NotAMember(uid(2), room))
    );

    engine.leave_room(uid(1), room).await.unwrap();
    assert_eq!(
        engine.leave_room(uid(1), room).await,
        Err(RoomError::RoomDissolved(room))
    );
}

// =========================================================================
// Start
// =========================================================================

#[tokio::test]
async fn test_start_by_non_owner_denied_and_status_unchanged() {
    let engine = engine();
    let room = engine
        .create_room(uid(1), LiveId(1), Difficulty::Normal)
        .await
        .unwrap();
    engine.join_room(uid(2), room, Difficulty::Normal).await.unwrap();

    let result = engine.start_live(uid(2), room).await;

    assert_eq!(
        result,
        Err(RoomError::PermissionDenied {
            user_id: uid(2),
            room_id: room
        })
    );
    assert_eq!(status(&engine, room).await, RoomStatus::Waiting);
    assert_eq!(engine.active_sessions(), 0);
}

#[tokio::test]
async fn test_start_twice_is_invalid_state() {
    let engine = engine();
    let room = engine
        .create_room(uid(1), LiveId(1), Difficulty::Normal)
        .await
        .unwrap();

    engine.start_live(uid(1), room).await.unwrap();
    let again = engine.start_live(uid(1), room).await;

    assert!(matches!(again, Err(RoomError::InvalidState(_))));
    assert_eq!(engine.active_sessions(), 1);
    engine.shutdown().await;
}

#[tokio::test]
async fn test_start_snapshots_roster() {
    let engine = engine();
    let room = engine
        .create_room(uid(1), LiveId(1), Difficulty::Normal)
        .await
        .unwrap();
    engine.join_room(uid(2), room, Difficulty::Hard).await.unwrap();

    engine.start_live(uid(1), room).await.unwrap();

    let record = engine.room(room).await.unwrap();
    let roster: Vec<UserId> = record.roster.iter().copied().collect();
    assert_eq!(roster, vec![uid(1), uid(2)]);
    engine.shutdown().await;
}

// =========================================================================
// Listings and polling
// =========================================================================

#[tokio::test]
async fn test_list_filters_by_live_and_hides_started_rooms() {
    let engine = engine();
    let a = engine
        .create_room(uid(1), LiveId(10), Difficulty::Normal)
        .await
        .unwrap();
    let b = engine
        .create_room(uid(2), LiveId(20), Difficulty::Normal)
        .await
        .unwrap();
    let c = engine
        .create_room(uid(3), LiveId(10), Difficulty::Hard)
        .await
        .unwrap();
    engine.start_live(uid(3), c).await.unwrap();

    let mut all: Vec<RoomId> = engine
        .list_rooms(LiveId::ANY)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.room_id)
        .collect();
    all.sort();
    assert_eq!(all, vec![a, b]);

    let live10: Vec<RoomId> = engine
        .list_rooms(LiveId(10))
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.room_id)
        .collect();
    assert_eq!(live10, vec![a]);

    assert!(engine.list_rooms(LiveId(30)).await.unwrap().is_empty());
    engine.shutdown().await;
}

#[tokio::test]
async fn test_wait_room_snapshot() {
    let engine = engine();
    let room = engine
        .create_room(uid(1), LiveId(1), Difficulty::Normal)
        .await
        .unwrap();
    engine.join_room(uid(2), room, Difficulty::Hard).await.unwrap();

    let snapshot = engine.wait_room(uid(2), room).await.unwrap();

    assert_eq!(snapshot.status, RoomStatus::Waiting);
    assert_eq!(snapshot.members.len(), 2);
    let host = &snapshot.members[0];
    assert_eq!(host.user_id, uid(1));
    assert!(host.is_host);
    assert!(!host.is_me);
    let me = &snapshot.members[1];
    assert_eq!(me.difficulty, Difficulty::Hard);
    assert!(me.is_me);
    assert!(!me.is_host);

    assert_eq!(
        engine.wait_room(uid(3), room).await,
        Err(RoomError::NotAMember(uid(3), room))
    );
}

#[tokio::test]
async fn test_wait_room_reports_dissolution_to_former_members() {
    let engine = engine();
    let room = engine
        .create_room(uid(1), LiveId(1), Difficulty::Normal)
        .await
        .unwrap();
    engine.leave_room(uid(1), room).await.unwrap();

    let snapshot = engine.wait_room(uid(1), room).await.unwrap();
    assert_eq!(snapshot.status, RoomStatus::Dissolution);
}

// =========================================================================
// Status monotonicity
// =========================================================================

/// Small deterministic generator so the sequence is reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) % bound
    }
}

fn rank(status: RoomStatus) -> u8 {
    match status {
        RoomStatus::Waiting => 0,
        RoomStatus::LiveStart => 1,
        RoomStatus::Dissolution => 2,
    }
}

#[tokio::test]
async fn test_status_never_moves_backwards() {
    let engine = engine();
    let mut rng = Lcg(42);

    for round in 0..20u64 {
        let room = engine
            .create_room(uid(1), LiveId(round + 1), Difficulty::Normal)
            .await
            .unwrap();
        let mut last = rank(status(&engine, room).await);

        for _ in 0..30 {
            let user = uid(1 + rng.next(6));
            // Errors are expected here; only the status trail matters.
            let _ = match rng.next(3) {
                0 => engine
                    .join_room(user, room, Difficulty::Normal)
                    .await
                    .map(|_| ()),
                1 => engine.leave_room(user, room).await.map(|_| ()),
                _ => engine.start_live(user, room).await,
            };
            let now = rank(status(&engine, room).await);
            assert!(now >= last, "status moved backwards in round {round}");
            last = now;
        }
    }
    engine.shutdown().await;
}

// =========================================================================
// Sweep
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_sweep_removes_only_expired_dissolved_rooms() {
    let engine = MatchmakingEngine::new(
        Arc::new(MemoryRoomStore::new()),
        EngineConfig {
            dissolved_retention: Duration::from_secs(60),
            ..EngineConfig::default()
        },
    );
    let old = engine
        .create_room(uid(1), LiveId(1), Difficulty::Normal)
        .await
        .unwrap();
    let waiting = engine
        .create_room(uid(2), LiveId(1), Difficulty::Normal)
        .await
        .unwrap();
    engine.leave_room(uid(1), old).await.unwrap();

    assert_eq!(engine.sweep_dissolved().await.unwrap(), 0);

    tokio::time::advance(Duration::from_secs(61)).await;
    let fresh = engine
        .create_room(uid(3), LiveId(1), Difficulty::Normal)
        .await
        .unwrap();
    engine.leave_room(uid(3), fresh).await.unwrap();

    assert_eq!(engine.sweep_dissolved().await.unwrap(), 1);
    assert_eq!(engine.room(old).await, Err(RoomError::NotFound(old)));
    assert!(engine.room(fresh).await.is_ok());
    assert!(engine.room(waiting).await.is_ok());
}

// =========================================================================
// Store failures
// =========================================================================

/// Wraps the memory store and fails the first `conflicts` swaps with a
/// version conflict, or every swap with a backend error.
struct FlakyStore {
    inner: MemoryRoomStore,
    conflicts: AtomicU32,
    broken: bool,
    swaps: AtomicU32,
}

impl FlakyStore {
    fn conflicting(times: u32) -> Self {
        Self {
            inner: MemoryRoomStore::new(),
            conflicts: AtomicU32::new(times),
            broken: false,
            swaps: AtomicU32::new(0),
        }
    }

    fn broken() -> Self {
        Self {
            broken: true,
            ..Self::conflicting(0)
        }
    }
}

#[async_trait]
impl RoomStore for FlakyStore {
    async fn allocate_id(&self) -> Result<RoomId, StoreError> {
        self.inner.allocate_id().await
    }

    async fn insert(&self, record: RoomRecord) -> Result<u64, StoreError> {
        self.inner.insert(record).await
    }

    async fn load(
        &self,
        room_id: RoomId,
    ) -> Result<Option<Versioned<RoomRecord>>, StoreError> {
        self.inner.load(room_id).await
    }

    async fn compare_and_swap(
        &self,
        room_id: RoomId,
        expected_version: u64,
        record: RoomRecord,
    ) -> Result<u64, StoreError> {
        self.swaps.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            return Err(StoreError::Backend("connection reset".into()));
        }
        let pending = self.conflicts.load(Ordering::SeqCst);
        if pending > 0 {
            self.conflicts.store(pending - 1, Ordering::SeqCst);
            return Err(StoreError::Conflict {
                room_id,
                expected: expected_version,
                actual: expected_version + 1,
            });
        }
        self.inner
            .compare_and_swap(room_id, expected_version, record)
            .await
    }

    async fn remove(
        &self,
        room_id: RoomId,
    ) -> Result<Option<RoomRecord>, StoreError> {
        self.inner.remove(room_id).await
    }

    async fn scan(
        &self,
        filter: RoomFilter,
    ) -> Result<Vec<RoomRecord>, StoreError> {
        self.inner.scan(filter).await
    }
}

#[tokio::test]
async fn test_conflicts_are_retried_within_budget() {
    let store = Arc::new(FlakyStore::conflicting(3));
    let engine = MatchmakingEngine::new(
        Arc::clone(&store),
        EngineConfig {
            max_cas_attempts: 5,
            ..EngineConfig::default()
        },
    );
    let room = engine
        .create_room(uid(1), LiveId(1), Difficulty::Normal)
        .await
        .unwrap();

    let joined = engine.join_room(uid(2), room, Difficulty::Normal).await;

    assert_eq!(joined, Ok(JoinResult::Ok));
    assert_eq!(store.swaps.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_attempt_budget_counts_the_first_swap() {
    let store = Arc::new(FlakyStore::conflicting(10));
    let engine = MatchmakingEngine::new(
        Arc::clone(&store),
        EngineConfig {
            max_cas_attempts: 3,
            ..EngineConfig::default()
        },
    );
    let room = engine
        .create_room(uid(1), LiveId(1), Difficulty::Normal)
        .await
        .unwrap();

    let joined = engine.join_room(uid(2), room, Difficulty::Normal).await;

    // Three attempts in total: the first swap plus two retries.
    assert!(matches!(joined, Err(RoomError::Unavailable(_))));
    assert_eq!(store.swaps.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_backend_failures_are_not_retried() {
    let store = Arc::new(FlakyStore::broken());
    let engine = MatchmakingEngine::new(Arc::clone(&store), EngineConfig::default());
    let room = engine
        .create_room(uid(1), LiveId(1), Difficulty::Normal)
        .await
        .unwrap();

    let joined = engine.join_room(uid(2), room, Difficulty::Normal).await;

    assert!(matches!(joined, Err(RoomError::Unavailable(_))));
    assert_eq!(store.swaps.load(Ordering::SeqCst), 1);
}
