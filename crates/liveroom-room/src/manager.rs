//! The matchmaking engine: creates rooms, admits and removes members,
//! starts lives, and routes result submissions.

use std::sync::Arc;

use liveroom_protocol::{
    Difficulty, JoinResult, LiveId, LiveResult, ResultPhase, ResultReport,
    RoomId, RoomSnapshot, RoomStatus, RoomSummary, UserId,
};
use liveroom_store::{RoomFilter, RoomRecord, RoomStore};
use tokio::time::Instant;

use crate::session::{self, SessionRegistry};
use crate::txn::update_room;
use crate::{EngineConfig, RoomDirectory, RoomError};

/// What happened to the room when a member left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The member left; the room carries on unchanged otherwise.
    Left,
    /// The owner left and ownership moved to the given member.
    OwnerTransferred(UserId),
    /// The last member left and the room was dissolved.
    Dissolved,
}

/// Entry point for every room operation.
///
/// The engine holds no room state of its own beyond the set of running
/// session runners. Everything else is read from and written to the
/// [`RoomStore`], one compare-and-swap per operation.
pub struct MatchmakingEngine<S: RoomStore> {
    store: Arc<S>,
    config: EngineConfig,
    directory: RoomDirectory<S>,
    sessions: Arc<SessionRegistry>,
}

impl<S: RoomStore> MatchmakingEngine<S> {
    /// Creates an engine over `store`. The config is validated first.
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        let config = config.validated();
        let directory = RoomDirectory::new(Arc::clone(&store), config.max_members);
        Self {
            store,
            config,
            directory,
            sessions: Arc::new(SessionRegistry::default()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The read-only query side of this engine.
    pub fn directory(&self) -> &RoomDirectory<S> {
        &self.directory
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Number of rooms with a running session runner.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Creates a room owned by `owner` and returns its id.
    ///
    /// The room is stored before the id is returned, so it is immediately
    /// visible to listings and joins.
    ///
    /// # Errors
    /// [`RoomError::InvalidArgument`] if `live_id` is the wildcard.
    pub async fn create_room(
        &self,
        owner: UserId,
        live_id: LiveId,
        difficulty: Difficulty,
    ) -> Result<RoomId, RoomError> {
        if live_id.is_any() {
            return Err(RoomError::InvalidArgument(
                "live id 0 is reserved for listings".into(),
            ));
        }

        let room_id = self.store.allocate_id().await?;
        let record = RoomRecord::new(room_id, owner, live_id, difficulty);
        self.store.insert(record).await?;

        tracing::info!(%room_id, %owner, %live_id, ?difficulty, "room created");
        Ok(room_id)
    }

    /// Adds `user_id` to the room, playing at `difficulty`.
    ///
    /// The capacity and status checks and the insert are one atomic
    /// store write: two joiners racing for the last slot cannot both get
    /// in. A user who is already a member gets [`JoinResult::Ok`] and the
    /// room is not touched.
    ///
    /// # Errors
    /// [`RoomError::NotFound`] for unknown rooms. Rejections are reported
    /// as [`JoinResult`] codes, not errors.
    pub async fn join_room(
        &self,
        user_id: UserId,
        room_id: RoomId,
        difficulty: Difficulty,
    ) -> Result<JoinResult, RoomError> {
        let max_members = self.config.max_members;
        let (result, record) =
            self.update(room_id, |room| {
                Ok(admit(room, user_id, difficulty, max_members))
            })
            .await?;

        match result {
            JoinResult::Ok => tracing::info!(
                %room_id,
                %user_id,
                members = record.member_count(),
                "player joined"
            ),
            rejected => tracing::debug!(
                %room_id,
                %user_id,
                ?rejected,
                "join rejected"
            ),
        }
        Ok(result)
    }

    /// Removes `user_id` from the room, in any status except `Dissolution`.
    ///
    /// If the owner leaves, the member with the lowest user id becomes the
    /// owner. If nobody is left, the room is dissolved at once; a live in
    /// progress is settled with zero results for the missing entries and
    /// its runner is cancelled.
    ///
    /// # Errors
    /// - [`RoomError::NotAMember`] if the user is not in the room
    /// - [`RoomError::RoomDissolved`] if the room is already dissolved
    pub async fn leave_room(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<LeaveOutcome, RoomError> {
        let (outcome, record) = self
            .update(room_id, |room| depart(room, user_id, Instant::now()))
            .await?;

        match outcome {
            LeaveOutcome::Left => {
                tracing::info!(%room_id, %user_id, members = record.member_count(), "player left");
            }
            LeaveOutcome::OwnerTransferred(owner) => {
                tracing::info!(%room_id, %user_id, new_owner = %owner, "owner left, ownership transferred");
            }
            LeaveOutcome::Dissolved => {
                self.sessions.cancel(room_id);
                tracing::info!(%room_id, %user_id, "last player left, room dissolved");
            }
        }
        Ok(outcome)
    }

    /// Starts the live. Only the owner may do this, and only while the room
    /// is `Waiting`.
    ///
    /// The current members become the roster: the only users who may submit
    /// results for this live. A session runner is spawned to enforce the
    /// result window.
    ///
    /// # Errors
    /// - [`RoomError::PermissionDenied`] if `user_id` is not the owner
    /// - [`RoomError::InvalidState`] if the room is not `Waiting`
    pub async fn start_live(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<(), RoomError> {
        let (roster, _) = self
            .update(room_id, |room| begin_live(room, user_id))
            .await?;

        self.sessions.spawn(
            room_id,
            Arc::clone(&self.store),
            self.config.result_window,
            self.config.max_cas_attempts,
            self.config.session_channel_size,
        );
        tracing::info!(%room_id, %user_id, roster, "live started");
        Ok(())
    }

    /// Records `user_id`'s result for the live in progress.
    ///
    /// Submitting again replaces the earlier result. The first result of a
    /// live opens the result window; the last missing one settles the room.
    ///
    /// # Errors
    /// - [`RoomError::InvalidState`] if the room is not `LiveStart`
    /// - [`RoomError::NotAMember`] if the user is not in the roster
    pub async fn submit_result(
        &self,
        user_id: UserId,
        room_id: RoomId,
        result: LiveResult,
    ) -> Result<ResultPhase, RoomError> {
        let (phase, record) = self
            .update(room_id, |room| {
                session::record_result(room, user_id, result, Instant::now())
            })
            .await?;

        tracing::info!(
            %room_id,
            %user_id,
            score = result.score,
            submitted = record.results.len(),
            roster = record.roster.len(),
            "result recorded"
        );
        match phase {
            ResultPhase::Collecting => self.sessions.notify(room_id),
            ResultPhase::Settled => {
                // The runner would see this on its next read; stop it now.
                self.sessions.cancel(room_id);
                tracing::info!(%room_id, "all results in, session settled");
            }
        }
        Ok(phase)
    }

    /// Results recorded so far for the room's live, and whether they are
    /// final.
    ///
    /// Served from the store, so it keeps working after the session
    /// settled and its runner is gone.
    ///
    /// # Errors
    /// - [`RoomError::InvalidState`] if no live was ever started
    /// - [`RoomError::NotAMember`] if the user is not in the roster
    pub async fn get_result(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<ResultReport, RoomError> {
        let record = self.directory.record(room_id).await?;
        session::report(&record, user_id)
    }

    /// Polls the room's status and members. See [`RoomDirectory::snapshot`].
    pub async fn wait_room(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<RoomSnapshot, RoomError> {
        self.directory.snapshot(user_id, room_id).await
    }

    /// Lists waiting rooms. See [`RoomDirectory::list_rooms`].
    pub async fn list_rooms(
        &self,
        live_id: LiveId,
    ) -> Result<Vec<RoomSummary>, RoomError> {
        self.directory.list_rooms(live_id).await
    }

    /// Returns the full record of a room.
    pub async fn room(&self, room_id: RoomId) -> Result<RoomRecord, RoomError> {
        self.directory.record(room_id).await
    }

    /// Deletes dissolved rooms whose retention period has passed.
    ///
    /// Returns how many rooms were removed.
    pub async fn sweep_dissolved(&self) -> Result<usize, RoomError> {
        let now = Instant::now();
        let retention = self.config.dissolved_retention;
        let dissolved = self
            .store
            .scan(RoomFilter::with_status(RoomStatus::Dissolution))
            .await?;

        let mut removed = 0;
        for record in dissolved {
            let expired = record
                .dissolved_at
                .is_some_and(|at| at + retention <= now);
            if !expired || self.sessions.contains(record.room_id) {
                continue;
            }
            if self.store.remove(record.room_id).await?.is_some() {
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!(removed, "dissolved rooms swept");
        }
        Ok(removed)
    }

    /// Cancels every session runner and waits for them to stop.
    ///
    /// Rooms still collecting results stay `LiveStart`; nothing is
    /// defaulted on their behalf.
    pub async fn shutdown(&self) {
        let tasks = self.sessions.cancel_all();
        let count = tasks.len();
        for task in tasks {
            let _ = task.await;
        }
        tracing::info!(cancelled = count, "matchmaking engine shut down");
    }

    async fn update<T, F>(
        &self,
        room_id: RoomId,
        apply: F,
    ) -> Result<(T, RoomRecord), RoomError>
    where
        F: FnMut(&mut RoomRecord) -> Result<T, RoomError> + Send,
        T: Send,
    {
        update_room(
            self.store.as_ref(),
            room_id,
            self.config.max_cas_attempts,
            apply,
        )
        .await
    }
}

impl<S: RoomStore> Drop for MatchmakingEngine<S> {
    fn drop(&mut self) {
        // Runners hold the registry themselves, so nothing else would
        // signal them once the engine is gone.
        let orphaned = self.sessions.cancel_all();
        if !orphaned.is_empty() {
            tracing::debug!(count = orphaned.len(), "engine dropped, session runners cancelled");
        }
    }
}

// ---------------------------------------------------------------------------
// Room transitions
//
// Each of these runs inside a compare-and-swap attempt and may be called
// more than once per operation.
// ---------------------------------------------------------------------------

fn admit(
    room: &mut RoomRecord,
    user_id: UserId,
    difficulty: Difficulty,
    max_members: usize,
) -> JoinResult {
    match room.status {
        RoomStatus::Dissolution => JoinResult::RoomDissolved,
        _ if room.is_member(user_id) => JoinResult::Ok,
        RoomStatus::LiveStart => JoinResult::AlreadyLiveStarted,
        RoomStatus::Waiting if room.member_count() >= max_members => {
            JoinResult::RoomFull
        }
        RoomStatus::Waiting => {
            room.members.insert(user_id, difficulty);
            JoinResult::Ok
        }
    }
}

fn depart(
    room: &mut RoomRecord,
    user_id: UserId,
    now: Instant,
) -> Result<LeaveOutcome, RoomError> {
    if room.status.is_terminal() {
        return Err(RoomError::RoomDissolved(room.room_id));
    }
    if room.members.remove(&user_id).is_none() {
        return Err(RoomError::NotAMember(user_id, room.room_id));
    }

    if room.members.is_empty() {
        if room.status == RoomStatus::LiveStart {
            room.default_missing_results();
        }
        room.dissolve(now);
        return Ok(LeaveOutcome::Dissolved);
    }

    if room.owner == user_id {
        // Non-empty map, so there is always a first key.
        if let Some(next_owner) = room.members.keys().next().copied() {
            room.owner = next_owner;
            return Ok(LeaveOutcome::OwnerTransferred(next_owner));
        }
    }
    Ok(LeaveOutcome::Left)
}

fn begin_live(room: &mut RoomRecord, user_id: UserId) -> Result<usize, RoomError> {
    if room.owner != user_id {
        return Err(RoomError::PermissionDenied {
            user_id,
            room_id: room.room_id,
        });
    }
    if !room.status.can_transition_to(RoomStatus::LiveStart) {
        return Err(RoomError::InvalidState(format!(
            "cannot start a live in room {} with status {}",
            room.room_id, room.status
        )));
    }

    room.status = RoomStatus::LiveStart;
    room.roster = room.members.keys().copied().collect();
    Ok(room.roster.len())
}
