//! `Lobby` builder and the authenticated entry points.
//!
//! A transport (HTTP, gRPC, a test harness) hands each request to the
//! lobby as the raw `Authorization` header plus raw wire values. The lobby
//! identifies the caller, decodes the values into typed ids, and calls the
//! engine:
//!
//! ```text
//! header ──bearer_token──→ token ──Authenticator──→ UserId ─┐
//! raw u64 / u8 ──decode───→ RoomId / LiveId / Difficulty ───┴─→ MatchmakingEngine
//! ```

use std::sync::Arc;
use std::time::Duration;

use liveroom_identity::{Authenticator, bearer_token};
use liveroom_protocol::{
    Difficulty, JoinResult, LiveId, LiveResult, ResultPhase, ResultReport,
    RoomId, RoomSnapshot, RoomSummary, UserId,
};
use liveroom_room::{EngineConfig, LeaveOutcome, MatchmakingEngine, RoomError};
use liveroom_store::{MemoryRoomStore, RoomStore};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::LiveroomError;

/// Builder for configuring a [`Lobby`].
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use liveroom::prelude::*;
///
/// let tokens = TokenTable::new();
/// tokens.register("secret", UserId(1));
///
/// let lobby = LobbyBuilder::new()
///     .max_members(2)
///     .result_window(Duration::from_secs(30))
///     .build(tokens);
/// assert_eq!(lobby.engine().config().max_members, 2);
/// ```
pub struct LobbyBuilder {
    config: EngineConfig,
}

impl LobbyBuilder {
    /// Creates a builder with the default [`EngineConfig`].
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    /// Replaces the whole engine configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the room capacity.
    pub fn max_members(mut self, max_members: usize) -> Self {
        self.config.max_members = max_members;
        self
    }

    /// Sets how long results are collected after the first one arrives.
    pub fn result_window(mut self, window: Duration) -> Self {
        self.config.result_window = window;
        self
    }

    /// Sets how long dissolved rooms stay readable.
    pub fn dissolved_retention(mut self, retention: Duration) -> Self {
        self.config.dissolved_retention = retention;
        self
    }

    /// Builds a lobby over a fresh in-memory store.
    pub fn build<A: Authenticator>(self, auth: A) -> Lobby<MemoryRoomStore, A> {
        self.build_with_store(Arc::new(MemoryRoomStore::new()), auth)
    }

    /// Builds a lobby over the given store.
    pub fn build_with_store<S: RoomStore, A: Authenticator>(
        self,
        store: Arc<S>,
        auth: A,
    ) -> Lobby<S, A> {
        let engine = MatchmakingEngine::new(store, self.config);
        tracing::info!(
            max_members = engine.config().max_members,
            result_window_ms = engine.config().result_window.as_millis() as u64,
            "lobby ready"
        );
        Lobby { engine, auth }
    }
}

impl Default for LobbyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Token-authenticated front door to the matchmaking engine.
///
/// Every operation takes the caller's `Authorization` header value
/// (`"Bearer <token>"`) first. Identity problems surface as
/// [`LiveroomError::Identity`]; undecodable values such as an unknown
/// difficulty code as [`RoomError::InvalidArgument`].
pub struct Lobby<S: RoomStore, A: Authenticator> {
    engine: MatchmakingEngine<S>,
    auth: A,
}

impl<S: RoomStore, A: Authenticator> Lobby<S, A> {
    /// The engine behind this lobby, for callers that are already
    /// authenticated.
    pub fn engine(&self) -> &MatchmakingEngine<S> {
        &self.engine
    }

    pub fn authenticator(&self) -> &A {
        &self.auth
    }

    /// Resolves the caller behind an `Authorization` header.
    pub async fn identify(
        &self,
        authorization: &str,
    ) -> Result<UserId, LiveroomError> {
        let token = bearer_token(authorization)?;
        match self.auth.authenticate(token).await {
            Ok(user_id) => Ok(user_id),
            Err(err) => {
                tracing::debug!(error = %err, "authentication failed");
                Err(err.into())
            }
        }
    }

    /// Creates a room for `live_id` and makes the caller its owner.
    pub async fn create_room(
        &self,
        authorization: &str,
        live_id: u64,
        difficulty: u8,
    ) -> Result<RoomId, LiveroomError> {
        let user_id = self.identify(authorization).await?;
        let difficulty = decode_difficulty(difficulty)?;
        Ok(self
            .engine
            .create_room(user_id, LiveId(live_id), difficulty)
            .await?)
    }

    /// Joins the caller to a room at their chosen difficulty.
    pub async fn join_room(
        &self,
        authorization: &str,
        room_id: u64,
        difficulty: u8,
    ) -> Result<JoinResult, LiveroomError> {
        let user_id = self.identify(authorization).await?;
        let difficulty = decode_difficulty(difficulty)?;
        Ok(self
            .engine
            .join_room(user_id, RoomId(room_id), difficulty)
            .await?)
    }

    pub async fn leave_room(
        &self,
        authorization: &str,
        room_id: u64,
    ) -> Result<LeaveOutcome, LiveroomError> {
        let user_id = self.identify(authorization).await?;
        Ok(self.engine.leave_room(user_id, RoomId(room_id)).await?)
    }

    /// Starts the live. The caller must own the room.
    pub async fn start_live(
        &self,
        authorization: &str,
        room_id: u64,
    ) -> Result<(), LiveroomError> {
        let user_id = self.identify(authorization).await?;
        Ok(self.engine.start_live(user_id, RoomId(room_id)).await?)
    }

    pub async fn submit_result(
        &self,
        authorization: &str,
        room_id: u64,
        result: LiveResult,
    ) -> Result<ResultPhase, LiveroomError> {
        let user_id = self.identify(authorization).await?;
        Ok(self
            .engine
            .submit_result(user_id, RoomId(room_id), result)
            .await?)
    }

    pub async fn get_result(
        &self,
        authorization: &str,
        room_id: u64,
    ) -> Result<ResultReport, LiveroomError> {
        let user_id = self.identify(authorization).await?;
        Ok(self.engine.get_result(user_id, RoomId(room_id)).await?)
    }

    pub async fn wait_room(
        &self,
        authorization: &str,
        room_id: u64,
    ) -> Result<RoomSnapshot, LiveroomError> {
        let user_id = self.identify(authorization).await?;
        Ok(self.engine.wait_room(user_id, RoomId(room_id)).await?)
    }

    /// Lists waiting rooms; `live_id` 0 lists all of them.
    pub async fn list_rooms(
        &self,
        authorization: &str,
        live_id: u64,
    ) -> Result<Vec<RoomSummary>, LiveroomError> {
        self.identify(authorization).await?;
        Ok(self.engine.list_rooms(LiveId(live_id)).await?)
    }

    pub async fn sweep_dissolved(&self) -> Result<usize, LiveroomError> {
        Ok(self.engine.sweep_dissolved().await?)
    }

    /// Cancels every session runner. See [`MatchmakingEngine::shutdown`].
    pub async fn shutdown(&self) {
        self.engine.shutdown().await;
    }

    /// Spawns a task that sweeps dissolved rooms every `period`.
    ///
    /// The task runs until aborted. A failed sweep is logged and retried
    /// on the next tick.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let lobby = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(err) = lobby.sweep_dissolved().await {
                    tracing::warn!(error = %err, "dissolved-room sweep failed");
                }
            }
        })
    }
}

fn decode_difficulty(raw: u8) -> Result<Difficulty, RoomError> {
    Ok(Difficulty::try_from(raw)?)
}
