//! Live sessions: result collection and the result window.
//!
//! A session begins when the owner starts the live and ends when every
//! roster member has a result. The rules for writing and reading results
//! are plain functions over a [`RoomRecord`], applied through the store's
//! compare-and-swap like any other room change, so concurrent submissions
//! for one room are serialized by the record version.
//!
//! The only thing that needs a task is the clock. Each live room gets a
//! [`SessionRunner`]: it sleeps until `first_result_at + result_window`,
//! then writes the zero result for every silent roster member and settles
//! the room.
//!
//! ```text
//!   StartLive ──→ Collecting ──(all results | window elapsed)──→ Settled
//!                     │
//!                     └──(last member leaves)──→ cancelled
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use liveroom_protocol::{
    LiveResult, ResultPhase, ResultReport, RoomId, RoomStatus, UserId,
};
use liveroom_store::{RoomRecord, RoomStore};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::RoomError;
use crate::txn::update_room;

/// Delay before a runner retries a store read or write that failed.
const STORE_RETRY_BACKOFF: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Result rules
// ---------------------------------------------------------------------------

/// Writes `result` for `user_id`. Settles the room if it was the last
/// missing entry.
///
/// Resubmitting overwrites the earlier result.
pub(crate) fn record_result(
    record: &mut RoomRecord,
    user_id: UserId,
    result: LiveResult,
    now: Instant,
) -> Result<ResultPhase, RoomError> {
    if record.status != RoomStatus::LiveStart {
        return Err(RoomError::InvalidState(format!(
            "cannot submit a result to room {} in status {}",
            record.room_id, record.status
        )));
    }
    if !record.in_roster(user_id) {
        return Err(RoomError::NotAMember(user_id, record.room_id));
    }

    record.first_result_at.get_or_insert(now);
    record.results.insert(user_id, result);

    if record.results_complete() {
        record.dissolve(now);
        Ok(ResultPhase::Settled)
    } else {
        Ok(ResultPhase::Collecting)
    }
}

/// Closes the result window: zero results for the silent, then settle.
///
/// A room that is no longer live is left alone. Returns the number of
/// defaulted entries.
pub(crate) fn close_window(record: &mut RoomRecord, now: Instant) -> usize {
    if record.status != RoomStatus::LiveStart {
        return 0;
    }
    let filled = record.default_missing_results();
    record.dissolve(now);
    filled
}

/// Builds the report `user_id` gets from `GetResult`.
pub(crate) fn report(
    record: &RoomRecord,
    user_id: UserId,
) -> Result<ResultReport, RoomError> {
    if !record.has_session() {
        return Err(RoomError::InvalidState(format!(
            "no live has been started in room {}",
            record.room_id
        )));
    }
    if !record.in_roster(user_id) {
        return Err(RoomError::NotAMember(user_id, record.room_id));
    }
    let phase = if record.status.is_terminal() {
        ResultPhase::Settled
    } else {
        ResultPhase::Collecting
    };
    Ok(ResultReport {
        phase,
        results: record.results.clone(),
    })
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// The engine's side of one running session.
struct SessionEntry {
    /// Wakes the runner after a result was recorded.
    results: mpsc::Sender<()>,
    cancel: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Running sessions, keyed by room.
///
/// At most one entry per room: a room goes `Waiting → LiveStart` once.
#[derive(Default)]
pub(crate) struct SessionRegistry {
    entries: Mutex<HashMap<RoomId, SessionEntry>>,
}

impl SessionRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<RoomId, SessionEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns the runner for a room that just entered `LiveStart`.
    pub(crate) fn spawn<S: RoomStore>(
        self: &Arc<Self>,
        room_id: RoomId,
        store: Arc<S>,
        window: Duration,
        max_attempts: u32,
        channel_size: usize,
    ) {
        let (results_tx, results_rx) = mpsc::channel(channel_size);
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let runner = SessionRunner {
            room: LiveRoom {
                room_id,
                store,
                window,
                max_attempts,
            },
            registry: Arc::clone(self),
            results: results_rx,
            cancel: cancel_rx,
        };

        // The lock is held across the spawn so that a submission which
        // misses the entry is guaranteed to be seen by the runner's first
        // read of the record.
        let mut entries = self.lock();
        let task = tokio::spawn(runner.run());
        entries.insert(
            room_id,
            SessionEntry {
                results: results_tx,
                cancel: cancel_tx,
                task,
            },
        );
    }

    /// Tells the room's runner that a result was recorded.
    pub(crate) fn notify(&self, room_id: RoomId) {
        if let Some(entry) = self.lock().get(&room_id) {
            // A full buffer already holds a pending wake-up.
            let _ = entry.results.try_send(());
        }
    }

    /// Stops the room's runner, if one is running.
    ///
    /// Returns the task so the caller may wait for it to finish.
    pub(crate) fn cancel(&self, room_id: RoomId) -> Option<JoinHandle<()>> {
        let entry = self.lock().remove(&room_id)?;
        let _ = entry.cancel.send(());
        tracing::debug!(%room_id, "session runner cancelled");
        Some(entry.task)
    }

    /// Stops every runner and returns their tasks.
    pub(crate) fn cancel_all(&self) -> Vec<JoinHandle<()>> {
        let entries: Vec<SessionEntry> =
            self.lock().drain().map(|(_, entry)| entry).collect();
        entries
            .into_iter()
            .map(|entry| {
                let _ = entry.cancel.send(());
                entry.task
            })
            .collect()
    }

    pub(crate) fn contains(&self, room_id: RoomId) -> bool {
        self.lock().contains_key(&room_id)
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    /// Called by a runner on its way out.
    fn release(&self, room_id: RoomId) {
        self.lock().remove(&room_id);
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// What a runner learned from re-reading its room.
enum Watch {
    /// The room is gone or no longer live. Nothing left to do.
    Done,
    /// Still collecting. `None` until the first result arrives.
    Until(Option<Instant>),
}

/// Background task supervising one live room's result window.
struct SessionRunner<S: RoomStore> {
    room: LiveRoom<S>,
    registry: Arc<SessionRegistry>,
    results: mpsc::Receiver<()>,
    cancel: oneshot::Receiver<()>,
}

/// The store-facing half of a runner.
struct LiveRoom<S: RoomStore> {
    room_id: RoomId,
    store: Arc<S>,
    window: Duration,
    max_attempts: u32,
}

impl<S: RoomStore> SessionRunner<S> {
    async fn run(self) {
        let SessionRunner {
            room,
            registry,
            mut results,
            mut cancel,
        } = self;
        let room_id = room.room_id;
        tracing::debug!(%room_id, "session runner started");

        let mut deadline: Option<Instant> = None;
        // Set while a failed read waits to be repeated. Until it succeeds
        // the runner may not know that the window has opened.
        let mut reread_at: Option<Instant> = None;
        let mut stale = true;

        loop {
            if stale {
                stale = false;
                match room.refresh().await {
                    Ok(Watch::Done) => break,
                    Ok(Watch::Until(next)) => {
                        deadline = next;
                        reread_at = None;
                    }
                    Err(err) => {
                        tracing::warn!(
                            %room_id,
                            error = %err,
                            "session runner could not read room, retrying"
                        );
                        reread_at = Some(Instant::now() + STORE_RETRY_BACKOFF);
                    }
                }
            }

            tokio::select! {
                _ = &mut cancel => break,
                woken = results.recv() => match woken {
                    Some(()) => stale = true,
                    None => break,
                },
                () = wait_for_deadline(reread_at) => stale = true,
                () = wait_for_deadline(deadline) => match room.expire().await {
                    Ok(()) => break,
                    Err(err) => {
                        tracing::warn!(
                            %room_id,
                            error = %err,
                            "closing result window failed, retrying"
                        );
                        deadline = Some(Instant::now() + STORE_RETRY_BACKOFF);
                    }
                },
            }
        }

        registry.release(room_id);
        tracing::debug!(%room_id, "session runner stopped");
    }
}

impl<S: RoomStore> LiveRoom<S> {
    async fn refresh(&self) -> Result<Watch, RoomError> {
        let Some(current) = self.store.load(self.room_id).await? else {
            return Ok(Watch::Done);
        };
        let record = current.value;
        if record.status != RoomStatus::LiveStart {
            return Ok(Watch::Done);
        }
        Ok(Watch::Until(record.first_result_at.map(|t| t + self.window)))
    }

    async fn expire(&self) -> Result<(), RoomError> {
        let outcome = update_room(
            self.store.as_ref(),
            self.room_id,
            self.max_attempts,
            |record| Ok(close_window(record, Instant::now())),
        )
        .await;

        match outcome {
            Ok((defaulted, record)) => {
                if record.status.is_terminal() {
                    tracing::info!(
                        room_id = %self.room_id,
                        defaulted,
                        results = record.results.len(),
                        "result window elapsed, session settled"
                    );
                }
                Ok(())
            }
            // Torn down while we slept.
            Err(RoomError::NotFound(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// Resolves at `deadline`, or never when there is none yet.
async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
