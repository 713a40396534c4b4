//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// System-wide settings for the matchmaking engine.
///
/// All rooms share one capacity and one result window. Override individual
/// fields with struct-update syntax:
///
/// ```rust
/// use std::time::Duration;
/// use liveroom_room::EngineConfig;
///
/// let config = EngineConfig {
///     result_window: Duration::from_secs(10),
///     ..EngineConfig::default()
/// };
/// assert_eq!(config.max_members, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum members per room.
    pub max_members: usize,

    /// How long to keep collecting results after the first one arrives.
    /// Roster members without a result by then get the zero result.
    pub result_window: Duration,

    /// Total compare-and-swap attempts per operation, the first one
    /// included. Only version conflicts lead to another attempt.
    pub max_cas_attempts: u32,

    /// Buffer size of each session runner's notification channel.
    pub session_channel_size: usize,

    /// How long a dissolved room stays readable before a sweep removes it.
    pub dissolved_retention: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_members: 4,
            result_window: Duration::from_secs(5),
            max_cas_attempts: 8,
            session_channel_size: 16,
            dissolved_retention: Duration::from_secs(60),
        }
    }
}

impl EngineConfig {
    /// Fixes values that would make the engine unusable.
    ///
    /// Called by [`MatchmakingEngine::new`](crate::MatchmakingEngine::new).
    /// Capacity, attempt budget, and channel size are raised to at least 1.
    pub fn validated(mut self) -> Self {
        if self.max_members == 0 {
            tracing::warn!("max_members is 0, raising to 1");
            self.max_members = 1;
        }
        if self.max_cas_attempts == 0 {
            tracing::warn!("max_cas_attempts is 0, raising to 1");
            self.max_cas_attempts = 1;
        }
        if self.session_channel_size == 0 {
            self.session_channel_size = 1;
        }
        self
    }
}
