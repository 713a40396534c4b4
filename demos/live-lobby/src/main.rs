use std::time::Duration;

use liveroom::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Accepts tokens of the form `player-<id>`.
struct PlayerTokens;

impl Authenticator for PlayerTokens {
    async fn authenticate(&self, token: &str) -> Result<UserId, IdentityError> {
        token
            .strip_prefix("player-")
            .and_then(|id| id.parse().ok())
            .filter(|id| *id > 0)
            .map(UserId)
            .ok_or_else(|| IdentityError::Unauthorized(format!("unknown token {token:?}")))
    }
}

fn bearer(player: u64) -> String {
    format!("Bearer player-{player}")
}

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

const LIVE: u64 = 1001;
const NORMAL: u8 = 1;
const HARD: u8 = 2;

/// Plays one room from creation to settlement: three players, one of whom
/// never submits, so the room settles when the result window closes.
async fn play_one_room(
    lobby: &Lobby<MemoryRoomStore, PlayerTokens>,
) -> Result<ResultReport, LiveroomError> {
    let host = bearer(1);
    let room = lobby.create_room(&host, LIVE, NORMAL).await?;

    for player in [2, 3] {
        let listed = lobby.list_rooms(&bearer(player), LIVE).await?;
        tracing::info!(player, rooms = listed.len(), "browsing rooms");
        let joined = lobby.join_room(&bearer(player), room.0, HARD).await?;
        tracing::info!(player, ?joined, "join attempt");
    }

    // Capacity is 3: the fourth player is turned away.
    let late = lobby.join_room(&bearer(4), room.0, NORMAL).await?;
    tracing::info!(?late, "late joiner");

    let snapshot = lobby.wait_room(&bearer(2), room.0).await?;
    for member in &snapshot.members {
        tracing::info!(
            user = %member.user_id,
            difficulty = ?member.difficulty,
            host = member.is_host,
            "in room"
        );
    }

    lobby.start_live(&host, room.0).await?;

    let scores = [(1, 912_000), (2, 874_500)];
    for (player, score) in scores {
        let result = LiveResult {
            score,
            judge_counts: [score / 1_000, 40, 6, 1, 2],
        };
        let phase = lobby.submit_result(&bearer(player), room.0, result).await?;
        tracing::info!(player, score, ?phase, "result submitted");
    }

    // Player 3 stays silent; poll until the window closes.
    loop {
        let report = lobby.get_result(&host, room.0).await?;
        if report.phase == ResultPhase::Settled {
            return Ok(report);
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let lobby = LobbyBuilder::new()
        .max_members(3)
        .result_window(Duration::from_secs(2))
        .dissolved_retention(Duration::ZERO)
        .build(PlayerTokens);

    let report = play_one_room(&lobby).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    let swept = lobby.sweep_dissolved().await?;
    tracing::info!(swept, "cleanup done");
    lobby.shutdown().await;
    Ok(())
}
