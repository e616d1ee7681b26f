//! Room configuration and lifecycle state.

use std::time::Duration;

use nightfall_game::GameConfig;
use nightfall_protocol::Phase;
use nightfall_timer::TimerConfig;

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration shared by every room a registry creates.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Game rules: phase durations, player limits, text limits.
    pub game: GameConfig,

    /// Tick interval of each room's phase timer.
    pub timer: TimerConfig,

    /// How long a disconnected, alive player keeps their seat mid-game
    /// before forfeiting.
    pub reconnect_grace: Duration,

    /// How long an ended room lingers before the janitor evicts it.
    pub ended_room_ttl: Duration,

    /// Capacity of each room's command channel.
    pub channel_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            game: GameConfig::default(),
            timer: TimerConfig::default(),
            reconnect_grace: Duration::from_secs(30),
            ended_room_ttl: Duration::from_secs(300),
            channel_size: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// ```text
/// Lobby → InProgress → Ended → (evicted)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    /// Accepting new players; no roles yet.
    Lobby,
    /// A game is running. Only known names may (re)join.
    InProgress,
    /// The game is over; the room waits for eviction.
    Ended,
}

impl RoomState {
    pub fn from_phase(phase: Phase) -> Self {
        match phase {
            Phase::Lobby => Self::Lobby,
            Phase::Ended => Self::Ended,
            _ => Self::InProgress,
        }
    }
}

impl std::fmt::Display for RoomState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lobby => write!(f, "Lobby"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Ended => write!(f, "Ended"),
        }
    }
}
