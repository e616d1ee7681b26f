//! Session types: one record per transport connection.

use std::time::Instant;

use nightfall_protocol::{RoomId, SessionId};

/// Configuration for session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long (in seconds) a disconnected session is kept before it is
    /// expired. Rooms use the same window to hold a dropped player's seat.
    ///
    /// Default: 30 seconds.
    pub reconnect_grace_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_grace_secs: 30,
        }
    }
}

/// Lifecycle of a session.
///
/// ```text
///   Connected ──(disconnect)──→ Disconnected ──(grace elapsed)──→ Expired
/// ```
///
/// There is no edge back to `Connected`: a returning player opens a new
/// session and reclaims their seat by name.
#[derive(Debug, Clone)]
pub enum SessionState {
    Connected,
    Disconnected { since: Instant },
    Expired,
}

/// A single connection's session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub state: SessionState,
    /// The room this session created or joined.
    pub room: Option<RoomId>,
}

impl Session {
    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected)
    }
}
