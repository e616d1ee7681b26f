//! Error types for the room layer.

use nightfall_game::GameError;
use nightfall_protocol::{RoomId, SessionId};
use nightfall_session::SessionError;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No room has this code.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The session has not created or joined a room.
    #[error("session {0} is not in a room")]
    NotInRoom(SessionId),

    /// The session is already bound to a room.
    #[error("session {0} is already in room {1}")]
    AlreadyInRoom(SessionId, RoomId),

    /// The room's command channel is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),

    /// The game rules refused the request.
    #[error(transparent)]
    Rejected(#[from] GameError),

    /// Session bookkeeping failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl RoomError {
    /// Numeric code sent to clients in `error` events.
    pub fn code(&self) -> u16 {
        match self {
            Self::Rejected(e) => e.code(),
            Self::NotFound(_) | Self::NotInRoom(_) => 404,
            Self::AlreadyInRoom(..) => 409,
            Self::Unavailable(_) => 503,
            Self::Session(_) => 400,
        }
    }
}
