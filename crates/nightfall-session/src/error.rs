//! Error types for the session layer.

use nightfall_protocol::{RoomId, SessionId};

/// Errors that can occur during session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given id.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// `connect` was called twice for the same connection.
    #[error("session {0} is already connected")]
    AlreadyConnected(SessionId),

    /// The session is already bound to a room.
    #[error("session {session} is already in room {room}")]
    AlreadyBound { session: SessionId, room: RoomId },

    /// The session has disconnected and can no longer be bound.
    #[error("session {0} is not connected")]
    NotConnected(SessionId),
}
