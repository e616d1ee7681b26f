//! The session manager: tracks every live or recently dropped connection.
//!
//! `SessionManager` is not thread-safe by itself. The server owns it inside
//! the room registry, behind the registry's mutex.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use nightfall_protocol::{RoomId, SessionId};

use crate::{Session, SessionConfig, SessionError, SessionState};

/// Registry of sessions, keyed by [`SessionId`].
///
/// ```text
/// connect() ──→ bind() ──→ disconnect() ──→ expire_stale() ──→ cleanup_expired()
/// [Connected]  [+ room]    [Disconnected]      [Expired]          (removed)
/// ```
pub struct SessionManager {
    sessions: HashMap<SessionId, Session>,
    config: SessionConfig,
}

impl SessionManager {
    /// Creates a new, empty session manager with the given config.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            config,
        }
    }

    /// Returns the configured grace period.
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.config.reconnect_grace_secs)
    }

    /// Registers a freshly accepted connection.
    ///
    /// # Errors
    /// [`SessionError::AlreadyConnected`] if the id is already registered
    /// and still connected.
    pub fn connect(&mut self, id: SessionId) -> Result<&Session, SessionError> {
        if let Some(existing) = self.sessions.get(&id) {
            if existing.is_connected() {
                return Err(SessionError::AlreadyConnected(id));
            }
        }

        let session = Session {
            id,
            state: SessionState::Connected,
            room: None,
        };
        tracing::debug!(session_id = %id, "session connected");

        let slot = self.sessions.entry(id).insert_entry(session);
        Ok(slot.into_mut())
    }

    /// Binds a connected session to a room.
    ///
    /// Binding to the room the session is already in is a no-op.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`]: unknown session
    /// - [`SessionError::NotConnected`]: the session has dropped
    /// - [`SessionError::AlreadyBound`]: bound to a different room
    pub fn bind(&mut self, id: SessionId, room: RoomId) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::NotFound(id))?;

        if !session.is_connected() {
            return Err(SessionError::NotConnected(id));
        }

        match &session.room {
            Some(current) if *current == room => Ok(()),
            Some(current) => Err(SessionError::AlreadyBound {
                session: id,
                room: current.clone(),
            }),
            None => {
                tracing::debug!(session_id = %id, room_id = %room, "session bound to room");
                session.room = Some(room);
                Ok(())
            }
        }
    }

    /// Clears a session's room binding. Returns the room it was bound to.
    pub fn unbind(&mut self, id: SessionId) -> Option<RoomId> {
        self.sessions.get_mut(&id).and_then(|s| s.room.take())
    }

    /// The room a session is bound to, if any.
    pub fn room_of(&self, id: SessionId) -> Option<&RoomId> {
        self.sessions.get(&id).and_then(|s| s.room.as_ref())
    }

    /// Every connected session bound to `room`.
    pub fn connected_in(&self, room: &RoomId) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|s| s.is_connected() && s.room.as_ref() == Some(room))
            .map(|s| s.id)
            .collect();
        ids.sort();
        ids
    }

    /// Marks a session as disconnected and starts its grace period.
    ///
    /// Returns the room the session was bound to so the caller can tell
    /// the room about it.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if no session exists.
    pub fn disconnect(&mut self, id: SessionId) -> Result<Option<RoomId>, SessionError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::NotFound(id))?;

        session.state = SessionState::Disconnected {
            since: Instant::now(),
        };

        tracing::debug!(session_id = %id, room_id = ?session.room, "session disconnected");
        Ok(session.room.clone())
    }

    /// Expires every disconnected session whose grace period has elapsed.
    ///
    /// Returns the ids that were expired.
    pub fn expire_stale(&mut self) -> Vec<SessionId> {
        let grace = self.grace();
        let mut expired = Vec::new();

        for session in self.sessions.values_mut() {
            if let SessionState::Disconnected { since } = &session.state {
                if since.elapsed() >= grace {
                    session.state = SessionState::Expired;
                    expired.push(session.id);
                }
            }
        }

        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "sessions expired");
        }
        expired.sort();
        expired
    }

    /// Removes every expired session.
    ///
    /// Kept separate from `expire_stale` so the caller can react to
    /// expirations before the records disappear.
    pub fn cleanup_expired(&mut self) {
        self.sessions
            .retain(|_, session| !matches!(session.state, SessionState::Expired));
    }

    /// Drops every session bound to `room`, whatever its state.
    pub fn forget_room(&mut self, room: &RoomId) {
        for session in self.sessions.values_mut() {
            if session.room.as_ref() == Some(room) {
                session.room = None;
            }
        }
    }

    /// Looks up a session.
    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// Number of tracked sessions (any state).
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
