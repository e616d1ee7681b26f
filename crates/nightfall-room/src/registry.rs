//! Room registry: creates rooms, tracks sessions, and routes commands.

use std::collections::HashMap;
use std::time::Duration;

use nightfall_game::Action;
use nightfall_protocol::{RoomId, SessionId};
use nightfall_session::{SessionConfig, SessionManager};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::room::spawn_room;
use crate::{EventSender, JoinReply, RoomConfig, RoomError, RoomHandle, RoomInfo, RoomState};

/// Characters a room code is drawn from.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Owns every live room and the session index.
///
/// This is the entry point for room operations from the server. It is not
/// thread-safe by itself; the server keeps it behind a mutex. Room actors
/// never call back into the registry.
pub struct RoomRegistry {
    rooms: HashMap<RoomId, RoomHandle>,
    sessions: SessionManager,
    config: RoomConfig,
    /// Source of room codes and of each room's own seed.
    rng: StdRng,
}

impl RoomRegistry {
    pub fn new(config: RoomConfig, session_config: SessionConfig) -> Self {
        Self::with_rng(config, session_config, StdRng::from_os_rng())
    }

    /// Like [`new`](Self::new) with a caller-chosen RNG, so codes and role
    /// deals are reproducible.
    pub fn with_rng(config: RoomConfig, session_config: SessionConfig, rng: StdRng) -> Self {
        Self {
            rooms: HashMap::new(),
            sessions: SessionManager::new(session_config),
            config,
            rng,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Registers a newly accepted connection.
    pub fn connect(&mut self, session: SessionId) -> Result<(), RoomError> {
        self.sessions.connect(session)?;
        Ok(())
    }

    /// Creates a room and binds its creator to it.
    ///
    /// The creator is not seated; they still join under a name like
    /// everyone else.
    pub fn create_room(&mut self, session: SessionId) -> Result<RoomId, RoomError> {
        if let Some(current) = self.sessions.room_of(session) {
            return Err(RoomError::AlreadyInRoom(session, current.clone()));
        }

        let room_id = self.fresh_code();
        let handle = spawn_room(
            room_id.clone(),
            self.config.clone(),
            StdRng::from_rng(&mut self.rng),
        );
        self.rooms.insert(room_id.clone(), handle);
        self.sessions.bind(session, room_id.clone())?;

        tracing::info!(%room_id, %session, "room created");
        Ok(room_id)
    }

    /// Seats a session in the room named by `raw_code`.
    ///
    /// The code is matched case-insensitively. A session may only ever be
    /// in one room.
    pub async fn join_room(
        &mut self,
        session: SessionId,
        raw_code: &str,
        name: &str,
        sender: EventSender,
    ) -> Result<(RoomId, JoinReply), RoomError> {
        let pending = self.begin_join(session, raw_code)?;
        match pending.handle.join(session, name, sender).await {
            Ok(reply) => Ok((pending.room_id, reply)),
            Err(e) => {
                self.abort_join(session, &pending);
                Err(e)
            }
        }
    }

    /// First half of [`join_room`](Self::join_room): resolves the code and
    /// binds the session to the room before the room is asked for a seat.
    ///
    /// While the join is in flight the session counts as connected in the
    /// room, so an emptied lobby is not destroyed under it. The caller
    /// awaits `pending.handle.join` without holding the registry, then
    /// calls [`abort_join`](Self::abort_join) if it failed.
    pub fn begin_join(&mut self, session: SessionId, raw_code: &str) -> Result<PendingJoin, RoomError> {
        let room_id = RoomId::normalize(raw_code);
        let handle = self
            .rooms
            .get(&room_id)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;

        let newly_bound = match self.sessions.room_of(session) {
            Some(current) if *current == room_id => false,
            Some(current) => return Err(RoomError::AlreadyInRoom(session, current.clone())),
            None => {
                self.sessions.bind(session, room_id.clone())?;
                true
            }
        };

        Ok(PendingJoin {
            room_id,
            handle,
            newly_bound,
        })
    }

    /// Undoes the binding [`begin_join`](Self::begin_join) made for a join
    /// the room refused.
    pub fn abort_join(&mut self, session: SessionId, pending: &PendingJoin) {
        if pending.newly_bound && self.sessions.room_of(session) == Some(&pending.room_id) {
            self.sessions.unbind(session);
        }
    }

    /// Starts the game in the session's room.
    pub async fn start_game(&self, session: SessionId) -> Result<(), RoomError> {
        self.handle_of(session)?.start().await
    }

    /// Forwards a gameplay action to the session's room.
    pub async fn route_action(&self, session: SessionId, action: Action) -> Result<(), RoomError> {
        self.handle_of(session)?.act(session, action).await
    }

    /// Handles a closed connection.
    ///
    /// A lobby room that is left with no seats and no connected sessions is
    /// destroyed on the spot.
    pub async fn disconnect(&mut self, session: SessionId) -> Result<(), RoomError> {
        let Some(handle) = self.begin_disconnect(session)? else {
            return Ok(());
        };
        let info = handle.disconnect(session).await?;
        self.finish_disconnect(info).await
    }

    /// Marks the session dropped and returns its room, if it had a live
    /// one. The caller tells the room through the handle, then passes the
    /// room's reply to [`finish_disconnect`](Self::finish_disconnect).
    pub fn begin_disconnect(&mut self, session: SessionId) -> Result<Option<RoomHandle>, RoomError> {
        let Some(room_id) = self.sessions.disconnect(session)? else {
            return Ok(None);
        };
        Ok(self.rooms.get(&room_id).cloned())
    }

    /// Destroys the room described by `info` if it is an emptied lobby.
    pub async fn finish_disconnect(&mut self, info: RoomInfo) -> Result<(), RoomError> {
        let room_id = info.room_id;
        if info.state == RoomState::Lobby
            && info.seat_count == 0
            && self.rooms.contains_key(&room_id)
            && self.sessions.connected_in(&room_id).is_empty()
        {
            tracing::info!(%room_id, "lobby emptied");
            self.destroy_room(&room_id).await?;
        }
        Ok(())
    }

    /// Shuts a room down and unbinds its sessions.
    pub async fn destroy_room(&mut self, room_id: &RoomId) -> Result<(), RoomError> {
        let handle = self
            .rooms
            .remove(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;

        let _ = handle.shutdown().await;
        self.sessions.forget_room(room_id);

        tracing::info!(%room_id, "room destroyed");
        Ok(())
    }

    pub async fn room_info(&self, room_id: &RoomId) -> Result<RoomInfo, RoomError> {
        let handle = self
            .rooms
            .get(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
        handle.info().await
    }

    /// Returns the room a session is bound to, if any.
    pub fn room_of(&self, session: SessionId) -> Option<&RoomId> {
        self.sessions.room_of(session)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Destroys every room whose game ended at least `ended_room_ttl` ago.
    ///
    /// Rooms that fail to respond are skipped. Returns the evicted codes.
    pub async fn evict_ended(&mut self) -> Vec<RoomId> {
        let expired = find_ended(self.handles(), self.config.ended_room_ttl).await;
        self.destroy_rooms(&expired).await;
        expired
    }

    /// A handle to every live room.
    pub fn handles(&self) -> Vec<RoomHandle> {
        self.rooms.values().cloned().collect()
    }

    /// Destroys each listed room that still exists.
    pub async fn destroy_rooms(&mut self, room_ids: &[RoomId]) {
        for room_id in room_ids {
            let _ = self.destroy_room(room_id).await;
        }
    }

    /// Expires and removes sessions whose grace period has run out.
    /// Returns how many were removed.
    pub fn sweep_sessions(&mut self) -> usize {
        let expired = self.sessions.expire_stale();
        self.sessions.cleanup_expired();
        expired.len()
    }

    /// A handle to the room the session is bound to.
    pub fn handle_of(&self, session: SessionId) -> Result<RoomHandle, RoomError> {
        let room_id = self
            .sessions
            .room_of(session)
            .ok_or(RoomError::NotInRoom(session))?;
        self.rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))
    }

    fn fresh_code(&mut self) -> RoomId {
        loop {
            let code: String = (0..RoomId::CODE_LEN)
                .map(|_| char::from(CODE_ALPHABET[self.rng.random_range(0..CODE_ALPHABET.len())]))
                .collect();
            let room_id = RoomId::normalize(&code);
            if !self.rooms.contains_key(&room_id) {
                return room_id;
            }
        }
    }
}

/// A join whose room round trip is still outstanding.
pub struct PendingJoin {
    pub room_id: RoomId,
    pub handle: RoomHandle,
    /// The session was unbound before this join.
    newly_bound: bool,
}

/// Asks every room for its info and returns the codes of those whose game
/// ended at least `ttl` ago, sorted.
pub async fn find_ended(handles: Vec<RoomHandle>, ttl: Duration) -> Vec<RoomId> {
    let mut expired = Vec::new();
    for handle in handles {
        if let Ok(info) = handle.info().await {
            if info.ended_at.is_some_and(|at| at.elapsed() >= ttl) {
                expired.push(info.room_id);
            }
        }
    }
    expired.sort();
    expired
}
