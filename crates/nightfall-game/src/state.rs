//! Room game state.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use nightfall_protocol::{
    ChatMessage, Phase, PlayerId, Recipient, Role, RoomId, ServerEvent, SessionId, VoteTally,
};
use rand::rngs::StdRng;

use crate::GameConfig;

/// Events produced by one state transition, in delivery order.
pub type Outbox = Vec<(Recipient, ServerEvent)>;

/// A seat in the room.
///
/// Seats outlive connections: `session` is rebound when a player reconnects
/// under the same name, and a dead player's seat stays for spectating.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// `Villager` until the game starts.
    pub role: Role,
    pub alive: bool,
    pub session: SessionId,
    pub connected: bool,
    pub disconnected_at: Option<Instant>,
}

impl Player {
    pub fn new(id: PlayerId, name: String, session: SessionId) -> Self {
        Self {
            id,
            name,
            role: Role::Villager,
            alive: true,
            session,
            connected: true,
            disconnected_at: None,
        }
    }
}

/// Snapshot taken when the results phase opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteResults {
    pub breakdown: Vec<VoteTally>,
    /// Decided at reveal time, applied when the phase ends.
    pub eliminated: Option<PlayerId>,
}

/// Everything one room knows about its game.
///
/// All mutation goes through the action and phase methods, each of which
/// returns the events to deliver. Nothing here does I/O or keeps time: the
/// room actor owns the timer and asks [`GameState::phase_duration`] how long
/// to arm it whenever [`GameState::epoch`] moves.
pub struct GameState {
    pub(crate) room_id: RoomId,
    pub(crate) config: GameConfig,
    pub(crate) phase: Phase,
    pub(crate) round: u32,
    pub(crate) players: HashMap<PlayerId, Player>,
    /// Join order. Frozen at game start and used for role assignment.
    pub(crate) seating: Vec<PlayerId>,
    pub(crate) chat: Vec<ChatMessage>,
    pub(crate) werewolf_chat: Vec<ChatMessage>,
    /// Keyed by voter session; one overwritable vote each.
    pub(crate) votes: HashMap<SessionId, PlayerId>,
    pub(crate) self_heals_left: HashMap<PlayerId, u8>,
    pub(crate) pending_kill: Option<PlayerId>,
    /// First accepted kill of the night. Outlives a heal of the target.
    pub(crate) kill_lock: Option<PlayerId>,
    pub(crate) vote_results: Option<VoteResults>,
    pub(crate) snitch_used: HashSet<PlayerId>,
    pub(crate) next_player_id: u64,
    pub(crate) epoch: u64,
    pub(crate) rng: StdRng,
}

impl GameState {
    pub fn new(room_id: RoomId, config: GameConfig, rng: StdRng) -> Self {
        Self {
            room_id,
            config,
            phase: Phase::Lobby,
            round: 0,
            players: HashMap::new(),
            seating: Vec::new(),
            chat: Vec::new(),
            werewolf_chat: Vec::new(),
            votes: HashMap::new(),
            self_heals_left: HashMap::new(),
            pending_kill: None,
            kill_lock: None,
            vote_results: None,
            snitch_used: HashSet::new(),
            next_player_id: 1,
            epoch: 0,
            rng,
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// `true` from `start_game` onwards, including after the game ended.
    pub fn is_started(&self) -> bool {
        self.phase != Phase::Lobby
    }

    pub fn is_ended(&self) -> bool {
        self.phase == Phase::Ended
    }

    /// Bumped on every phase entry. The room re-arms its timer when it moves.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// How long the current phase lasts, `None` if it is untimed.
    pub fn phase_duration(&self) -> Option<Duration> {
        self.config.durations.of(self.phase)
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_by_session(&self, session: SessionId) -> Option<&Player> {
        self.players.values().find(|p| p.session == session)
    }

    /// Seats in join order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.seating.iter().filter_map(|id| self.players.get(id))
    }

    pub fn seat_count(&self) -> usize {
        self.seating.len()
    }

    pub fn connected_count(&self) -> usize {
        self.players.values().filter(|p| p.connected).count()
    }

    pub fn chat(&self) -> &[ChatMessage] {
        &self.chat
    }

    pub fn werewolf_chat(&self) -> &[ChatMessage] {
        &self.werewolf_chat
    }

    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }

    /// The target `session` currently votes for.
    pub fn vote_of(&self, session: SessionId) -> Option<PlayerId> {
        self.votes.get(&session).copied()
    }

    pub fn self_heals_left(&self, healer: PlayerId) -> u8 {
        self.self_heals_left.get(&healer).copied().unwrap_or(0)
    }

    pub fn pending_kill(&self) -> Option<PlayerId> {
        self.pending_kill
    }

    pub fn kill_lock(&self) -> Option<PlayerId> {
        self.kill_lock
    }

    pub fn vote_results(&self) -> Option<&VoteResults> {
        self.vote_results.as_ref()
    }

    pub(crate) fn alive_ids(&self, keep: impl Fn(&Player) -> bool) -> Vec<PlayerId> {
        self.players()
            .filter(|p| p.alive && keep(p))
            .map(|p| p.id)
            .collect()
    }

    pub(crate) fn alive_werewolves(&self) -> Vec<PlayerId> {
        self.alive_ids(|p| p.role.is_werewolf())
    }

    pub(crate) fn has_alive_healer(&self) -> bool {
        self.players()
            .any(|p| p.alive && p.role == Role::Healer)
    }

    pub(crate) fn name_of(&self, id: PlayerId) -> String {
        self.players
            .get(&id)
            .map(|p| p.name.clone())
            .unwrap_or_default()
    }

    /// Moves to `phase` and bumps the epoch.
    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.epoch += 1;
        tracing::info!(room_id = %self.room_id, phase = %phase, round = self.round, "phase entered");
    }

    pub(crate) fn phase_change(&self) -> (Recipient, ServerEvent) {
        (
            Recipient::All,
            ServerEvent::PhaseChange {
                phase: self.phase,
                round: self.round,
            },
        )
    }
}
