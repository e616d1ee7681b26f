//! Requests from players: joining, starting, and the role-gated actions.

use std::time::{Duration, Instant};

use nightfall_protocol::{
    ChatMessage, ClientCommand, Phase, PlayerId, Recipient, Role, ServerEvent, SessionId,
};

use crate::capability::Capability;
use crate::roles::assign_roles;
use crate::win::check_forfeit;
use crate::{GameError, GameState, Outbox, Player};

/// A role-gated action from a seated player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Kill { target: PlayerId },
    Heal { target: PlayerId },
    NoHeal,
    Vote { target: PlayerId },
    Chat { message: String },
    WerewolfChat { message: String },
    Snitch { target: PlayerId, message: String },
}

impl Action {
    /// Extracts the in-game action from a client command. Returns `None`
    /// for connection and lobby commands.
    pub fn from_command(command: ClientCommand) -> Option<Self> {
        let action = match command {
            ClientCommand::WerewolfKill { target_id } => Self::Kill { target: target_id },
            ClientCommand::HealerHeal { target_id } => Self::Heal { target: target_id },
            ClientCommand::HealerNoHeal => Self::NoHeal,
            ClientCommand::Vote { target_id } => Self::Vote { target: target_id },
            ClientCommand::ChatMessage { message } => Self::Chat { message },
            ClientCommand::WerewolfChatMessage { message } => Self::WerewolfChat { message },
            ClientCommand::SnitchMessage { target_id, message } => Self::Snitch {
                target: target_id,
                message,
            },
            ClientCommand::Handshake { .. }
            | ClientCommand::Heartbeat { .. }
            | ClientCommand::CreateRoom
            | ClientCommand::JoinRoom { .. }
            | ClientCommand::StartGame => return None,
        };
        Some(action)
    }
}

/// A successful join.
#[derive(Debug)]
pub struct JoinOutcome {
    pub player_id: PlayerId,
    /// The session took over an existing disconnected seat.
    pub reconnected: bool,
    pub events: Outbox,
}

impl GameState {
    // -- lobby -------------------------------------------------------------

    /// Seats `session` under `raw_name`, or reattaches it to the
    /// disconnected seat already holding that name.
    ///
    /// # Errors
    /// - [`GameError::Validation`] for an empty or over-long name, a name
    ///   held by a connected seat, a new name after the game started, or a
    ///   session that already holds a seat.
    pub fn join(&mut self, session: SessionId, raw_name: &str) -> Result<JoinOutcome, GameError> {
        if self.player_by_session(session).is_some() {
            return Err(GameError::validation("already seated"));
        }
        let name = clean_text(raw_name, self.config.max_name_len, "name")?;

        let existing = self.players.values().find(|p| p.name == name).map(|p| p.id);
        if let Some(id) = existing {
            return self.reattach(id, session);
        }

        if self.is_started() {
            return Err(GameError::validation("game already in progress"));
        }

        let id = PlayerId(self.next_player_id);
        self.next_player_id += 1;
        self.players.insert(id, Player::new(id, name, session));
        self.seating.push(id);
        tracing::info!(room_id = %self.room_id, player_id = %id, seats = self.seating.len(), "player joined");

        let mut events = vec![self.room_joined(session, id, false)];
        events.extend(self.players_update());
        Ok(JoinOutcome {
            player_id: id,
            reconnected: false,
            events,
        })
    }

    fn reattach(&mut self, id: PlayerId, session: SessionId) -> Result<JoinOutcome, GameError> {
        let Some(seat) = self.players.get_mut(&id) else {
            return Err(GameError::NotFound(format!("player {id}")));
        };
        if seat.connected {
            return Err(GameError::validation("name already taken"));
        }

        let old_session = seat.session;
        seat.session = session;
        seat.connected = true;
        seat.disconnected_at = None;
        let alive_werewolf = seat.alive && seat.role.is_werewolf();

        if let Some(target) = self.votes.remove(&old_session) {
            self.votes.insert(session, target);
        }
        tracing::info!(room_id = %self.room_id, player_id = %id, "player reconnected");

        let me = Recipient::Player(id);
        let mut events = vec![self.room_joined(session, id, true)];
        events.extend(self.players_update());
        if self.is_started() {
            events.push((
                me.clone(),
                ServerEvent::PhaseChange {
                    phase: self.phase,
                    round: self.round,
                },
            ));
            events.push((
                me.clone(),
                ServerEvent::ChatUpdate {
                    messages: self.chat.clone(),
                },
            ));
            if alive_werewolf {
                events.push((
                    me.clone(),
                    ServerEvent::WerewolfChatUpdate {
                        messages: self.werewolf_chat.clone(),
                    },
                ));
            }
            if let Some(results) = &self.vote_results {
                events.push((me, self.vote_results_event(results)));
            }
        }

        Ok(JoinOutcome {
            player_id: id,
            reconnected: true,
            events,
        })
    }

    fn room_joined(&self, session: SessionId, id: PlayerId, reconnected: bool) -> (Recipient, ServerEvent) {
        (
            Recipient::Session(session),
            ServerEvent::RoomJoined {
                room_id: self.room_id.clone(),
                player_id: id,
                reconnected,
            },
        )
    }

    /// Assigns roles over the seating order and opens the first night.
    ///
    /// # Errors
    /// - [`GameError::Validation`] if the game already started.
    /// - [`GameError::Capacity`] below the minimum or above the maximum.
    pub fn start_game(&mut self) -> Result<Outbox, GameError> {
        if self.is_started() {
            return Err(GameError::validation("game already started"));
        }

        let count = self.seating.len();
        if count < self.config.min_players {
            return Err(GameError::Capacity(format!(
                "need at least {} players",
                self.config.min_players
            )));
        }
        if count > self.config.max_players {
            return Err(GameError::Capacity(format!(
                "maximum {} players allowed",
                self.config.max_players
            )));
        }

        let assignment = assign_roles(count, &mut self.rng)?;
        for (id, role) in self.seating.iter().zip(assignment.roles) {
            if let Some(player) = self.players.get_mut(id) {
                player.role = role;
            }
            if role == Role::Healer {
                self.self_heals_left.insert(*id, self.config.self_heals);
            }
        }
        tracing::info!(room_id = %self.room_id, players = count, "game started");

        let night = self.enter_night();
        let mut events = self.game_started();
        events.extend(night);
        Ok(events)
    }

    // -- role-gated actions ------------------------------------------------

    /// Routes an [`Action`] to its handler.
    pub fn apply(&mut self, session: SessionId, action: Action, now_ms: u64) -> Result<Outbox, GameError> {
        match action {
            Action::Kill { target } => self.kill(session, target),
            Action::Heal { target } => self.heal(session, target),
            Action::NoHeal => self.no_heal(session),
            Action::Vote { target } => self.vote(session, target),
            Action::Chat { message } => self.chat_message(session, &message, now_ms),
            Action::WerewolfChat { message } => self.werewolf_chat_message(session, &message, now_ms),
            Action::Snitch { target, message } => self.snitch_message(session, target, &message),
        }
    }

    /// Locks the night's kill target. Once locked, every further attempt is
    /// answered with the existing lock and changes nothing.
    pub fn kill(&mut self, session: SessionId, target: PlayerId) -> Result<Outbox, GameError> {
        let wolf = self.authorized(session, &Capability::KILL)?;

        if let Some(locked) = self.kill_lock {
            return Ok(vec![(Recipient::Player(wolf), self.kill_locked(locked))]);
        }

        let target = self.live_target(target)?;
        self.kill_lock = Some(target);
        self.pending_kill = Some(target);
        tracing::debug!(room_id = %self.room_id, %wolf, %target, "kill locked");

        let mut events = vec![(
            Recipient::Players(self.alive_werewolves()),
            self.kill_locked(target),
        )];
        if !self.has_alive_healer() {
            events.extend(self.end_night());
        }
        Ok(events)
    }

    fn kill_locked(&self, target: PlayerId) -> ServerEvent {
        ServerEvent::KillLocked {
            target_id: target,
            target_name: self.name_of(target),
        }
    }

    /// Heals `target`. Saves them if they are the pending kill; costs a
    /// self-heal if they are the healer. Always ends the healer phase.
    pub fn heal(&mut self, session: SessionId, target: PlayerId) -> Result<Outbox, GameError> {
        let healer = self.authorized(session, &Capability::HEAL)?;
        let target = self.live_target(target)?;

        if target == healer {
            let left = self.self_heals_left.entry(healer).or_insert(0);
            if *left == 0 {
                return Err(GameError::authorization("no self-heals left"));
            }
            *left -= 1;
        }

        let mut events = Vec::new();
        if self.pending_kill == Some(target) {
            self.pending_kill = None;
            tracing::debug!(room_id = %self.room_id, %target, "kill prevented by healer");
            events.push((
                Recipient::All,
                ServerEvent::PlayerSaved {
                    player_id: target,
                    player_name: self.name_of(target),
                },
            ));
        }
        events.push((
            Recipient::Player(healer),
            ServerEvent::HealConfirmed {
                self_heals_left: self.self_heals_left(healer),
            },
        ));
        events.extend(self.apply_night_kill_and_advance());
        Ok(events)
    }

    /// Lets the pending kill stand and ends the healer phase.
    pub fn no_heal(&mut self, session: SessionId) -> Result<Outbox, GameError> {
        self.authorized(session, &Capability::HEAL)?;
        Ok(self.apply_night_kill_and_advance())
    }

    /// Casts or replaces the sender's vote.
    pub fn vote(&mut self, session: SessionId, target: PlayerId) -> Result<Outbox, GameError> {
        self.authorized(session, &Capability::VOTE)?;
        let target = self.live_target(target)?;
        self.votes.insert(session, target);

        Ok(vec![(
            Recipient::All,
            ServerEvent::VotesUpdate {
                count: self.votes.len(),
            },
        )])
    }

    /// Appends to the public chat and broadcasts the whole log.
    pub fn chat_message(&mut self, session: SessionId, raw: &str, now_ms: u64) -> Result<Outbox, GameError> {
        let sender = self.authorized(session, &Capability::CHAT)?;
        let message = self.chat_line(sender, raw, now_ms)?;
        self.chat.push(message);

        Ok(vec![(
            Recipient::All,
            ServerEvent::ChatUpdate {
                messages: self.chat.clone(),
            },
        )])
    }

    /// Appends to the werewolf chat; only living werewolves receive it.
    pub fn werewolf_chat_message(
        &mut self,
        session: SessionId,
        raw: &str,
        now_ms: u64,
    ) -> Result<Outbox, GameError> {
        let sender = self.authorized(session, &Capability::WEREWOLF_CHAT)?;
        let message = self.chat_line(sender, raw, now_ms)?;
        self.werewolf_chat.push(message);

        Ok(vec![(
            Recipient::Players(self.alive_werewolves()),
            ServerEvent::WerewolfChatUpdate {
                messages: self.werewolf_chat.clone(),
            },
        )])
    }

    /// A dead snitch's single private message to one living player.
    pub fn snitch_message(&mut self, session: SessionId, target: PlayerId, raw: &str) -> Result<Outbox, GameError> {
        let snitch = self.authorized(session, &Capability::SNITCH)?;
        if self.snitch_used.contains(&snitch) {
            return Err(GameError::authorization("snitch message already used"));
        }
        let target = self.live_target(target)?;
        let message = clean_text(raw, self.config.max_message_len, "message")?;

        self.snitch_used.insert(snitch);
        tracing::debug!(room_id = %self.room_id, %snitch, %target, "snitch message delivered");

        Ok(vec![(
            Recipient::Player(target),
            ServerEvent::SnitchMessageReceived {
                message,
                snitch_name: self.name_of(snitch),
            },
        )])
    }

    // -- connections -------------------------------------------------------

    /// Handles a dropped session.
    ///
    /// In the lobby the seat is removed. Mid-game it is kept for a
    /// reconnect, and the game ends if the players still connected can no
    /// longer make a game.
    pub fn disconnect(&mut self, session: SessionId, now: Instant) -> Outbox {
        let Some(id) = self.player_by_session(session).map(|p| p.id) else {
            return Vec::new();
        };

        match self.phase {
            Phase::Lobby => {
                self.players.remove(&id);
                self.seating.retain(|seat| *seat != id);
                tracing::info!(room_id = %self.room_id, player_id = %id, "player left lobby");
                self.players_update()
            }
            Phase::Ended => {
                if let Some(seat) = self.players.get_mut(&id) {
                    seat.connected = false;
                }
                Vec::new()
            }
            _ => {
                if let Some(seat) = self.players.get_mut(&id) {
                    seat.connected = false;
                    seat.disconnected_at = Some(now);
                }
                tracing::info!(room_id = %self.room_id, player_id = %id, "player disconnected mid-game");

                let mut events = self.players_update();
                if let Some((winner, reason)) = check_forfeit(self.players.values()) {
                    events.extend(self.end(winner, Some(reason)));
                }
                events
            }
        }
    }

    /// Kills every living seat that has been disconnected for at least
    /// `grace`. A forfeited seat's vote is withdrawn.
    pub fn reap_forfeits(&mut self, now: Instant, grace: Duration) -> Outbox {
        if !self.phase.is_active() {
            return Vec::new();
        }

        let expired: Vec<PlayerId> = self
            .players()
            .filter(|p| {
                p.alive
                    && !p.connected
                    && p.disconnected_at
                        .is_some_and(|at| now.saturating_duration_since(at) >= grace)
            })
            .map(|p| p.id)
            .collect();
        if expired.is_empty() {
            return Vec::new();
        }

        let mut events = Vec::new();
        let mut withdrawn = false;
        for id in expired {
            if let Some(seat) = self.players.get_mut(&id) {
                seat.alive = false;
                withdrawn |= self.votes.remove(&seat.session).is_some();
                tracing::info!(room_id = %self.room_id, player_id = %id, "player forfeited");
                events.push((
                    Recipient::All,
                    ServerEvent::PlayerForfeited {
                        player_id: id,
                        player_name: seat.name.clone(),
                    },
                ));
            }
        }

        if self.finish_if_won(&mut events) {
            return events;
        }
        events.extend(self.players_update());
        if withdrawn {
            events.push((
                Recipient::All,
                ServerEvent::VotesUpdate {
                    count: self.votes.len(),
                },
            ));
        }
        if self.phase == Phase::Healer && !self.has_alive_healer() {
            events.extend(self.apply_night_kill_and_advance());
        }
        events
    }

    // -- helpers -----------------------------------------------------------

    /// Resolves the sender's seat and checks `capability`.
    fn authorized(&self, session: SessionId, capability: &Capability) -> Result<PlayerId, GameError> {
        let player = self
            .player_by_session(session)
            .ok_or_else(|| GameError::NotFound(format!("no seat for session {session}")))?;
        capability.authorize(player, self.phase)?;
        Ok(player.id)
    }

    /// A living seat, or a validation error.
    fn live_target(&self, id: PlayerId) -> Result<PlayerId, GameError> {
        match self.players.get(&id) {
            Some(p) if p.alive => Ok(id),
            Some(_) => Err(GameError::validation(format!("{id} is not alive"))),
            None => Err(GameError::validation(format!("unknown player {id}"))),
        }
    }

    fn chat_line(&self, sender: PlayerId, raw: &str, now_ms: u64) -> Result<ChatMessage, GameError> {
        Ok(ChatMessage {
            player_id: sender,
            player_name: self.name_of(sender),
            message: clean_text(raw, self.config.max_message_len, "message")?,
            timestamp: now_ms,
        })
    }
}

/// Trims `raw` and checks it is non-empty and at most `max` characters.
fn clean_text(raw: &str, max: usize, what: &str) -> Result<String, GameError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(GameError::validation(format!("{what} must not be empty")));
    }
    if text.chars().count() > max {
        return Err(GameError::validation(format!(
            "{what} must be at most {max} characters"
        )));
    }
    Ok(text.to_string())
}
