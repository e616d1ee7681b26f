//! Phase transitions.
//!
//! ```text
//! Lobby ─start─→ Night ─┬─(alive healer, pending kill)─→ Healer ─┐
//!                       └───────────────────────────────────────┴→ Discussion
//! Discussion ─→ Voting ─→ Results ─(round + 1)─→ Night
//! ```
//!
//! Every entry goes through [`GameState::set_phase`], which bumps the epoch
//! the room uses to replace its timer. Any alive-state change runs the win
//! check, which can short-circuit to `Ended` from anywhere.

use nightfall_protocol::{Phase, PlayerId, Recipient, Role, ServerEvent, VoteTally, Winner};
use rand::seq::IndexedRandom;

use crate::votes::tally_votes;
use crate::win::check_win_condition;
use crate::{GameState, Outbox, VoteResults};

impl GameState {
    /// Advances the current phase because its timer ran out.
    pub fn on_timeout(&mut self) -> Outbox {
        match self.phase {
            Phase::Night => self.end_night(),
            Phase::Healer => self.apply_night_kill_and_advance(),
            Phase::Discussion => self.enter_voting(),
            Phase::Voting => self.enter_results(),
            Phase::Results => self.apply_results(),
            Phase::Lobby | Phase::Ended => Vec::new(),
        }
    }

    /// Ends the game. A no-op once ended.
    pub fn end(&mut self, winner: Winner, reason: Option<&str>) -> Outbox {
        if self.is_ended() {
            return Vec::new();
        }
        self.pending_kill = None;
        self.set_phase(Phase::Ended);
        tracing::info!(room_id = %self.room_id, %winner, reason, round = self.round, "game ended");

        vec![(
            Recipient::All,
            ServerEvent::GameEnd {
                winner,
                reason: reason.map(str::to_string),
                round: self.round,
                players: self.view_for(None),
            },
        )]
    }

    pub(crate) fn enter_night(&mut self) -> Outbox {
        self.kill_lock = None;
        self.pending_kill = None;
        self.chat.clear();
        self.werewolf_chat.clear();
        self.set_phase(Phase::Night);
        vec![self.phase_change()]
    }

    /// Resolves the night: picks a victim if the werewolves did not, then
    /// either hands over to the healer or applies the kill.
    pub(crate) fn end_night(&mut self) -> Outbox {
        if self.phase != Phase::Night {
            return Vec::new();
        }

        if self.pending_kill.is_none() {
            let candidates = self.alive_ids(|p| !p.role.is_werewolf());
            self.pending_kill = candidates.choose(&mut self.rng).copied();
            if let Some(target) = self.pending_kill {
                tracing::debug!(room_id = %self.room_id, %target, "no kill submitted, picked a victim");
            }
        }

        let Some(target) = self.pending_kill else {
            return self.apply_night_kill_and_advance();
        };

        let target_is_healer = self
            .player(target)
            .is_some_and(|p| p.role == Role::Healer);
        if target_is_healer && self.self_heals_left(target) == 0 {
            // Out of self-heals: no decision is offered.
            tracing::debug!(room_id = %self.room_id, %target, "healer without self-heals dies at once");
            return self.apply_night_kill_and_advance();
        }

        if self.has_alive_healer() {
            self.enter_healer(target)
        } else {
            self.apply_night_kill_and_advance()
        }
    }

    fn enter_healer(&mut self, target: PlayerId) -> Outbox {
        self.set_phase(Phase::Healer);
        let target_name = self.name_of(target);

        let mut events = vec![self.phase_change()];
        for healer in self.alive_ids(|p| p.role == Role::Healer) {
            events.push((
                Recipient::Player(healer),
                ServerEvent::WerewolfKilled {
                    target_id: target,
                    target_name: target_name.clone(),
                    self_heals_left: self.self_heals_left(healer),
                },
            ));
        }
        events
    }

    /// Applies the pending kill, if any, then moves to discussion unless
    /// the game is over.
    pub(crate) fn apply_night_kill_and_advance(&mut self) -> Outbox {
        if !matches!(self.phase, Phase::Night | Phase::Healer) {
            return Vec::new();
        }

        let mut events = Vec::new();
        if let Some(target) = self.pending_kill.take() {
            if let Some(victim) = self.players.get_mut(&target).filter(|p| p.alive) {
                victim.alive = false;
                tracing::info!(room_id = %self.room_id, player_id = %target, "player killed");
                events.push((
                    Recipient::All,
                    ServerEvent::PlayerKilled {
                        player_id: target,
                        player_name: victim.name.clone(),
                    },
                ));
            }
        }

        if self.finish_if_won(&mut events) {
            return events;
        }
        events.extend(self.enter_discussion());
        events
    }

    fn enter_discussion(&mut self) -> Outbox {
        self.set_phase(Phase::Discussion);
        vec![self.phase_change()]
    }

    fn enter_voting(&mut self) -> Outbox {
        self.werewolf_chat.clear();
        self.set_phase(Phase::Voting);
        vec![self.phase_change()]
    }

    /// Reveals the tally now; the elimination waits for the phase to end.
    fn enter_results(&mut self) -> Outbox {
        let eliminated = tally_votes(self.votes.values().copied());

        let breakdown = self
            .players()
            .filter_map(|target| {
                let voters: Vec<String> = self
                    .players()
                    .filter(|voter| self.vote_of(voter.session) == Some(target.id))
                    .map(|voter| voter.name.clone())
                    .collect();
                (!voters.is_empty()).then(|| VoteTally {
                    target_id: target.id,
                    target_name: target.name.clone(),
                    voters,
                })
            })
            .collect();

        let results = VoteResults {
            breakdown,
            eliminated,
        };
        self.set_phase(Phase::Results);

        let events = vec![
            self.phase_change(),
            (Recipient::All, self.vote_results_event(&results)),
        ];
        self.vote_results = Some(results);
        events
    }

    pub(crate) fn vote_results_event(&self, results: &VoteResults) -> ServerEvent {
        ServerEvent::VoteResults {
            breakdown: results.breakdown.clone(),
            eliminated_id: results.eliminated,
            eliminated_name: results.eliminated.map(|id| self.name_of(id)),
        }
    }

    /// Applies the elimination decided at reveal and starts the next round.
    fn apply_results(&mut self) -> Outbox {
        let eliminated = self.vote_results.take().and_then(|r| r.eliminated);
        self.votes.clear();

        let mut events = Vec::new();
        if let Some(target) = eliminated {
            if let Some(player) = self.players.get_mut(&target).filter(|p| p.alive) {
                player.alive = false;
                tracing::info!(room_id = %self.room_id, player_id = %target, "player eliminated");
                events.push((
                    Recipient::All,
                    ServerEvent::PlayerEliminated {
                        player_id: target,
                        player_name: player.name.clone(),
                    },
                ));
            }
        }

        if self.finish_if_won(&mut events) {
            return events;
        }
        self.round += 1;
        events.extend(self.enter_night());
        events
    }

    /// Runs the win check and, on a result, appends `game-end`.
    pub(crate) fn finish_if_won(&mut self, events: &mut Outbox) -> bool {
        match check_win_condition(self.players.values()) {
            Some(winner) => {
                events.extend(self.end(winner, None));
                true
            }
            None => false,
        }
    }
}
