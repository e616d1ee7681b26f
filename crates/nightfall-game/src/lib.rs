//! Rules engine for Nightfall.
//!
//! Everything in this crate is synchronous and deterministic given its
//! `StdRng`: no I/O, no clocks of its own, no tasks. A room actor owns one
//! [`GameState`], feeds it player requests and timer expiries, and delivers
//! the [`Outbox`] each call returns.
//!
//! - [`roles`]: role distribution and assignment
//! - [`win`]: win and forfeit conditions
//! - [`votes`]: plurality tally
//! - [`Capability`]: the role/liveness/phase guard on every action
//! - [`GameState`]: state, actions, and phase transitions

mod actions;
mod capability;
mod config;
mod error;
mod phase;
pub mod roles;
mod state;
mod view;
pub mod votes;
pub mod win;

pub use actions::{Action, JoinOutcome};
pub use capability::{Capability, Liveness};
pub use config::{GameConfig, PhaseDurations};
pub use error::GameError;
pub use state::{GameState, Outbox, Player, VoteResults};

#[cfg(test)]
pub(crate) mod testing {
    use nightfall_protocol::{Recipient, Role, RoomId, ServerEvent, SessionId};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use crate::{GameConfig, GameState, Outbox};

    /// The first event matching `pred`, with its recipient.
    pub fn find(events: &Outbox, pred: impl Fn(&ServerEvent) -> bool) -> Option<&(Recipient, ServerEvent)> {
        events.iter().find(|(_, e)| pred(e))
    }

    pub fn sid(n: u64) -> SessionId {
        SessionId(n)
    }

    /// A lobby with `n` players, `p1..pn` on sessions `1..=n`.
    pub fn lobby(n: u64) -> GameState {
        let mut game = GameState::new(
            RoomId("TEST01".into()),
            GameConfig::default(),
            StdRng::seed_from_u64(99),
        );
        for i in 1..=n {
            game.join(sid(i), &format!("p{i}")).unwrap();
        }
        game
    }

    /// A started game in night 1 with `roles` assigned in seat order.
    pub fn game_with_roles(roles: &[Role]) -> GameState {
        let mut game = lobby(roles.len() as u64);
        game.start_game().unwrap();
        game.self_heals_left.clear();
        for (id, role) in game.seating.clone().into_iter().zip(roles) {
            if let Some(p) = game.players.get_mut(&id) {
                p.role = *role;
            }
            if *role == Role::Healer {
                game.self_heals_left.insert(id, game.config.self_heals);
            }
        }
        game
    }
}
