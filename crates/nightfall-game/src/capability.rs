//! The (role, liveness, phase) guard shared by every role-gated action.

use nightfall_protocol::{Phase, Role};

use crate::{GameError, Player};

/// Whether an action needs a living or a dead sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    Dead,
}

/// Who may perform an action, and when.
#[derive(Debug, Clone, Copy)]
pub struct Capability {
    pub name: &'static str,
    /// Required role; `None` means any role.
    pub role: Option<Role>,
    pub liveness: Liveness,
    pub phases: &'static [Phase],
}

const ACTIVE: &[Phase] = &[
    Phase::Night,
    Phase::Healer,
    Phase::Discussion,
    Phase::Voting,
    Phase::Results,
];

impl Capability {
    pub const KILL: Self = Self {
        name: "kill",
        role: Some(Role::Werewolf),
        liveness: Liveness::Alive,
        phases: &[Phase::Night],
    };

    pub const HEAL: Self = Self {
        name: "heal",
        role: Some(Role::Healer),
        liveness: Liveness::Alive,
        phases: &[Phase::Healer],
    };

    pub const VOTE: Self = Self {
        name: "vote",
        role: None,
        liveness: Liveness::Alive,
        phases: &[Phase::Voting],
    };

    pub const CHAT: Self = Self {
        name: "chat",
        role: None,
        liveness: Liveness::Alive,
        phases: &[
            Phase::Lobby,
            Phase::Night,
            Phase::Healer,
            Phase::Discussion,
            Phase::Voting,
            Phase::Results,
        ],
    };

    pub const WEREWOLF_CHAT: Self = Self {
        name: "werewolf chat",
        role: Some(Role::Werewolf),
        liveness: Liveness::Alive,
        phases: &[Phase::Night, Phase::Discussion],
    };

    pub const SNITCH: Self = Self {
        name: "snitch message",
        role: Some(Role::Snitch),
        liveness: Liveness::Dead,
        phases: ACTIVE,
    };

    /// Checks `player` against this capability in `phase`.
    ///
    /// # Errors
    /// [`GameError::Authorization`] naming the first failed check.
    pub fn authorize(&self, player: &Player, phase: Phase) -> Result<(), GameError> {
        if let Some(role) = self.role {
            if player.role != role {
                return Err(GameError::authorization(format!(
                    "{} requires the {role} role",
                    self.name
                )));
            }
        }

        match (self.liveness, player.alive) {
            (Liveness::Alive, false) => {
                return Err(GameError::authorization(format!(
                    "dead players cannot {}",
                    self.name
                )));
            }
            (Liveness::Dead, true) => {
                return Err(GameError::authorization(format!(
                    "{} is only available after death",
                    self.name
                )));
            }
            _ => {}
        }

        if !self.phases.contains(&phase) {
            return Err(GameError::authorization(format!(
                "{} is not allowed during {phase}",
                self.name
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use nightfall_protocol::{PlayerId, SessionId};

    use super::*;

    fn player(role: Role, alive: bool) -> Player {
        let mut p = Player::new(PlayerId(1), "p".into(), SessionId(1));
        p.role = role;
        p.alive = alive;
        p
    }

    #[test]
    fn test_authorize_kill_alive_werewolf_at_night_ok() {
        let wolf = player(Role::Werewolf, true);
        assert!(Capability::KILL.authorize(&wolf, Phase::Night).is_ok());
    }

    #[test]
    fn test_authorize_kill_wrong_role_rejected() {
        let seer = player(Role::Seer, true);
        assert!(matches!(
            Capability::KILL.authorize(&seer, Phase::Night),
            Err(GameError::Authorization(_))
        ));
    }

    #[test]
    fn test_authorize_kill_dead_werewolf_rejected() {
        let wolf = player(Role::Werewolf, false);
        assert!(Capability::KILL.authorize(&wolf, Phase::Night).is_err());
    }

    #[test]
    fn test_authorize_kill_outside_night_rejected() {
        let wolf = player(Role::Werewolf, true);
        assert!(Capability::KILL.authorize(&wolf, Phase::Discussion).is_err());
    }

    #[test]
    fn test_authorize_snitch_requires_dead_sender() {
        assert!(
            Capability::SNITCH
                .authorize(&player(Role::Snitch, false), Phase::Discussion)
                .is_ok()
        );
        assert!(
            Capability::SNITCH
                .authorize(&player(Role::Snitch, true), Phase::Discussion)
                .is_err()
        );
    }

    #[test]
    fn test_authorize_chat_any_role_but_not_ended() {
        let villager = player(Role::Villager, true);
        assert!(Capability::CHAT.authorize(&villager, Phase::Lobby).is_ok());
        assert!(Capability::CHAT.authorize(&villager, Phase::Results).is_ok());
        assert!(Capability::CHAT.authorize(&villager, Phase::Ended).is_err());
    }

    #[test]
    fn test_authorize_werewolf_chat_night_and_discussion_only() {
        let wolf = player(Role::Werewolf, true);
        assert!(Capability::WEREWOLF_CHAT.authorize(&wolf, Phase::Night).is_ok());
        assert!(
            Capability::WEREWOLF_CHAT
                .authorize(&wolf, Phase::Discussion)
                .is_ok()
        );
        assert!(Capability::WEREWOLF_CHAT.authorize(&wolf, Phase::Voting).is_err());
    }
}
