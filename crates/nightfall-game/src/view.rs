//! What each viewer may see of the other seats.

use nightfall_protocol::{Phase, PlayerId, PlayerView, Recipient, ServerEvent};

use crate::{GameState, Outbox, Player};

impl GameState {
    /// Whether `viewer` may see `subject`'s role.
    ///
    /// Nobody has a role in the lobby. After the game ends every role is
    /// public. In between, a player sees their own role and living
    /// werewolves see each other.
    fn role_visible(&self, viewer: Option<&Player>, subject: &Player) -> bool {
        match self.phase {
            Phase::Lobby => false,
            Phase::Ended => true,
            _ => viewer.is_some_and(|v| {
                v.id == subject.id
                    || (v.alive && v.role.is_werewolf() && subject.role.is_werewolf())
            }),
        }
    }

    /// Every seat, in join order, as `viewer` sees it. `None` is an
    /// outside observer.
    pub fn view_for(&self, viewer: Option<PlayerId>) -> Vec<PlayerView> {
        let viewer = viewer.and_then(|id| self.players.get(&id));
        self.players()
            .map(|p| PlayerView {
                id: p.id,
                name: p.name.clone(),
                role: self.role_visible(viewer, p).then_some(p.role),
                alive: p.alive,
                connected: p.connected,
            })
            .collect()
    }

    /// A `players-update` tailored to each connected seat.
    pub(crate) fn players_update(&self) -> Outbox {
        self.per_viewer(|players| ServerEvent::PlayersUpdate { players })
    }

    /// A `game-started` tailored to each connected seat.
    pub(crate) fn game_started(&self) -> Outbox {
        self.per_viewer(|players| ServerEvent::GameStarted { players })
    }

    fn per_viewer(&self, make: impl Fn(Vec<PlayerView>) -> ServerEvent) -> Outbox {
        self.players()
            .filter(|p| p.connected)
            .map(|p| (Recipient::Player(p.id), make(self.view_for(Some(p.id)))))
            .collect()
    }
}
