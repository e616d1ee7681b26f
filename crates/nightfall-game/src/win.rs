//! Win conditions.

use nightfall_protocol::Winner;

use crate::Player;

/// Reason attached to `game-end` when every werewolf left mid-game.
pub const ALL_WEREWOLVES_QUIT: &str = "all werewolves quit";
/// Reason attached to `game-end` when the village emptied out mid-game.
pub const OTHER_PLAYERS_QUIT: &str = "other players quit";

/// Counts (werewolves, non-werewolves) among the players `keep` selects.
fn count_teams<'a>(
    players: impl IntoIterator<Item = &'a Player>,
    keep: impl Fn(&Player) -> bool,
) -> (usize, usize) {
    players
        .into_iter()
        .filter(|p| keep(p))
        .fold((0, 0), |(wolves, others), p| {
            if p.role.is_werewolf() {
                (wolves + 1, others)
            } else {
                (wolves, others + 1)
            }
        })
}

/// Evaluated after every alive-state change.
///
/// Villagers win when no werewolf is alive; werewolves win once they are at
/// least as many as everyone else.
pub fn check_win_condition<'a>(players: impl IntoIterator<Item = &'a Player>) -> Option<Winner> {
    let (wolves, others) = count_teams(players, |p| p.alive);
    if wolves == 0 {
        Some(Winner::Villagers)
    } else if wolves >= others {
        Some(Winner::Werewolves)
    } else {
        None
    }
}

/// Evaluated when a seat drops mid-game, counting only alive players that
/// are still connected.
pub fn check_forfeit<'a>(
    players: impl IntoIterator<Item = &'a Player>,
) -> Option<(Winner, &'static str)> {
    let (wolves, others) = count_teams(players, |p| p.alive && p.connected);
    if wolves == 0 {
        Some((Winner::Villagers, ALL_WEREWOLVES_QUIT))
    } else if wolves >= others && others <= 1 {
        Some((Winner::Werewolves, OTHER_PLAYERS_QUIT))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use nightfall_protocol::{PlayerId, Role, SessionId};

    use super::*;

    fn player(id: u64, role: Role, alive: bool, connected: bool) -> Player {
        let mut p = Player::new(PlayerId(id), format!("p{id}"), SessionId(id));
        p.role = role;
        p.alive = alive;
        p.connected = connected;
        p
    }

    fn alive(id: u64, role: Role) -> Player {
        player(id, role, true, true)
    }

    #[test]
    fn test_check_win_condition_parity_is_werewolf_win() {
        let players = [alive(1, Role::Werewolf), alive(2, Role::Villager)];
        assert_eq!(check_win_condition(&players), Some(Winner::Werewolves));
    }

    #[test]
    fn test_check_win_condition_minority_werewolves_continue() {
        let players = [
            alive(1, Role::Werewolf),
            alive(2, Role::Villager),
            alive(3, Role::Villager),
        ];
        assert_eq!(check_win_condition(&players), None);
    }

    #[test]
    fn test_check_win_condition_no_werewolves_is_villager_win() {
        let players = [
            player(1, Role::Werewolf, false, true),
            alive(2, Role::Healer),
            alive(3, Role::Villager),
        ];
        assert_eq!(check_win_condition(&players), Some(Winner::Villagers));
    }

    #[test]
    fn test_check_win_condition_ignores_dead_players() {
        let players = [
            alive(1, Role::Werewolf),
            alive(2, Role::Seer),
            alive(3, Role::Villager),
            player(4, Role::Villager, false, true),
            player(5, Role::Villager, false, true),
        ];
        assert_eq!(check_win_condition(&players), None);
    }

    #[test]
    fn test_check_forfeit_all_werewolves_disconnected() {
        let players = [
            player(1, Role::Werewolf, true, false),
            alive(2, Role::Villager),
            alive(3, Role::Villager),
            alive(4, Role::Healer),
        ];
        assert_eq!(
            check_forfeit(&players),
            Some((Winner::Villagers, ALL_WEREWOLVES_QUIT))
        );
    }

    #[test]
    fn test_check_forfeit_village_down_to_one() {
        let players = [
            alive(1, Role::Werewolf),
            alive(2, Role::Villager),
            player(3, Role::Villager, true, false),
            player(4, Role::Healer, true, false),
        ];
        assert_eq!(
            check_forfeit(&players),
            Some((Winner::Werewolves, OTHER_PLAYERS_QUIT))
        );
    }

    #[test]
    fn test_check_forfeit_enough_players_connected_continues() {
        let players = [
            alive(1, Role::Werewolf),
            alive(2, Role::Villager),
            alive(3, Role::Villager),
            player(4, Role::Healer, true, false),
        ];
        assert_eq!(check_forfeit(&players), None);
    }
}
