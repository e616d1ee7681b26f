//! Role assignment at game start.

use nightfall_protocol::Role;
use rand::Rng;
use rand::seq::SliceRandom;

use crate::GameError;

use Role::{Healer, Seer, Snitch, Villager, Werewolf};

/// The role multiset for `count` players.
///
/// # Errors
/// [`GameError::InvalidPlayerCount`] outside 4–8.
pub fn distribution(count: usize) -> Result<&'static [Role], GameError> {
    let roles: &'static [Role] = match count {
        4 => &[Werewolf, Healer, Villager, Villager],
        5 => &[Werewolf, Healer, Seer, Villager, Villager],
        6 => &[Werewolf, Werewolf, Healer, Seer, Villager, Villager],
        7 => &[Werewolf, Werewolf, Healer, Seer, Snitch, Villager, Villager],
        8 => &[Werewolf, Werewolf, Healer, Seer, Snitch, Villager, Villager, Villager],
        _ => return Err(GameError::InvalidPlayerCount(count)),
    };
    Ok(roles)
}

/// Roles in seat order, as produced by [`assign_roles`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    pub roles: Vec<Role>,
    /// Set when the shuffle produced no werewolf and seat 0 was forced.
    pub anomaly: bool,
}

/// Shuffles the distribution for `count` players.
///
/// Seat `i` of the returned assignment belongs to the `i`-th player of the
/// seating order captured at game start.
pub fn assign_roles(count: usize, rng: &mut impl Rng) -> Result<RoleAssignment, GameError> {
    let mut roles = distribution(count)?.to_vec();
    roles.shuffle(rng);
    let anomaly = ensure_werewolf(&mut roles);
    if anomaly {
        tracing::warn!(count, "role shuffle produced no werewolf, forcing seat 0");
    }
    Ok(RoleAssignment { roles, anomaly })
}

/// Forces seat 0 to werewolf if no seat has one. Returns `true` if it did.
fn ensure_werewolf(roles: &mut [Role]) -> bool {
    if roles.iter().any(|r| r.is_werewolf()) {
        return false;
    }
    match roles.first_mut() {
        Some(first) => {
            *first = Werewolf;
            true
        }
        None => false,
    }
}
