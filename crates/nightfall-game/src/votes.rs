//! Vote tally.

use std::collections::HashMap;

use nightfall_protocol::PlayerId;

/// Deterministic plurality over cast votes.
///
/// Returns the unique most-voted target. An exact tie for first place, or no
/// votes at all, eliminates nobody.
pub fn tally_votes(votes: impl IntoIterator<Item = PlayerId>) -> Option<PlayerId> {
    let mut counts: HashMap<PlayerId, usize> = HashMap::new();
    for target in votes {
        *counts.entry(target).or_default() += 1;
    }

    let max = counts.values().copied().max()?;
    let mut leaders = counts
        .into_iter()
        .filter(|&(_, n)| n == max)
        .map(|(id, _)| id);

    let leader = leaders.next()?;
    match leaders.next() {
        Some(_) => None,
        None => Some(leader),
    }
}
