//! Game rule configuration.

use std::time::Duration;

use nightfall_protocol::Phase;

/// How long each timed phase lasts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseDurations {
    pub night: Duration,
    pub healer: Duration,
    pub discussion: Duration,
    pub voting: Duration,
    pub results: Duration,
}

impl Default for PhaseDurations {
    fn default() -> Self {
        Self {
            night: Duration::from_secs(30),
            healer: Duration::from_secs(30),
            discussion: Duration::from_secs(120),
            voting: Duration::from_secs(30),
            results: Duration::from_secs(10),
        }
    }
}

impl PhaseDurations {
    /// Duration of `phase`, or `None` for the untimed lobby and ended phases.
    pub fn of(&self, phase: Phase) -> Option<Duration> {
        match phase {
            Phase::Night => Some(self.night),
            Phase::Healer => Some(self.healer),
            Phase::Discussion => Some(self.discussion),
            Phase::Voting => Some(self.voting),
            Phase::Results => Some(self.results),
            Phase::Lobby | Phase::Ended => None,
        }
    }
}

/// Rules for one room's game.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub durations: PhaseDurations,
    pub min_players: usize,
    pub max_players: usize,
    /// Self-heals each healer starts with. Healing others is unlimited.
    pub self_heals: u8,
    /// Maximum player name length, in characters.
    pub max_name_len: usize,
    /// Maximum chat message length, in characters.
    pub max_message_len: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            durations: PhaseDurations::default(),
            min_players: 4,
            max_players: 8,
            self_heals: 1,
            max_name_len: 24,
            max_message_len: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_durations_defaults() {
        let d = PhaseDurations::default();
        assert_eq!(d.of(Phase::Night), Some(Duration::from_secs(30)));
        assert_eq!(d.of(Phase::Healer), Some(Duration::from_secs(30)));
        assert_eq!(d.of(Phase::Discussion), Some(Duration::from_secs(120)));
        assert_eq!(d.of(Phase::Voting), Some(Duration::from_secs(30)));
        assert_eq!(d.of(Phase::Results), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_phase_durations_untimed_phases_return_none() {
        let d = PhaseDurations::default();
        assert_eq!(d.of(Phase::Lobby), None);
        assert_eq!(d.of(Phase::Ended), None);
    }
}
