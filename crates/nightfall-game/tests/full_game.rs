//! Whole games driven through the public `GameState` API.

use nightfall_game::{Action, GameConfig, GameState, Outbox};
use nightfall_protocol::{Phase, PlayerId, Role, RoomId, ServerEvent, SessionId, Winner};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn seated_game(players: u64, seed: u64) -> GameState {
    let mut game = GameState::new(
        RoomId("GAME01".into()),
        GameConfig::default(),
        StdRng::seed_from_u64(seed),
    );
    for i in 1..=players {
        game.join(SessionId(i), &format!("player{i}")).unwrap();
    }
    game
}

fn seat_with(game: &GameState, role: Role) -> (PlayerId, SessionId) {
    let p = game.players().find(|p| p.role == role).unwrap();
    (p.id, p.session)
}

fn game_ends(events: &Outbox) -> usize {
    events
        .iter()
        .filter(|(_, e)| matches!(e, ServerEvent::GameEnd { .. }))
        .count()
}

#[test]
fn test_timeouts_alone_always_finish_the_game() {
    for seed in 0..20 {
        let mut game = seated_game(8, seed);
        game.start_game().unwrap();

        let mut ends = 0;
        let mut round = game.round();
        for _ in 0..200 {
            if game.phase() == Phase::Ended {
                break;
            }
            let before = game.phase();
            ends += game_ends(&game.on_timeout());
            if game.round() != round {
                assert_eq!(before, Phase::Results, "seed {seed}: round moved outside results");
                assert_eq!(game.round(), round + 1);
                round = game.round();
            }
        }

        assert_eq!(game.phase(), Phase::Ended, "seed {seed} never ended");
        assert_eq!(ends, 1, "seed {seed} ended more than once");
    }
}

#[test]
fn test_scripted_game_villagers_vote_out_werewolf() {
    let mut game = seated_game(4, 3);
    game.start_game().unwrap();

    let (wolf, wolf_session) = seat_with(&game, Role::Werewolf);
    let (_, healer_session) = seat_with(&game, Role::Healer);
    let victim = game
        .players()
        .find(|p| p.role == Role::Villager)
        .map(|p| p.id)
        .unwrap();

    // Night: the wolf strikes, the healer saves.
    game.apply(wolf_session, Action::Kill { target: victim }, 0).unwrap();
    game.on_timeout();
    assert_eq!(game.phase(), Phase::Healer);
    game.apply(healer_session, Action::Heal { target: victim }, 0).unwrap();
    assert_eq!(game.phase(), Phase::Discussion);

    // Day: everyone else votes for the wolf.
    game.on_timeout();
    let voters: Vec<SessionId> = game
        .players()
        .filter(|p| p.id != wolf)
        .map(|p| p.session)
        .collect();
    for voter in voters {
        game.apply(voter, Action::Vote { target: wolf }, 0).unwrap();
    }
    game.on_timeout();
    assert_eq!(game.phase(), Phase::Results);

    let events = game.on_timeout();

    assert_eq!(game.phase(), Phase::Ended);
    let end = events.iter().find_map(|(_, e)| match e {
        ServerEvent::GameEnd { winner, players, .. } => Some((*winner, players.clone())),
        _ => None,
    });
    let (winner, players) = end.unwrap();
    assert_eq!(winner, Winner::Villagers);
    assert!(players.iter().all(|p| p.role.is_some()), "roles are public at the end");
}

#[test]
fn test_scripted_game_werewolves_win_at_parity() {
    let mut game = seated_game(4, 11);
    game.start_game().unwrap();

    let (_, wolf_session) = seat_with(&game, Role::Werewolf);
    let (healer, healer_session) = seat_with(&game, Role::Healer);
    let villagers: Vec<PlayerId> = game
        .players()
        .filter(|p| p.role == Role::Villager)
        .map(|p| p.id)
        .collect();

    // Night 1: a villager dies.
    game.apply(wolf_session, Action::Kill { target: villagers[0] }, 0).unwrap();
    game.on_timeout();
    game.apply(healer_session, Action::NoHeal, 0).unwrap();
    assert!(!game.player(villagers[0]).unwrap().alive);

    // Day 1: the village votes out its own healer.
    game.on_timeout();
    game.apply(wolf_session, Action::Vote { target: healer }, 0).unwrap();
    game.on_timeout();
    let events = game.on_timeout();

    // One wolf against one villager is parity.
    assert_eq!(game.phase(), Phase::Ended);
    assert!(events.iter().any(|(_, e)| matches!(
        e,
        ServerEvent::GameEnd { winner: Winner::Werewolves, .. }
    )));
}
