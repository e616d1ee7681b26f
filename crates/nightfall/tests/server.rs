//! Integration tests for the Nightfall server, handler, and full connection flow.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use nightfall::prelude::*;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Starts a server on a random port and returns the address.
async fn start_server() -> String {
    let server = NightfallServerBuilder::new()
        .bind("127.0.0.1:0")
        .janitor_interval(Duration::from_millis(50))
        .build()
        .await
        .expect("server should build");

    let addr = server.local_addr().expect("should have local addr").to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, command: ClientCommand) {
    let envelope = Envelope::command(0, 0, command);
    let bytes = serde_json::to_vec(&envelope).expect("encode");
    ws.send(Message::Binary(bytes.into())).await.expect("send");
}

/// Reads the next server event, skipping timer updates.
async fn next_event(ws: &mut ClientWs) -> ServerEvent {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("event within 2s")
            .expect("stream open")
            .expect("frame");
        let envelope: Envelope = serde_json::from_slice(&msg.into_data()).expect("decode");
        match envelope.payload {
            Payload::Event(ServerEvent::TimerUpdate { .. }) => continue,
            Payload::Event(event) => return event,
            other => panic!("expected an event, got {other:?}"),
        }
    }
}

/// Reads events until one matches, returning it.
async fn wait_for(ws: &mut ClientWs, pred: impl Fn(&ServerEvent) -> bool) -> ServerEvent {
    loop {
        let event = next_event(ws).await;
        if pred(&event) {
            return event;
        }
    }
}

/// Sends a handshake and returns the session id from the ack.
async fn handshake(ws: &mut ClientWs) -> SessionId {
    send(ws, ClientCommand::Handshake { version: PROTOCOL_VERSION }).await;
    match next_event(ws).await {
        ServerEvent::HandshakeAck { session_id, .. } => session_id,
        other => panic!("expected HandshakeAck, got {other:?}"),
    }
}

async fn client(addr: &str) -> ClientWs {
    let mut ws = connect(addr).await;
    handshake(&mut ws).await;
    ws
}

async fn create_room(ws: &mut ClientWs) -> RoomId {
    send(ws, ClientCommand::CreateRoom).await;
    match next_event(ws).await {
        ServerEvent::RoomCreated { room_id } => room_id,
        other => panic!("expected RoomCreated, got {other:?}"),
    }
}

async fn join(ws: &mut ClientWs, room: &RoomId, name: &str) -> ServerEvent {
    send(
        ws,
        ClientCommand::JoinRoom {
            room_id: room.as_str().to_string(),
            player_name: name.to_string(),
        },
    )
    .await;
    next_event(ws).await
}

// =========================================================================
// Handshake and heartbeat
// =========================================================================

#[tokio::test]
async fn test_handshake_success_assigns_distinct_sessions() {
    let addr = start_server().await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;

    let first = handshake(&mut a).await;
    let second = handshake(&mut b).await;
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_handshake_version_mismatch() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, ClientCommand::Handshake { version: 999 }).await;
    match next_event(&mut ws).await {
        ServerEvent::Error { code, message } => {
            assert_eq!(code, 400);
            assert!(message.contains("version mismatch"));
        }
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_handshake_non_handshake_first_message() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, ClientCommand::CreateRoom).await;
    match next_event(&mut ws).await {
        ServerEvent::Error { code, .. } => assert_eq!(code, 400),
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_heartbeat_response() {
    let addr = start_server().await;
    let mut ws = client(&addr).await;

    send(&mut ws, ClientCommand::Heartbeat { client_time: 12345 }).await;
    match next_event(&mut ws).await {
        ServerEvent::HeartbeatAck { client_time, .. } => assert_eq!(client_time, 12345),
        other => panic!("expected HeartbeatAck, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_envelope_ignored() {
    let addr = start_server().await;
    let mut ws = client(&addr).await;

    ws.send(Message::Text("not json".into())).await.expect("send garbage");
    send(&mut ws, ClientCommand::Heartbeat { client_time: 7 }).await;

    match next_event(&mut ws).await {
        ServerEvent::HeartbeatAck { client_time, .. } => assert_eq!(client_time, 7),
        other => panic!("expected HeartbeatAck, got {other:?}"),
    }
}

// =========================================================================
// Rooms
// =========================================================================

#[tokio::test]
async fn test_create_room_returns_code() {
    let addr = start_server().await;
    let mut ws = client(&addr).await;

    let room = create_room(&mut ws).await;
    assert_eq!(room.as_str().len(), RoomId::CODE_LEN);
}

#[tokio::test]
async fn test_join_room_not_found() {
    let addr = start_server().await;
    let mut ws = client(&addr).await;

    match join(&mut ws, &RoomId::normalize("nope00"), "alice").await {
        ServerEvent::Error { code, .. } => assert_eq!(code, 404),
        other => panic!("expected Error 404, got {other:?}"),
    }
}

#[tokio::test]
async fn test_join_room_lowercase_code() {
    let addr = start_server().await;
    let mut host = client(&addr).await;
    let room = create_room(&mut host).await;

    let mut guest = client(&addr).await;
    send(
        &mut guest,
        ClientCommand::JoinRoom {
            room_id: room.as_str().to_ascii_lowercase(),
            player_name: "bob".into(),
        },
    )
    .await;
    match next_event(&mut guest).await {
        ServerEvent::RoomJoined {
            room_id,
            reconnected,
            ..
        } => {
            assert_eq!(room_id, room);
            assert!(!reconnected);
        }
        other => panic!("expected RoomJoined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_join_room_empty_name_rejected() {
    let addr = start_server().await;
    let mut ws = client(&addr).await;
    let room = create_room(&mut ws).await;

    match join(&mut ws, &room, "   ").await {
        ServerEvent::Error { code, .. } => assert_eq!(code, 400),
        other => panic!("expected Error 400, got {other:?}"),
    }
}

#[tokio::test]
async fn test_join_room_second_name_same_connection_rejected() {
    let addr = start_server().await;
    let mut ws = client(&addr).await;
    let room = create_room(&mut ws).await;
    join(&mut ws, &room, "alice").await;

    send(
        &mut ws,
        ClientCommand::JoinRoom {
            room_id: room.as_str().to_string(),
            player_name: "alias".into(),
        },
    )
    .await;
    match wait_for(&mut ws, |e| matches!(e, ServerEvent::Error { .. })).await {
        ServerEvent::Error { code, message } => {
            assert_eq!(code, 400);
            assert!(message.contains("already seated"));
        }
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_start_game_not_in_room() {
    let addr = start_server().await;
    let mut ws = client(&addr).await;

    send(&mut ws, ClientCommand::StartGame).await;
    match next_event(&mut ws).await {
        ServerEvent::Error { code, .. } => assert_eq!(code, 404),
        other => panic!("expected Error 404, got {other:?}"),
    }
}

#[tokio::test]
async fn test_start_game_too_few_players() {
    let addr = start_server().await;
    let mut ws = client(&addr).await;
    let room = create_room(&mut ws).await;
    join(&mut ws, &room, "alice").await;

    send(&mut ws, ClientCommand::StartGame).await;
    match wait_for(&mut ws, |e| matches!(e, ServerEvent::Error { .. })).await {
        ServerEvent::Error { code, message } => {
            assert_eq!(code, 409);
            assert_eq!(message, "need at least 4 players");
        }
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_lobby_room_removed_when_last_session_leaves() {
    let addr = start_server().await;
    let mut host = client(&addr).await;
    let room = create_room(&mut host).await;
    join(&mut host, &room, "alice").await;

    host.close(None).await.expect("close");
    drop(host);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut guest = client(&addr).await;
    match join(&mut guest, &room, "bob").await {
        ServerEvent::Error { code, .. } => assert_eq!(code, 404),
        other => panic!("expected Error 404, got {other:?}"),
    }
}

// =========================================================================
// Full flow
// =========================================================================

#[tokio::test]
async fn test_four_players_start_game_and_see_own_roles() {
    let addr = start_server().await;
    let mut players = Vec::new();
    for _ in 0..4 {
        players.push(client(&addr).await);
    }
    let room = create_room(&mut players[0]).await;

    let mut ids = Vec::new();
    for (i, ws) in players.iter_mut().enumerate() {
        match join(ws, &room, &format!("p{i}")).await {
            ServerEvent::RoomJoined { player_id, .. } => ids.push(player_id),
            other => panic!("expected RoomJoined, got {other:?}"),
        }
    }

    send(&mut players[0], ClientCommand::StartGame).await;
    wait_for(&mut players[0], |e| matches!(e, ServerEvent::GameStartAccepted)).await;

    let mut werewolves = 0;
    for (ws, id) in players.iter_mut().zip(&ids) {
        let started = wait_for(ws, |e| matches!(e, ServerEvent::GameStarted { .. })).await;
        let ServerEvent::GameStarted { players: views } = started else {
            unreachable!()
        };
        assert_eq!(views.len(), 4);
        let own = views.iter().find(|v| v.id == *id).expect("own view");
        let role = own.role.expect("own role visible");
        if role.is_werewolf() {
            werewolves += 1;
        }
        // Nobody sees a villager-side role other than their own.
        assert!(
            views
                .iter()
                .filter(|v| v.id != *id)
                .all(|v| v.role.is_none() || v.role.is_some_and(|r| r.is_werewolf()))
        );

        match wait_for(ws, |e| matches!(e, ServerEvent::PhaseChange { .. })).await {
            ServerEvent::PhaseChange { phase, round } => {
                assert_eq!(phase, Phase::Night);
                assert_eq!(round, 1);
            }
            other => panic!("expected PhaseChange, got {other:?}"),
        }
    }
    assert_eq!(werewolves, 1);
}

#[tokio::test]
async fn test_chat_message_broadcast_to_room() {
    let addr = start_server().await;
    let mut a = client(&addr).await;
    let room = create_room(&mut a).await;
    join(&mut a, &room, "alice").await;
    let mut b = client(&addr).await;
    join(&mut b, &room, "bob").await;

    send(
        &mut a,
        ClientCommand::ChatMessage {
            message: "  hello  ".into(),
        },
    )
    .await;

    match wait_for(&mut b, |e| matches!(e, ServerEvent::ChatUpdate { .. })).await {
        ServerEvent::ChatUpdate { messages } => {
            let last = messages.last().expect("one message");
            assert_eq!(last.player_name, "alice");
            assert_eq!(last.message, "hello");
        }
        other => panic!("expected ChatUpdate, got {other:?}"),
    }
}
