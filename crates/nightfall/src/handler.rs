//! Per-connection handler: handshake and command routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `handshake` → validate version, register the session
//!   2. Send `handshake-ack` carrying the session id
//!   3. Loop: decode client commands and forward room events, until the
//!      client closes or stays silent past the idle timeout

use std::sync::Arc;
use std::time::Duration;

use nightfall_game::Action;
use nightfall_protocol::{
    ClientCommand, Codec, Envelope, PROTOCOL_VERSION, Payload, ProtocolError, ServerEvent,
    SessionId,
};
use nightfall_room::RoomError;
use nightfall_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::NightfallError;
use crate::server::ServerState;

/// How long a client may stay silent before its connection is dropped.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// How long a fresh connection has to send its handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Drop guard that reports the session's disconnect when the handler exits.
///
/// Runs even if the handler panics. `Drop` is synchronous, so the async
/// registry call is spawned as a fire-and-forget task.
struct SessionGuard<C: Codec> {
    session: SessionId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for SessionGuard<C> {
    fn drop(&mut self) {
        let session = self.session;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            if let Err(e) = report_disconnect(&state, session).await {
                tracing::debug!(%session, error = %e, "disconnect cleanup failed");
            }
        });
    }
}

/// Writes server events to one connection, numbering the envelopes.
struct Outbound<'a, C: Codec> {
    conn: &'a WebSocketConnection,
    state: &'a ServerState<C>,
    seq: u64,
}

impl<C: Codec> Outbound<'_, C> {
    async fn send(&mut self, event: ServerEvent) -> Result<(), NightfallError> {
        let envelope = Envelope::event(next_seq(&mut self.seq), self.state.server_time(), event);
        let bytes = self.state.codec.encode(&envelope)?;
        self.conn.send(&bytes).await?;
        Ok(())
    }

    async fn send_error(&mut self, code: u16, message: impl Into<String>) -> Result<(), NightfallError> {
        self.send(ServerEvent::error(code, message)).await
    }

    async fn send_room_error(&mut self, error: &RoomError) -> Result<(), NightfallError> {
        self.send_error(error.code(), error.to_string()).await
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), NightfallError> {
    let conn_id = conn.id();
    let mut out = Outbound {
        conn: &conn,
        state: &state,
        seq: 0,
    };

    // --- Step 1: Handshake ---
    perform_handshake(&conn, &mut out).await?;

    let session = state.next_session();
    state.registry.lock().await.connect(session)?;
    let _guard = SessionGuard {
        session,
        state: Arc::clone(&state),
    };
    tracing::info!(%conn_id, %session, "session connected");

    out.send(ServerEvent::HandshakeAck {
        session_id: session,
        server_time: state.server_time(),
    })
    .await?;

    // --- Step 2: Command loop ---
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<ServerEvent>();
    let idle = tokio::time::sleep(IDLE_TIMEOUT);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            frame = conn.recv() => {
                let data = match frame {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%session, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%session, error = %e, "recv error");
                        break;
                    }
                };
                idle.as_mut().reset(Instant::now() + IDLE_TIMEOUT);

                let envelope: Envelope = match state.codec.decode(&data) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        tracing::debug!(%session, error = %e, "failed to decode envelope");
                        continue;
                    }
                };

                match envelope.payload {
                    Payload::Command(command) => {
                        handle_command(&state, &mut out, session, command, &events_tx).await?;
                    }
                    Payload::Event(_) => {
                        tracing::debug!(%session, "ignoring event sent by client");
                    }
                }
            }
            Some(event) = events_rx.recv() => {
                out.send(event).await?;
            }
            () = &mut idle => {
                tracing::info!(%session, "connection idle, closing");
                break;
            }
        }
    }

    let _ = conn.close().await;
    // _guard drops here → the registry hears about the disconnect.
    Ok(())
}

/// Waits for the first frame and checks that it is a matching handshake.
async fn perform_handshake<C: Codec>(
    conn: &WebSocketConnection,
    out: &mut Outbound<'_, C>,
) -> Result<(), NightfallError> {
    let data = match tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage("connection closed before handshake".into()).into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let envelope: Envelope = match out.state.codec.decode(&data) {
        Ok(envelope) => envelope,
        Err(e) => {
            out.send_error(400, "expected handshake").await?;
            return Err(e.into());
        }
    };

    let version = match envelope.payload {
        Payload::Command(ClientCommand::Handshake { version }) => version,
        _ => {
            out.send_error(400, "expected handshake").await?;
            return Err(ProtocolError::InvalidMessage("first message must be a handshake".into()).into());
        }
    };

    if version != PROTOCOL_VERSION {
        out.send_error(
            400,
            format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
        )
        .await?;
        return Err(ProtocolError::InvalidMessage("protocol version mismatch".into()).into());
    }

    Ok(())
}

/// Handles one client command.
///
/// Lobby requests always answer with their success event or an `error`.
/// Gameplay actions are fire-and-forget; the room drops the ones the rules
/// refuse.
async fn handle_command<C: Codec>(
    state: &ServerState<C>,
    out: &mut Outbound<'_, C>,
    session: SessionId,
    command: ClientCommand,
    events_tx: &mpsc::UnboundedSender<ServerEvent>,
) -> Result<(), NightfallError> {
    match command {
        ClientCommand::Handshake { .. } => {
            out.send_error(400, "already handshaken").await?;
        }

        ClientCommand::Heartbeat { client_time } => {
            out.send(ServerEvent::HeartbeatAck {
                client_time,
                server_time: state.server_time(),
            })
            .await?;
        }

        ClientCommand::CreateRoom => {
            let result = state.registry.lock().await.create_room(session);
            match result {
                Ok(room_id) => out.send(ServerEvent::RoomCreated { room_id }).await?,
                Err(e) => out.send_room_error(&e).await?,
            }
        }

        ClientCommand::JoinRoom {
            room_id,
            player_name,
        } => {
            // `room-joined` arrives through the event channel, ahead of the
            // room's `players-update`.
            let result = join_room(state, session, &room_id, &player_name, events_tx.clone()).await;
            if let Err(e) = result {
                tracing::debug!(%session, error = %e, "join rejected");
                out.send_room_error(&e).await?;
            }
        }

        ClientCommand::StartGame => {
            let handle = state.registry.lock().await.handle_of(session);
            let result = match handle {
                Ok(handle) => handle.start().await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => out.send(ServerEvent::GameStartAccepted).await?,
                Err(e) => out.send_room_error(&e).await?,
            }
        }

        other => {
            let Some(action) = Action::from_command(other) else {
                return Ok(());
            };
            // PERF: every action still takes the registry lock to look up its room.
            let handle = state.registry.lock().await.handle_of(session);
            let result = match handle {
                Ok(handle) => handle.act(session, action).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                out.send_room_error(&e).await?;
            }
        }
    }

    Ok(())
}

/// Seats the session. The registry is locked only around the bookkeeping,
/// never across the room's reply.
async fn join_room<C: Codec>(
    state: &ServerState<C>,
    session: SessionId,
    room_id: &str,
    player_name: &str,
    events_tx: mpsc::UnboundedSender<ServerEvent>,
) -> Result<(), RoomError> {
    let pending = state.registry.lock().await.begin_join(session, room_id)?;
    match pending.handle.join(session, player_name, events_tx).await {
        Ok(_) => Ok(()),
        Err(e) => {
            state.registry.lock().await.abort_join(session, &pending);
            Err(e)
        }
    }
}

/// Tells the session's room that its connection closed, then lets the
/// registry remove the room if that emptied its lobby.
async fn report_disconnect<C: Codec>(state: &ServerState<C>, session: SessionId) -> Result<(), RoomError> {
    let handle = state.registry.lock().await.begin_disconnect(session)?;
    let Some(handle) = handle else {
        return Ok(());
    };
    let info = handle.disconnect(session).await?;
    state.registry.lock().await.finish_disconnect(info).await
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
