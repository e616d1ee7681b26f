//! Room actor: an isolated Tokio task that owns one game.
//!
//! The actor is the only writer of its [`GameState`]. Player commands,
//! disconnects, and timer expirations are all serialized through one
//! `select!` loop, so a timeout can never race a player action.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use nightfall_game::{Action, GameState, Outbox};
use nightfall_protocol::{Phase, PlayerId, Recipient, RoomId, ServerEvent, SessionId};
use nightfall_timer::{PhaseTimer, TimerEvent, TimerStats};
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::{RoomConfig, RoomError, RoomState};

/// Channel sender for delivering events to one connection.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Commands sent to a room actor through its channel.
///
/// Variants carrying a `oneshot::Sender` expect a reply; the rest are
/// fire-and-forget.
pub(crate) enum RoomCommand {
    Join {
        session: SessionId,
        name: String,
        sender: EventSender,
        reply: oneshot::Sender<Result<JoinReply, RoomError>>,
    },

    Start {
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// A gameplay action. Rejections are logged and dropped.
    Action { session: SessionId, action: Action },

    Disconnect {
        session: SessionId,
        reply: oneshot::Sender<RoomInfo>,
    },

    GetInfo { reply: oneshot::Sender<RoomInfo> },

    Shutdown,
}

/// The result of a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinReply {
    pub player_id: PlayerId,
    /// `true` when the session took over an existing seat.
    pub reconnected: bool,
}

/// A snapshot of room metadata (not the game state itself).
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub state: RoomState,
    pub phase: Phase,
    pub round: u32,
    /// Seats, connected or not.
    pub seat_count: usize,
    pub connected_count: usize,
    /// When the game reached `Ended`, on the Tokio clock.
    pub ended_at: Option<Instant>,
    pub timer: TimerStats,
}

/// Handle to a running room actor.
///
/// Cheap to clone; it wraps an `mpsc::Sender`. The registry holds one per
/// room.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Seats a session under `name`, or reattaches it to the seat of
    /// that name mid-game. Events for the session go to `sender`.
    pub async fn join(
        &self,
        session: SessionId,
        name: impl Into<String>,
        sender: EventSender,
    ) -> Result<JoinReply, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Join {
            session,
            name: name.into(),
            sender,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Asks the room to deal roles and enter the first night.
    pub async fn start(&self) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Start { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Delivers a gameplay action (fire-and-forget).
    pub async fn act(&self, session: SessionId, action: Action) -> Result<(), RoomError> {
        self.send(RoomCommand::Action { session, action }).await
    }

    /// Reports that a session's connection closed.
    pub async fn disconnect(&self, session: SessionId) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Disconnect {
            session,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::GetInfo { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Tells the room to stop. Its timer is cancelled with it.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.send(RoomCommand::Shutdown).await
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender.send(cmd).await.map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.room_id.clone())
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    room_id: RoomId,
    config: RoomConfig,
    game: GameState,
    timer: PhaseTimer,
    /// Game epoch the timer was last synced to.
    synced_epoch: u64,
    senders: HashMap<SessionId, EventSender>,
    ended_at: Option<Instant>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    async fn run(mut self) {
        tracing::info!(room_id = %self.room_id, "room actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle_command(cmd) {
                        break;
                    }
                }
                event = self.timer.wait() => self.handle_timer(event),
            }
        }

        self.timer.cancel();
        tracing::info!(room_id = %self.room_id, "room actor stopped");
    }

    /// Returns `false` when the actor should stop.
    fn handle_command(&mut self, cmd: RoomCommand) -> bool {
        match cmd {
            RoomCommand::Join {
                session,
                name,
                sender,
                reply,
            } => {
                let result = self.handle_join(session, &name, sender);
                let _ = reply.send(result);
            }
            RoomCommand::Start { reply } => {
                let result = self.handle_start();
                let _ = reply.send(result);
            }
            RoomCommand::Action { session, action } => {
                self.handle_action(session, action);
            }
            RoomCommand::Disconnect { session, reply } => {
                self.handle_disconnect(session);
                let _ = reply.send(self.info());
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Shutdown => {
                tracing::info!(room_id = %self.room_id, "room shutting down");
                return false;
            }
        }
        true
    }

    fn handle_join(
        &mut self,
        session: SessionId,
        name: &str,
        sender: EventSender,
    ) -> Result<JoinReply, RoomError> {
        let outcome = self.game.join(session, name)?;
        self.senders.insert(session, sender);
        tracing::info!(
            room_id = %self.room_id,
            %session,
            player_id = %outcome.player_id,
            reconnected = outcome.reconnected,
            seats = self.game.seat_count(),
            "player joined"
        );
        self.dispatch(outcome.events);
        Ok(JoinReply {
            player_id: outcome.player_id,
            reconnected: outcome.reconnected,
        })
    }

    fn handle_start(&mut self) -> Result<(), RoomError> {
        let events = self.game.start_game()?;
        tracing::info!(room_id = %self.room_id, players = self.game.seat_count(), "game started");
        self.apply(events);
        Ok(())
    }

    fn handle_action(&mut self, session: SessionId, action: Action) {
        match self.game.apply(session, action, unix_millis()) {
            Ok(events) => self.apply(events),
            Err(reason) => {
                tracing::debug!(
                    room_id = %self.room_id,
                    %session,
                    %reason,
                    "action rejected"
                );
            }
        }
    }

    fn handle_disconnect(&mut self, session: SessionId) {
        self.senders.remove(&session);
        let events = self.game.disconnect(session, Instant::now().into_std());
        self.apply(events);
    }

    fn handle_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::Tick { remaining } => {
                let update = ServerEvent::TimerUpdate {
                    phase: self.game.phase(),
                    remaining_ms: u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX),
                };
                self.dispatch(vec![(Recipient::All, update)]);

                let events = self
                    .game
                    .reap_forfeits(Instant::now().into_std(), self.config.reconnect_grace);
                self.apply(events);
            }
            TimerEvent::Expired { generation } => {
                tracing::debug!(
                    room_id = %self.room_id,
                    phase = %self.game.phase(),
                    generation,
                    "phase timer expired"
                );
                let events = self.game.on_timeout();
                self.apply(events);
            }
        }
    }

    /// Dispatches the events of a state change and realigns the timer.
    fn apply(&mut self, events: Outbox) {
        self.dispatch(events);
        self.sync_timer();
    }

    /// Re-arms the timer whenever the game has entered a new phase. Phases
    /// without a duration leave it cancelled.
    fn sync_timer(&mut self) {
        let epoch = self.game.epoch();
        if epoch == self.synced_epoch {
            return;
        }
        self.synced_epoch = epoch;

        match self.game.phase_duration() {
            Some(duration) => {
                self.timer.arm(duration);
            }
            None => {
                self.timer.cancel();
            }
        }

        if self.game.is_ended() && self.ended_at.is_none() {
            self.ended_at = Some(Instant::now());
            tracing::info!(room_id = %self.room_id, round = self.game.round(), "game ended");
        }
    }

    /// Routes events to the connections of their recipients.
    fn dispatch(&self, events: Outbox) {
        for (recipient, event) in events {
            match recipient {
                Recipient::All => {
                    for sender in self.senders.values() {
                        let _ = sender.send(event.clone());
                    }
                }
                Recipient::Player(id) => self.send_to_player(id, event),
                Recipient::Players(ids) => {
                    for id in ids {
                        self.send_to_player(id, event.clone());
                    }
                }
                Recipient::Session(session) => self.send_to(session, event),
            }
        }
    }

    fn send_to_player(&self, id: PlayerId, event: ServerEvent) {
        if let Some(player) = self.game.player(id) {
            if player.connected {
                self.send_to(player.session, event);
            }
        }
    }

    /// Silently drops the event if the connection is gone.
    fn send_to(&self, session: SessionId, event: ServerEvent) {
        if let Some(sender) = self.senders.get(&session) {
            let _ = sender.send(event);
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.room_id.clone(),
            state: RoomState::from_phase(self.game.phase()),
            phase: self.game.phase(),
            round: self.game.round(),
            seat_count: self.game.seat_count(),
            connected_count: self.game.connected_count(),
            ended_at: self.ended_at,
            timer: self.timer.stats().clone(),
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

/// Spawns a new room actor task and returns a handle to it.
///
/// `config.channel_size` bounds the command channel; senders wait when it
/// is full.
pub(crate) fn spawn_room(room_id: RoomId, config: RoomConfig, rng: StdRng) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.channel_size.max(1));

    let game = GameState::new(room_id.clone(), config.game.clone(), rng);
    let actor = RoomActor {
        room_id: room_id.clone(),
        timer: PhaseTimer::new(config.timer.clone()),
        synced_epoch: game.epoch(),
        game,
        config,
        senders: HashMap::new(),
        ended_at: None,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle { room_id, sender: tx }
}
