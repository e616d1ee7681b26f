//! Core protocol types for Nightfall's wire format.
//!
//! Everything in this module travels on the wire: it is serialized by the
//! server, sent to a client, and deserialized on the other side (or the
//! reverse for [`ClientCommand`]). The game crate builds its state out of
//! the identity and enum types defined here so that there is exactly one
//! definition of a `Role` or a `Phase` in the workspace.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A room-scoped identifier for a seated player.
///
/// Allocated sequentially by the room when a name first joins. It survives
/// reconnects: the seat keeps its `PlayerId` while the [`SessionId`]
/// underneath it changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A transport-session identifier: one per live connection.
///
/// A new connection always gets a new `SessionId`, so reconnecting is
/// modelled as "a new session claims an existing seat by name".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// A shareable room code, e.g. `"K3ZQ9A"`.
///
/// Codes are upper-case alphanumerics. [`RoomId::normalize`] canonicalises
/// whatever a player typed so lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Length of generated room codes.
    pub const CODE_LEN: usize = 6;

    /// Trims surrounding whitespace and upper-cases the code.
    pub fn normalize(raw: &str) -> Self {
        Self(raw.trim().to_ascii_uppercase())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Game vocabulary
// ---------------------------------------------------------------------------

/// A player's hidden role, fixed once the game starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Werewolf,
    Healer,
    Seer,
    Snitch,
    Villager,
}

impl Role {
    /// Returns `true` for the werewolf team.
    pub fn is_werewolf(self) -> bool {
        matches!(self, Self::Werewolf)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Werewolf => "werewolf",
            Self::Healer => "healer",
            Self::Seer => "seer",
            Self::Snitch => "snitch",
            Self::Villager => "villager",
        };
        f.write_str(name)
    }
}

/// The stage of a round.
///
/// ```text
/// Lobby → Night → [Healer] → Discussion → Voting → Results → Night (round + 1)
///                                                          ↘
///                      any active phase ────────────────────→ Ended
/// ```
///
/// `Healer` is skipped when no healer is alive or no kill is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Lobby,
    Night,
    Healer,
    Discussion,
    Voting,
    Results,
    Ended,
}

impl Phase {
    /// Returns `true` while a game is running (started and not ended).
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Lobby | Self::Ended)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lobby => "lobby",
            Self::Night => "night",
            Self::Healer => "healer",
            Self::Discussion => "discussion",
            Self::Voting => "voting",
            Self::Results => "results",
            Self::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// The winning team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Villagers,
    Werewolves,
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Villagers => f.write_str("villagers"),
            Self::Werewolves => f.write_str("werewolves"),
        }
    }
}

/// A player as one particular viewer is allowed to see them.
///
/// `role` is `None` whenever the viewer may not know it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub role: Option<Role>,
    pub alive: bool,
    pub connected: bool,
}

/// One line of public or werewolf chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub player_id: PlayerId,
    pub player_name: String,
    pub message: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Votes received by one target, as revealed in the results phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub target_id: PlayerId,
    pub target_name: String,
    /// Display names of the voters, in seat order.
    pub voters: Vec<String>,
}

/// Who an outbound event is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every session attached to the room.
    All,
    /// The session currently bound to one seat.
    Player(PlayerId),
    /// The sessions currently bound to several seats.
    Players(Vec<PlayerId>),
    /// One session, seated or not (replies to requests).
    Session(SessionId),
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Everything a client can ask the server to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientCommand {
    /// First frame on a connection.
    Handshake { version: u32 },
    /// Keep-alive; answered with `heartbeat-ack`.
    Heartbeat { client_time: u64 },
    CreateRoom,
    JoinRoom { room_id: String, player_name: String },
    StartGame,
    WerewolfKill { target_id: PlayerId },
    HealerHeal { target_id: PlayerId },
    HealerNoHeal,
    Vote { target_id: PlayerId },
    ChatMessage { message: String },
    WerewolfChatMessage { message: String },
    SnitchMessage { target_id: PlayerId, message: String },
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Everything the server can push to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    HandshakeAck { session_id: SessionId, server_time: u64 },
    HeartbeatAck { client_time: u64, server_time: u64 },

    // -- request/response --------------------------------------------------
    RoomCreated { room_id: RoomId },
    RoomJoined { room_id: RoomId, player_id: PlayerId, reconnected: bool },
    GameStartAccepted,
    Error { code: u16, message: String },

    // -- room state --------------------------------------------------------
    PlayersUpdate { players: Vec<PlayerView> },
    GameStarted { players: Vec<PlayerView> },
    PhaseChange { phase: Phase, round: u32 },
    TimerUpdate { phase: Phase, remaining_ms: u64 },
    ChatUpdate { messages: Vec<ChatMessage> },
    WerewolfChatUpdate { messages: Vec<ChatMessage> },
    VotesUpdate { count: usize },
    VoteResults {
        breakdown: Vec<VoteTally>,
        eliminated_id: Option<PlayerId>,
        eliminated_name: Option<String>,
    },

    // -- night -------------------------------------------------------------
    KillLocked { target_id: PlayerId, target_name: String },
    WerewolfKilled { target_id: PlayerId, target_name: String, self_heals_left: u8 },
    HealConfirmed { self_heals_left: u8 },
    PlayerSaved { player_id: PlayerId, player_name: String },

    // -- deaths ------------------------------------------------------------
    PlayerKilled { player_id: PlayerId, player_name: String },
    PlayerEliminated { player_id: PlayerId, player_name: String },
    PlayerForfeited { player_id: PlayerId, player_name: String },

    SnitchMessageReceived { message: String, snitch_name: String },

    GameEnd {
        winner: Winner,
        reason: Option<String>,
        round: u32,
        players: Vec<PlayerView>,
    },
}

impl ServerEvent {
    /// Shorthand for an `error` event.
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self::Error { code, message: message.into() }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The body of a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "lowercase")]
pub enum Payload {
    Command(ClientCommand),
    Event(ServerEvent),
}

/// One frame on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-connection sequence number, assigned by the sender.
    pub seq: u64,
    /// Sender-relative milliseconds.
    pub timestamp: u64,
    pub payload: Payload,
}

impl Envelope {
    /// Wraps a server event.
    pub fn event(seq: u64, timestamp: u64, event: ServerEvent) -> Self {
        Self { seq, timestamp, payload: Payload::Event(event) }
    }

    /// Wraps a client command.
    pub fn command(seq: u64, timestamp: u64, command: ClientCommand) -> Self {
        Self { seq, timestamp, payload: Payload::Command(command) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&PlayerId(42)).unwrap();
        assert_eq!(json, "42");
        assert_eq!(PlayerId(7).to_string(), "P-7");
    }

    #[test]
    fn test_room_id_normalize_trims_and_uppercases() {
        assert_eq!(RoomId::normalize("  k3zq9a "), RoomId("K3ZQ9A".into()));
        assert_eq!(serde_json::to_string(&RoomId("AB12CD".into())).unwrap(), "\"AB12CD\"");
    }

    #[test]
    fn test_role_and_phase_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Werewolf).unwrap(), "\"werewolf\"");
        assert_eq!(serde_json::to_string(&Phase::Discussion).unwrap(), "\"discussion\"");
        assert_eq!(Phase::Results.to_string(), "results");
    }

    #[test]
    fn test_phase_is_active() {
        assert!(!Phase::Lobby.is_active());
        assert!(Phase::Night.is_active());
        assert!(Phase::Results.is_active());
        assert!(!Phase::Ended.is_active());
    }

    #[test]
    fn test_client_command_uses_kebab_case_tags() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"type":"werewolf-kill","target_id":3}"#).unwrap();
        assert_eq!(cmd, ClientCommand::WerewolfKill { target_id: PlayerId(3) });

        let cmd: ClientCommand = serde_json::from_str(r#"{"type":"healer-no-heal"}"#).unwrap();
        assert_eq!(cmd, ClientCommand::HealerNoHeal);

        let cmd: ClientCommand = serde_json::from_str(
            r#"{"type":"join-room","room_id":"ab12cd","player_name":"Mara"}"#,
        )
        .unwrap();
        assert!(matches!(cmd, ClientCommand::JoinRoom { ref player_name, .. } if player_name == "Mara"));
    }

    #[test]
    fn test_server_event_json_format() {
        let json = serde_json::to_value(ServerEvent::PhaseChange {
            phase: Phase::Night,
            round: 2,
        })
        .unwrap();
        assert_eq!(json["type"], "phase-change");
        assert_eq!(json["phase"], "night");
        assert_eq!(json["round"], 2);

        let json = serde_json::to_value(ServerEvent::error(409, "name taken")).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], 409);
    }

    #[test]
    fn test_player_view_hidden_role_is_null() {
        let view = PlayerView {
            id: PlayerId(1),
            name: "Ana".into(),
            role: None,
            alive: true,
            connected: true,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert!(json["role"].is_null());
    }

    #[test]
    fn test_envelope_payload_is_adjacently_tagged() {
        let env = Envelope::command(1, 10, ClientCommand::StartGame);
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["payload"]["kind"], "command");
        assert_eq!(json["payload"]["body"]["type"], "start-game");
    }
}
