//! Room lifecycle management for Nightfall.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its
//! [`GameState`](nightfall_game::GameState) and its single
//! [`PhaseTimer`](nightfall_timer::PhaseTimer). Everything that touches a
//! room's state arrives through its command channel, so mutations never
//! interleave. Rooms share nothing and run in parallel.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates and destroys rooms, maps sessions to rooms
//! - [`RoomHandle`]: sends commands to a running room actor
//! - [`RoomState`]: coarse lifecycle derived from the game phase
//! - [`RoomConfig`]: rules, timer, grace period, and eviction settings

mod config;
mod error;
mod registry;
mod room;

pub use config::{RoomConfig, RoomState};
pub use error::RoomError;
pub use registry::{PendingJoin, RoomRegistry, find_ended};
pub use room::{EventSender, JoinReply, RoomHandle, RoomInfo};
