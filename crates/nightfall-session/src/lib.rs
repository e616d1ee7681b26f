//! Session tracking for Nightfall.
//!
//! A session is one live transport connection. This crate records:
//!
//! 1. **Liveness**: connected, disconnected (with a timestamp), or expired.
//! 2. **Room binding**: which room, if any, a session has created or joined.
//!    A session is bound to at most one room.
//!
//! Seats are not sessions. When a browser reloads it opens a new connection,
//! gets a new [`SessionId`](nightfall_protocol::SessionId), and reclaims its
//! seat in the room by name. The game layer owns that mapping.
//!
//! ```text
//! Room Layer (above)     ← asks which room a session belongs to
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol Layer (below) ← SessionId, RoomId
//! ```

mod error;
mod manager;
mod session;

pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{Session, SessionConfig, SessionState};
