//! # Nightfall
//!
//! Server-authoritative coordinator for a werewolf-style social deduction
//! game played in browser clients.
//!
//! Clients connect over WebSocket, create or join a room by its short code,
//! and play through night, healer, discussion, voting, and results phases
//! until one team wins. The server owns every decision: roles, deadlines,
//! kills, votes, and visibility.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nightfall::prelude::*;
//!
//! # async fn run() -> Result<(), NightfallError> {
//! let server = NightfallServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::NightfallError;
pub use server::{NightfallServer, NightfallServerBuilder};

pub mod prelude {
    //! Everything needed to configure and run a server.

    pub use crate::{NightfallError, NightfallServer, NightfallServerBuilder};
    pub use nightfall_game::{GameConfig, PhaseDurations};
    pub use nightfall_protocol::{
        ClientCommand, Envelope, PROTOCOL_VERSION, Payload, Phase, PlayerId, Role, RoomId,
        ServerEvent, SessionId, Winner,
    };
    pub use nightfall_room::RoomConfig;
    pub use nightfall_session::SessionConfig;
    pub use nightfall_timer::TimerConfig;
}
