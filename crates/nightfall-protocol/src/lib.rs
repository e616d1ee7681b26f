//! Wire protocol for Nightfall.
//!
//! - **Types**: identities ([`PlayerId`], [`SessionId`], [`RoomId`]), the
//!   game vocabulary ([`Role`], [`Phase`], [`Winner`]) and the two message
//!   enums: [`ClientCommand`] in, [`ServerEvent`] out, both carried in an
//!   [`Envelope`].
//! - **Codec**: the [`Codec`] trait and the default [`JsonCodec`].
//! - **Errors**: [`ProtocolError`].
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Room (game rules)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ChatMessage, ClientCommand, Envelope, Payload, Phase, PlayerId, PlayerView,
    Recipient, Role, RoomId, ServerEvent, SessionId, VoteTally, Winner,
};

/// Protocol version a client must announce in its handshake.
pub const PROTOCOL_VERSION: u32 = 1;
