//! Unified error type for the Nightfall server.

use nightfall_game::GameError;
use nightfall_protocol::ProtocolError;
use nightfall_room::RoomError;
use nightfall_session::SessionError;
use nightfall_transport::TransportError;

/// Top-level error that wraps every layer's error.
///
/// The `#[from]` attribute on each variant lets `?` convert layer errors
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum NightfallError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Game(#[from] GameError),
}
