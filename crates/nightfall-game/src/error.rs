//! Error types for the rules engine.

/// Why the rules engine rejected a request.
///
/// None of these are fatal: a rejected action leaves the game untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// Malformed input or an unknown or ineligible target.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Wrong role, wrong phase, or a dead (or living) sender.
    #[error("not allowed: {0}")]
    Authorization(String),

    /// The room has too few or too many players to start.
    #[error("{0}")]
    Capacity(String),

    /// A room or player that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// No role distribution exists for this many players.
    #[error("invalid player count: {0}")]
    InvalidPlayerCount(usize),
}

impl GameError {
    /// Numeric code sent to clients in `error` events.
    pub fn code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Authorization(_) => 403,
            Self::NotFound(_) => 404,
            Self::Capacity(_) | Self::InvalidPlayerCount(_) => 409,
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub(crate) fn authorization(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_maps_taxonomy() {
        assert_eq!(GameError::validation("x").code(), 400);
        assert_eq!(GameError::authorization("x").code(), 403);
        assert_eq!(GameError::NotFound("x".into()).code(), 404);
        assert_eq!(GameError::Capacity("x".into()).code(), 409);
        assert_eq!(GameError::InvalidPlayerCount(3).code(), 409);
    }

    #[test]
    fn test_capacity_message_is_verbatim() {
        let err = GameError::Capacity("need at least 4 players".into());
        assert_eq!(err.to_string(), "need at least 4 players");
    }
}
