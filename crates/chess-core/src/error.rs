//! Error types for session operations.
//!
//! Every session operation returns these as values; the transport layer
//! turns them into outbound error events. Only [`GameError::EngineFailure`]
//! and [`GameError::EngineProtocol`] end the game.

use thiserror::Error;

use crate::ids::SessionId;
use crate::status::{SessionStatus, Turn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// Operation not valid in the current status. Nothing was mutated.
    #[error("game is not in a valid state for this operation (status: {0})")]
    InvalidState(SessionStatus),

    /// Operation attempted out of turn. Nothing was mutated.
    #[error("not your turn: it is the {0}'s turn")]
    TurnViolation(Turn),

    /// The rules engine rejected a proposed move. Nothing was mutated.
    #[error("illegal move: {0}")]
    IllegalMove(String),

    /// A search is already pending for this session's engine.
    #[error("engine is busy with another search")]
    Busy,

    /// The engine process died, timed out or produced unparseable output.
    #[error("engine failure: {0}")]
    EngineFailure(String),

    /// The engine answered with a move the rules engine rejects.
    #[error("engine protocol error: {0}")]
    EngineProtocol(String),

    /// Session id unknown to the registry.
    #[error("game not found: {0}")]
    NotFound(SessionId),

    /// The search was abandoned because the session is being torn down.
    #[error("search cancelled")]
    Cancelled,
}

impl GameError {
    /// True for errors that finish the game.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, GameError::EngineFailure(_) | GameError::EngineProtocol(_))
    }
}
