//! Seam between a session and whatever computes the opponent's moves.
//!
//! In the server this is the external UCI engine process; tests plug in
//! scripted searchers.

use std::future::Future;

use thiserror::Error;

use crate::error::GameError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// A search is already pending on this engine.
    #[error("engine is busy with another search")]
    Busy,

    /// The engine died, closed its output, timed out or sent garbage.
    #[error("{0}")]
    Failure(String),

    /// The search was abandoned because its owner went away.
    #[error("search cancelled")]
    Cancelled,
}

impl From<SearchError> for GameError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Busy => GameError::Busy,
            SearchError::Failure(cause) => GameError::EngineFailure(cause),
            SearchError::Cancelled => GameError::Cancelled,
        }
    }
}

/// Computes a best move for a FEN position.
///
/// The answer is a UCI move token such as `e7e5` or `a2a1q`.
pub trait MoveSearch {
    fn best_move(&self, fen: &str) -> impl Future<Output = Result<String, SearchError>> + Send;
}
