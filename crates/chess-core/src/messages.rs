//! Message types exchanged with the transport layer.
//!
//! These are **transport-agnostic** logical messages:
//! - [`InboundEvent`]: what a remote player asks for.
//! - [`OutboundEvent`]: what the server reports back.
//!
//! The line encoding lives in the `chess-protocol` crate; this module
//! only fixes the shape (field names, `type` tags).

use serde::{Deserialize, Serialize};

use crate::error::GameError;
use crate::ids::SessionId;
use crate::status::{SessionStatus, Turn};

/// A request from a remote player.
///
/// A disconnect is not a message: the transport reports it when the
/// connection closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// Start a new game against the engine.
    StartGame,

    /// Play a move in an existing game.
    MakeMove {
        session_id: SessionId,
        #[serde(flatten)]
        request: MoveRequest,
    },

    /// Ask for the current state of a game.
    GetState { session_id: SessionId },
}

/// An event sent back to the player owning a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// Acknowledges a start request.
    GameStarted {
        session_id: SessionId,
        snapshot: Snapshot,
    },

    /// Result of the player's own move.
    MoveResult(MoveResult),

    /// The engine's reply move.
    OpponentMove(MoveResult),

    /// Answer to a state query.
    State {
        session_id: SessionId,
        snapshot: Snapshot,
    },

    /// Any failure that is not tied to a move result.
    Error { message: String },
}

impl OutboundEvent {
    pub fn error(message: impl Into<String>) -> Self {
        OutboundEvent::Error {
            message: message.into(),
        }
    }
}

/// A proposed move, given as from/to squares (`"e2"`, `"e4"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub from: String,
    pub to: String,

    /// Promotion piece (`q`, `r`, `b`, `n`). A pawn reaching the last
    /// rank without one promotes to a queen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<char>,
}

impl MoveRequest {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        MoveRequest {
            from: from.into(),
            to: to.into(),
            promotion: None,
        }
    }

    pub fn with_promotion(mut self, piece: char) -> Self {
        self.promotion = Some(piece);
        self
    }
}

/// A move that the session accepted and applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedMove {
    /// SAN, e.g. `"e4"` or `"Qh4#"`.
    pub notation: String,

    /// The same move in UCI form, e.g. `"e2e4"`.
    pub uci: String,

    /// Position after the move.
    pub fen: String,

    /// True when this move ended the game.
    pub terminal: bool,

    pub result: Option<GameResult>,
}

/// Wire shape of a move outcome (player or opponent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveResult {
    pub session_id: SessionId,
    pub success: bool,

    #[serde(rename = "move", default, skip_serializing_if = "Option::is_none")]
    pub notation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uci: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fen: Option<String>,

    #[serde(default)]
    pub terminal: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<GameResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MoveResult {
    pub fn accepted(session_id: SessionId, mv: &AcceptedMove) -> Self {
        MoveResult {
            session_id,
            success: true,
            notation: Some(mv.notation.clone()),
            uci: Some(mv.uci.clone()),
            fen: Some(mv.fen.clone()),
            terminal: mv.terminal,
            result: mv.result.clone(),
            error: None,
        }
    }

    /// Attach the outcome of a game that this failure ended.
    pub fn with_result(mut self, result: Option<GameResult>) -> Self {
        self.result = result;
        self
    }

    /// A failed move. Session-fatal errors are reported as terminal.
    pub fn rejected(session_id: SessionId, err: &GameError) -> Self {
        MoveResult {
            session_id,
            success: false,
            notation: None,
            uci: None,
            fen: None,
            terminal: err.is_session_fatal(),
            result: None,
            error: Some(err.to_string()),
        }
    }
}

/// Read-only view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub fen: String,
    pub board: BoardView,
    pub move_history: Vec<String>,
    pub turn: Turn,
    pub status: SessionStatus,
    pub result: Option<GameResult>,
}

/// 8x8 grid, rank 8 first and file `a` first; `None` for empty squares.
pub type BoardView = Vec<Vec<Option<PieceView>>>;

/// One occupied square of a [`BoardView`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceView {
    pub square: String,

    /// Lowercase piece letter: `p`, `n`, `b`, `r`, `q`, `k`.
    #[serde(rename = "type")]
    pub role: char,

    /// `w` or `b`.
    pub color: char,
}

/// How a finished game ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameResult {
    Checkmate { winner: Turn },
    Stalemate,
    InsufficientMaterial,
    ThreefoldRepetition,
    FiftyMoveRule,

    /// The engine failed and the game could not continue.
    EngineError { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_events_use_type_tags() {
        let id = SessionId::new();
        let json = format!(
            r#"{{"type":"make_move","session_id":"{id}","from":"e2","to":"e4"}}"#
        );
        let ev: InboundEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(
            ev,
            InboundEvent::MakeMove {
                session_id: id,
                request: MoveRequest::new("e2", "e4"),
            }
        );

        let ev: InboundEvent = serde_json::from_str(r#"{"type":"start_game"}"#).unwrap();
        assert_eq!(ev, InboundEvent::StartGame);
    }

    #[test]
    fn move_result_uses_move_field_name() {
        let id = SessionId::new();
        let mv = AcceptedMove {
            notation: "e4".into(),
            uci: "e2e4".into(),
            fen: "fen".into(),
            terminal: false,
            result: None,
        };
        let value = serde_json::to_value(OutboundEvent::MoveResult(MoveResult::accepted(id, &mv)))
            .unwrap();
        assert_eq!(value["type"], "move_result");
        assert_eq!(value["move"], "e4");
        assert_eq!(value["success"], true);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn rejected_engine_failure_is_terminal() {
        let id = SessionId::new();
        let res = MoveResult::rejected(id, &GameError::EngineFailure("eof".into()));
        assert!(!res.success);
        assert!(res.terminal);

        let res = MoveResult::rejected(id, &GameError::IllegalMove("e2e5".into()));
        assert!(!res.terminal);
    }

    #[test]
    fn fatal_rejection_carries_the_game_result() {
        let id = SessionId::new();
        let ended = GameResult::EngineError {
            message: "engine failure: eof".into(),
        };
        let res = MoveResult::rejected(id, &GameError::EngineFailure("eof".into()))
            .with_result(Some(ended.clone()));

        let value = serde_json::to_value(OutboundEvent::OpponentMove(res)).unwrap();
        assert_eq!(value["terminal"], true);
        assert_eq!(value["result"]["kind"], "engine_error");
        assert_eq!(value["result"]["message"], "engine failure: eof");
    }

    #[test]
    fn game_result_is_tagged_by_kind() {
        let value = serde_json::to_value(GameResult::Checkmate {
            winner: Turn::Player,
        })
        .unwrap();
        assert_eq!(value["kind"], "checkmate");
        assert_eq!(value["winner"], "player");
    }
}
