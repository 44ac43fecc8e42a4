//! chess-core
//!
//! Pure game logic:
//! - identifiers and lifecycle enums
//! - the rules engine boundary (backed by `shakmaty`)
//! - the per-session state machine
//! - the seam to an opponent move searcher
//! - transport-agnostic messages

pub mod ids;
pub mod status;
pub mod messages;
pub mod rules;
pub mod search;
pub mod session;
pub mod error;

pub use ids::{OwnerId, SessionId};
pub use status::{SessionStatus, Turn};

pub use messages::{
    AcceptedMove,
    BoardView,
    GameResult,
    InboundEvent,
    MoveRequest,
    MoveResult,
    OutboundEvent,
    PieceView,
    Snapshot,
};

pub use rules::{ChessPosition, MoveRejected, RulesEngine, ShakmatyRules, Terminal};
pub use search::{MoveSearch, SearchError};
pub use session::GameSession;
pub use error::GameError;
