//! chess-protocol
//!
//! Line-level encoding/decoding for the chess server.
//!
//! - [`framing`]    : reassembles newline-terminated lines from arbitrary chunks
//! - [`json_codec`] : one JSON event per line (player ⇄ server)
//! - [`uci`]        : UCI commands and `bestmove` parsing (server ⇄ engine)

pub mod error;
pub mod framing;
pub mod json_codec;
pub mod uci;

pub use error::ProtocolError;
pub use framing::LineFramer;
pub use json_codec::{format_outbound, parse_inbound_line};
pub use uci::{parse_best_move, BestMove, UciCommand};
