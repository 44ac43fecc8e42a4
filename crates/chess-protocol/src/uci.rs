//! UCI (Universal Chess Interface) line codec.
//!
//! Only the handful of commands the server needs:
//!
//! ```text
//! server -> engine            engine -> server
//! ----------------            ----------------
//! uci                         id / option / uciok      (ignored)
//! isready                     readyok                  (ignored)
//! ucinewgame
//! position fen <fen>
//! go movetime <ms>            info ...                 (ignored)
//!                             bestmove <move> [ponder <move>]
//! ```
//!
//! The engine may print any number of informational lines before the
//! answer; the answer is the first line containing the `bestmove` token.

use std::fmt;

pub const BEST_MOVE_MARKER: &str = "bestmove";
pub const PONDER_MARKER: &str = "ponder";

/// A command line sent to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UciCommand<'a> {
    Uci,
    IsReady,
    UciNewGame,
    Position { fen: &'a str },
    GoMovetime { millis: u64 },
}

impl fmt::Display for UciCommand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UciCommand::Uci => f.write_str("uci"),
            UciCommand::IsReady => f.write_str("isready"),
            UciCommand::UciNewGame => f.write_str("ucinewgame"),
            UciCommand::Position { fen } => write!(f, "position fen {fen}"),
            UciCommand::GoMovetime { millis } => write!(f, "go movetime {millis}"),
        }
    }
}

/// Append commands as newline-terminated lines.
pub fn encode_commands(commands: &[UciCommand<'_>], out: &mut Vec<u8>) {
    for cmd in commands {
        out.extend_from_slice(cmd.to_string().as_bytes());
        out.push(b'\n');
    }
}

/// Answer carried by a `bestmove` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BestMove {
    /// The move token, e.g. `e7e5` or `a2a1q`.
    Move(String),

    /// `bestmove (none)` / `bestmove 0000` or a bare marker: the engine
    /// has nothing to play.
    NoMove,
}

/// Look for the best-move marker in one output line.
///
/// Returns `None` for lines without the marker (`info`, `readyok`, ...).
/// The move is the token right after the marker; an optional
/// `ponder <move>` suffix is ignored.
pub fn parse_best_move(line: &str) -> Option<BestMove> {
    let mut tokens = line.split_whitespace();
    tokens.find(|tok| *tok == BEST_MOVE_MARKER)?;

    match tokens.next() {
        None => Some(BestMove::NoMove),
        Some(tok) if tok == PONDER_MARKER || tok == "(none)" || tok == "0000" => {
            Some(BestMove::NoMove)
        }
        Some(tok) => Some(BestMove::Move(tok.to_string())),
    }
}
