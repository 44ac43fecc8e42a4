//! Scripted UCI stand-ins for tests.
//!
//! Each one is a small `sh` loop that answers the handshake and reacts
//! to `go` in a particular way.

#![allow(dead_code)]

use chess_server::config::EngineConfig;

/// Answers every `go` with the given output (a shell snippet).
pub fn scripted_engine(on_go: &str, response_grace_ms: u64) -> EngineConfig {
    engine_script(":", on_go, response_grace_ms)
}

/// Plays the given moves in order, one per `go`.
pub fn sequenced_engine(moves: &[&str]) -> EngineConfig {
    engine_script(
        &format!("set -- {}", moves.join(" ")),
        r#"echo "bestmove $1"; shift"#,
        2_000,
    )
}

fn engine_script(prelude: &str, on_go: &str, response_grace_ms: u64) -> EngineConfig {
    let script = format!(
        r#"{prelude}
while read -r line; do
  case "$line" in
    uci) echo "id name stand-in"; echo uciok ;;
    isready) echo readyok ;;
    go*) {on_go} ;;
  esac
done"#
    );
    EngineConfig {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), script],
        movetime_ms: 10,
        response_grace_ms,
    }
}

/// Always plays `mv`, with an info line and a ponder suffix.
pub fn replying_engine(mv: &str) -> EngineConfig {
    scripted_engine(
        &format!(r#"echo "info depth 1 score cp 12"; echo "bestmove {mv} ponder g1f3""#),
        2_000,
    )
}

/// Never answers `go`.
pub fn silent_engine(response_grace_ms: u64) -> EngineConfig {
    scripted_engine(":", response_grace_ms)
}

pub const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";
