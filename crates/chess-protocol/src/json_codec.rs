//! JSON-lines codec for player events.
//!
//! Each event is one JSON object on its own line, tagged by `type`:
//!
//! - Inbound:
//!   `{"type":"start_game"}`
//!   `{"type":"make_move","session_id":"<uuid>","from":"e2","to":"e4"}`
//!   `{"type":"get_state","session_id":"<uuid>"}`
//!
//! - Outbound:
//!   `game_started`, `move_result`, `opponent_move`, `state`, `error`
//!   (see `chess_core::OutboundEvent`).

use chess_core::{InboundEvent, OutboundEvent};

use crate::error::ProtocolError;

/// Parse one line into an `InboundEvent`.
///
/// Returns `Ok(None)` for blank lines.
pub fn parse_inbound_line(line: &str) -> Result<Option<InboundEvent>, ProtocolError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(trimmed)?))
}

/// Format an `OutboundEvent` as a single line (no terminator).
pub fn format_outbound(msg: &OutboundEvent) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(msg)?)
}

/// Client side: format an `InboundEvent` as a single line.
pub fn format_inbound(msg: &InboundEvent) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(msg)?)
}

/// Client side: parse one line into an `OutboundEvent`.
pub fn parse_outbound_line(line: &str) -> Result<Option<OutboundEvent>, ProtocolError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(trimmed)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_core::{GameError, MoveRequest, MoveResult, SessionId};

    #[test]
    fn parses_inbound_events() {
        let id = SessionId::new();
        let line = format!(
            r#"{{"type":"make_move","session_id":"{id}","from":"a7","to":"a8","promotion":"n"}}"#
        );
        assert_eq!(
            parse_inbound_line(&line).unwrap(),
            Some(InboundEvent::MakeMove {
                session_id: id,
                request: MoveRequest::new("a7", "a8").with_promotion('n'),
            })
        );

        let line = format!(r#"  {{"type":"get_state","session_id":"{id}"}}  "#);
        assert_eq!(
            parse_inbound_line(&line).unwrap(),
            Some(InboundEvent::GetState { session_id: id })
        );
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert!(parse_inbound_line("").unwrap().is_none());
        assert!(parse_inbound_line("   \t").unwrap().is_none());
    }

    #[test]
    fn malformed_lines_are_errors() {
        for line in [
            "not json",
            r#"{"type":"fly_away"}"#,
            r#"{"type":"make_move","from":"e2","to":"e4"}"#,
            r#"{"type":"make_move","session_id":"nope","from":"e2","to":"e4"}"#,
            r#"{"from":"e2","to":"e4"}"#,
        ] {
            assert!(
                matches!(parse_inbound_line(line), Err(ProtocolError::Json(_))),
                "{line}"
            );
        }
    }

    #[test]
    fn outbound_lines_are_single_line_json() {
        let id = SessionId::new();
        let ev = OutboundEvent::OpponentMove(MoveResult::rejected(
            id,
            &GameError::EngineFailure("engine exited\nunexpectedly".into()),
        ));
        let line = format_outbound(&ev).unwrap();
        assert!(!line.contains('\n'));
        assert!(line.starts_with(r#"{"type":"opponent_move""#));
        assert_eq!(parse_outbound_line(&line).unwrap(), Some(ev));
    }

    #[test]
    fn client_side_round_trip_of_start() {
        let line = format_inbound(&InboundEvent::StartGame).unwrap();
        assert_eq!(line, r#"{"type":"start_game"}"#);
    }
}
