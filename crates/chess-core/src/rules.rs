//! Rules engine boundary.
//!
//! The session never touches board internals directly: it owns a
//! position and mutates it only through a [`RulesEngine`]. The default
//! implementation, [`ShakmatyRules`], delegates legality, check/mate
//! detection and FEN handling to `shakmaty`.

use std::collections::HashMap;

use shakmaty::{
    fen::Fen, san::San, uci::UciMove, CastlingMode, Chess, EnPassantMode, Move, Position, Rank,
    Role, Square,
};
use thiserror::Error;

use crate::messages::{BoardView, MoveRequest, PieceView};

/// Side colour as seen by the rules engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Color {
    White,
    Black,
}

impl From<shakmaty::Color> for Color {
    fn from(c: shakmaty::Color) -> Self {
        match c {
            shakmaty::Color::White => Color::White,
            shakmaty::Color::Black => Color::Black,
        }
    }
}

/// Rules-defined end of game.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Terminal {
    Checkmate { winner: Color },
    Stalemate,
    InsufficientMaterial,
    ThreefoldRepetition,
    FiftyMoveRule,
}

/// A move the rules engine refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}: {mv}")]
pub struct MoveRejected {
    pub mv: String,
    pub reason: &'static str,
}

impl MoveRejected {
    fn new(mv: impl Into<String>, reason: &'static str) -> Self {
        MoveRejected {
            mv: mv.into(),
            reason,
        }
    }
}

/// Result of applying a move: the new position plus its notations.
#[derive(Debug, Clone)]
pub struct Applied<P> {
    pub position: P,
    pub notation: String,
    pub uci: String,
}

/// What the session needs from a chess rules implementation.
pub trait RulesEngine {
    type Position: Clone;

    /// Standard starting position.
    fn initial_position(&self) -> Self::Position;

    /// Apply a player's from/to move, or reject it.
    fn apply_move(
        &self,
        position: &Self::Position,
        request: &MoveRequest,
    ) -> Result<Applied<Self::Position>, MoveRejected>;

    /// Apply a move given in UCI notation (`e7e5`, `a2a1q`), as returned
    /// by a search engine.
    fn apply_uci(
        &self,
        position: &Self::Position,
        uci: &str,
    ) -> Result<Applied<Self::Position>, MoveRejected>;

    /// `Some` once the game is over.
    fn terminal(&self, position: &Self::Position) -> Option<Terminal>;

    /// FEN of the position.
    fn serialize(&self, position: &Self::Position) -> String;

    fn board_view(&self, position: &Self::Position) -> BoardView;
}

/// A `shakmaty` position plus the repetition counts needed to detect
/// threefold repetition.
#[derive(Debug, Clone)]
pub struct ChessPosition {
    position: Chess,
    repetitions: HashMap<String, u8>,
}

impl ChessPosition {
    pub fn new() -> Self {
        Self::from_chess(Chess::default())
    }

    pub fn from_fen(fen: &str) -> Result<Self, String> {
        let fen: Fen = fen.parse().map_err(|e| format!("invalid FEN: {e}"))?;
        let position: Chess = fen
            .into_position(CastlingMode::Standard)
            .map_err(|e| format!("invalid FEN: {e}"))?;
        Ok(Self::from_chess(position))
    }

    fn from_chess(position: Chess) -> Self {
        let mut repetitions = HashMap::new();
        repetitions.insert(repetition_key(&position), 1);
        ChessPosition {
            position,
            repetitions,
        }
    }

    pub fn to_fen(&self) -> String {
        to_fen(&self.position)
    }

    pub fn turn(&self) -> Color {
        self.position.turn().into()
    }

    fn repetition_count(&self) -> u8 {
        self.repetitions
            .get(&repetition_key(&self.position))
            .copied()
            .unwrap_or(0)
    }
}

impl Default for ChessPosition {
    fn default() -> Self {
        Self::new()
    }
}

/// Standard chess rules backed by `shakmaty`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShakmatyRules;

impl ShakmatyRules {
    fn play(
        &self,
        position: &ChessPosition,
        m: Move,
        label: &str,
    ) -> Result<Applied<ChessPosition>, MoveRejected> {
        if !position.position.is_legal(&m) {
            return Err(MoveRejected::new(label, "illegal move"));
        }

        // SAN depends on the position before the move.
        let san = San::from_move(&position.position, &m);
        let uci = UciMove::from_move(&m, CastlingMode::Standard).to_string();

        let next = position
            .position
            .clone()
            .play(&m)
            .map_err(|_| MoveRejected::new(label, "illegal move"))?;

        let suffix = if next.is_checkmate() {
            "#"
        } else if next.is_check() {
            "+"
        } else {
            ""
        };

        let mut repetitions = position.repetitions.clone();
        *repetitions.entry(repetition_key(&next)).or_insert(0) += 1;

        Ok(Applied {
            position: ChessPosition {
                position: next,
                repetitions,
            },
            notation: format!("{san}{suffix}"),
            uci,
        })
    }
}

impl RulesEngine for ShakmatyRules {
    type Position = ChessPosition;

    fn initial_position(&self) -> ChessPosition {
        ChessPosition::new()
    }

    fn apply_move(
        &self,
        position: &ChessPosition,
        request: &MoveRequest,
    ) -> Result<Applied<ChessPosition>, MoveRejected> {
        let label = format!("{}{}", request.from, request.to);

        let from: Square = request
            .from
            .trim()
            .parse()
            .map_err(|_| MoveRejected::new(label.as_str(), "invalid square"))?;
        let to: Square = request
            .to
            .trim()
            .parse()
            .map_err(|_| MoveRejected::new(label.as_str(), "invalid square"))?;

        let promotion = match request.promotion {
            Some(c) => match Role::from_char(c.to_ascii_lowercase()) {
                Some(role @ (Role::Queen | Role::Rook | Role::Bishop | Role::Knight)) => Some(role),
                _ => return Err(MoveRejected::new(label, "invalid promotion piece")),
            },
            None => {
                let is_pawn = position.position.board().role_at(from) == Some(Role::Pawn);
                let last_rank = matches!(to.rank(), Rank::First | Rank::Eighth);
                (is_pawn && last_rank).then_some(Role::Queen)
            }
        };

        let uci = UciMove::Normal {
            from,
            to,
            promotion,
        };
        let m = uci
            .to_move(&position.position)
            .map_err(|_| MoveRejected::new(label.as_str(), "illegal move"))?;

        self.play(position, m, &label)
    }

    fn apply_uci(
        &self,
        position: &ChessPosition,
        uci: &str,
    ) -> Result<Applied<ChessPosition>, MoveRejected> {
        let parsed: UciMove = uci
            .parse()
            .map_err(|_| MoveRejected::new(uci, "unparseable move"))?;
        let m = parsed
            .to_move(&position.position)
            .map_err(|_| MoveRejected::new(uci, "illegal move"))?;

        self.play(position, m, uci)
    }

    fn terminal(&self, position: &ChessPosition) -> Option<Terminal> {
        let pos = &position.position;
        if pos.is_checkmate() {
            // The side to move is mated.
            let loser: Color = pos.turn().into();
            let winner = match loser {
                Color::White => Color::Black,
                Color::Black => Color::White,
            };
            Some(Terminal::Checkmate { winner })
        } else if pos.is_stalemate() {
            Some(Terminal::Stalemate)
        } else if pos.is_insufficient_material() {
            Some(Terminal::InsufficientMaterial)
        } else if position.repetition_count() >= 3 {
            Some(Terminal::ThreefoldRepetition)
        } else if pos.halfmoves() >= 100 {
            Some(Terminal::FiftyMoveRule)
        } else {
            None
        }
    }

    fn serialize(&self, position: &ChessPosition) -> String {
        position.to_fen()
    }

    fn board_view(&self, position: &ChessPosition) -> BoardView {
        let board = position.position.board();
        (0..8u32)
            .rev()
            .map(|rank| {
                (0..8u32)
                    .map(|file| {
                        let sq = Square::new(rank * 8 + file);
                        board.piece_at(sq).map(|piece| PieceView {
                            square: sq.to_string(),
                            role: piece.role.char(),
                            color: piece.color.char(),
                        })
                    })
                    .collect()
            })
            .collect()
    }
}

fn to_fen(position: &Chess) -> String {
    Fen::from_position(position.clone(), EnPassantMode::Legal).to_string()
}

/// Placement, side to move, castling rights and en passant square:
/// the FEN without its move counters.
fn repetition_key(position: &Chess) -> String {
    to_fen(position)
        .split_whitespace()
        .take(4)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    fn mv(from: &str, to: &str) -> MoveRequest {
        MoveRequest::new(from, to)
    }

    #[test]
    fn starting_position_serializes_to_standard_fen() {
        let rules = ShakmatyRules;
        let pos = rules.initial_position();
        assert_eq!(rules.serialize(&pos), START_FEN);
        assert_eq!(pos.turn(), Color::White);
        assert!(rules.terminal(&pos).is_none());
    }

    #[test]
    fn applies_legal_move_with_san_and_uci() {
        let rules = ShakmatyRules;
        let pos = rules.initial_position();
        let applied = rules.apply_move(&pos, &mv("e2", "e4")).unwrap();
        assert_eq!(applied.notation, "e4");
        assert_eq!(applied.uci, "e2e4");
        assert_eq!(applied.position.turn(), Color::Black);
    }

    #[test]
    fn rejects_illegal_and_malformed_moves() {
        let rules = ShakmatyRules;
        let pos = rules.initial_position();

        let err = rules.apply_move(&pos, &mv("e2", "e5")).unwrap_err();
        assert_eq!(err.reason, "illegal move");

        let err = rules.apply_move(&pos, &mv("z9", "e4")).unwrap_err();
        assert_eq!(err.reason, "invalid square");

        // Black pawn, white to move.
        assert!(rules.apply_move(&pos, &mv("e7", "e5")).is_err());
        assert!(rules.apply_uci(&pos, "garbage").is_err());
    }

    #[test]
    fn castling_uses_king_destination() {
        let rules = ShakmatyRules;
        let pos =
            ChessPosition::from_fen("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1").unwrap();
        let applied = rules.apply_move(&pos, &mv("e1", "g1")).unwrap();
        assert_eq!(applied.notation, "O-O");
        assert_eq!(applied.uci, "e1g1");
    }

    #[test]
    fn pawn_promotes_to_queen_by_default() {
        let rules = ShakmatyRules;
        let pos = ChessPosition::from_fen("8/P7/8/8/8/8/8/4K2k w - - 0 1").unwrap();

        let applied = rules.apply_move(&pos, &mv("a7", "a8")).unwrap();
        assert!(applied.notation.starts_with("a8=Q"));
        assert_eq!(applied.uci, "a7a8q");

        let applied = rules
            .apply_move(&pos, &mv("a7", "a8").with_promotion('n'))
            .unwrap();
        assert_eq!(applied.uci, "a7a8n");

        let err = rules
            .apply_move(&pos, &mv("a7", "a8").with_promotion('k'))
            .unwrap_err();
        assert_eq!(err.reason, "invalid promotion piece");
    }

    #[test]
    fn detects_fools_mate() {
        let rules = ShakmatyRules;
        let mut pos = rules.initial_position();
        for uci in ["f2f3", "e7e5", "g2g4"] {
            pos = rules.apply_uci(&pos, uci).unwrap().position;
        }
        let applied = rules.apply_uci(&pos, "d8h4").unwrap();
        assert_eq!(applied.notation, "Qh4#");
        assert_eq!(
            rules.terminal(&applied.position),
            Some(Terminal::Checkmate {
                winner: Color::Black
            })
        );
    }

    #[test]
    fn detects_stalemate_and_bare_kings() {
        let rules = ShakmatyRules;
        let stalemate = ChessPosition::from_fen("8/8/8/8/8/6q1/5k2/7K w - - 0 1").unwrap();
        assert_eq!(rules.terminal(&stalemate), Some(Terminal::Stalemate));

        let bare = ChessPosition::from_fen("8/8/8/4k3/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(rules.terminal(&bare), Some(Terminal::InsufficientMaterial));
    }

    #[test]
    fn detects_threefold_repetition() {
        let rules = ShakmatyRules;
        let mut pos = rules.initial_position();
        // Knights out and back twice: the start position occurs three times.
        for uci in [
            "g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8",
        ] {
            assert!(rules.terminal(&pos).is_none());
            pos = rules.apply_uci(&pos, uci).unwrap().position;
        }
        assert_eq!(rules.terminal(&pos), Some(Terminal::ThreefoldRepetition));
    }

    #[test]
    fn detects_fifty_move_rule() {
        let rules = ShakmatyRules;
        let pos = ChessPosition::from_fen("8/8/8/4k3/8/8/3R4/4K3 w - - 100 80").unwrap();
        assert_eq!(rules.terminal(&pos), Some(Terminal::FiftyMoveRule));
    }

    #[test]
    fn board_view_is_rank_eight_first() {
        let rules = ShakmatyRules;
        let view = rules.board_view(&rules.initial_position());
        assert_eq!(view.len(), 8);
        assert!(view.iter().all(|rank| rank.len() == 8));

        let a8 = view[0][0].as_ref().unwrap();
        assert_eq!(a8.square, "a8");
        assert_eq!((a8.role, a8.color), ('r', 'b'));

        let e1 = view[7][4].as_ref().unwrap();
        assert_eq!(e1.square, "e1");
        assert_eq!((e1.role, e1.color), ('k', 'w'));

        assert!(view[4][4].is_none());
    }
}
