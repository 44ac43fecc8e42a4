//! Per-game state machine.
//!
//! A [`GameSession`] ties together a player, a rules-backed position and
//! the turn marker:
//!
//! ```text
//! Waiting --start()--> Ongoing --terminal move / engine failure--> Finished
//! ```
//!
//! Player and opponent moves are separate operations so that turn order
//! is enforced by the type of call, not by inspecting who sent a move.
//! The player always plays white and moves first.

use crate::error::GameError;
use crate::ids::{OwnerId, SessionId};
use crate::messages::{AcceptedMove, GameResult, MoveRequest, Snapshot};
use crate::rules::{Applied, Color, RulesEngine, ShakmatyRules, Terminal};
use crate::search::{MoveSearch, SearchError};
use crate::status::{SessionStatus, Turn};

#[derive(Debug)]
pub struct GameSession<R: RulesEngine = ShakmatyRules> {
    id: SessionId,
    owner: OwnerId,
    rules: R,
    status: SessionStatus,
    turn: Turn,
    history: Vec<String>,
    position: R::Position,
    result: Option<GameResult>,

    /// Set between `begin_opponent_move` and `complete_opponent_move`.
    searching: bool,
}

impl GameSession<ShakmatyRules> {
    /// New session with standard rules, in `Waiting`.
    pub fn new(id: SessionId, owner: OwnerId) -> Self {
        GameSession::with_rules(id, owner, ShakmatyRules)
    }
}

impl<R: RulesEngine> GameSession<R> {
    pub fn with_rules(id: SessionId, owner: OwnerId, rules: R) -> Self {
        let position = rules.initial_position();
        GameSession::with_position(id, owner, rules, position)
    }

    /// Start from an arbitrary position. The player still moves first.
    pub fn with_position(id: SessionId, owner: OwnerId, rules: R, position: R::Position) -> Self {
        GameSession {
            id,
            owner,
            rules,
            status: SessionStatus::Waiting,
            turn: Turn::Player,
            history: Vec::new(),
            position,
            result: None,
            searching: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn turn(&self) -> Turn {
        self.turn
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn result(&self) -> Option<&GameResult> {
        self.result.as_ref()
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    pub fn fen(&self) -> String {
        self.rules.serialize(&self.position)
    }

    /// `Waiting -> Ongoing`. Fails if the game was already started.
    pub fn start(&mut self) -> Result<(), GameError> {
        if self.status != SessionStatus::Waiting {
            return Err(GameError::InvalidState(self.status));
        }
        self.status = SessionStatus::Ongoing;
        Ok(())
    }

    /// Validate and apply the player's move.
    ///
    /// On any error the session is left untouched.
    pub fn apply_player_move(&mut self, request: &MoveRequest) -> Result<AcceptedMove, GameError> {
        self.ensure_turn(Turn::Player)?;

        let applied = self
            .rules
            .apply_move(&self.position, request)
            .map_err(|e| GameError::IllegalMove(e.to_string()))?;

        Ok(self.accept(applied))
    }

    /// Ask `search` for the opponent's reply and apply it.
    ///
    /// Holds `&mut self` across the search. Callers that share the session
    /// behind a lock should use [`begin_opponent_move`](Self::begin_opponent_move)
    /// and [`complete_opponent_move`](Self::complete_opponent_move) instead.
    pub async fn apply_opponent_move<S: MoveSearch>(
        &mut self,
        search: &S,
    ) -> Result<AcceptedMove, GameError> {
        let fen = self.begin_opponent_move()?;
        let outcome = search.best_move(&fen).await;
        self.complete_opponent_move(outcome)
    }

    /// First half of an opponent move: check state and turn, mark a search
    /// as in flight and return the FEN to search from.
    pub fn begin_opponent_move(&mut self) -> Result<String, GameError> {
        self.ensure_turn(Turn::Opponent)?;
        if self.searching {
            return Err(GameError::Busy);
        }
        self.searching = true;
        Ok(self.fen())
    }

    /// Second half of an opponent move: apply what the search produced.
    ///
    /// Engine failures and engine moves the rules reject finish the game.
    /// A cancelled search changes nothing.
    pub fn complete_opponent_move(
        &mut self,
        outcome: Result<String, SearchError>,
    ) -> Result<AcceptedMove, GameError> {
        if !self.searching {
            return Err(GameError::InvalidState(self.status));
        }
        self.searching = false;

        let token = match outcome {
            Ok(token) => token,
            Err(err @ (SearchError::Cancelled | SearchError::Busy)) => return Err(err.into()),
            Err(SearchError::Failure(cause)) => {
                return Err(self.fail(GameError::EngineFailure(cause)));
            }
        };

        match self.rules.apply_uci(&self.position, &token) {
            Ok(applied) => Ok(self.accept(applied)),
            Err(rejected) => Err(self.fail(GameError::EngineProtocol(format!(
                "engine move rejected by rules ({rejected})"
            )))),
        }
    }

    /// Read-only view; valid in any state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            fen: self.fen(),
            board: self.rules.board_view(&self.position),
            move_history: self.history.clone(),
            turn: self.turn,
            status: self.status,
            result: self.result.clone(),
        }
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    fn ensure_turn(&self, expected: Turn) -> Result<(), GameError> {
        if self.status != SessionStatus::Ongoing {
            return Err(GameError::InvalidState(self.status));
        }
        if self.turn != expected {
            return Err(GameError::TurnViolation(self.turn));
        }
        Ok(())
    }

    /// Record an accepted move, flip the turn and run the terminal check
    /// (exactly once per accepted move).
    fn accept(&mut self, applied: Applied<R::Position>) -> AcceptedMove {
        let Applied {
            position,
            notation,
            uci,
        } = applied;

        self.position = position;
        self.history.push(notation.clone());
        self.turn = self.turn.flip();

        let result = self.rules.terminal(&self.position).map(game_result);
        if let Some(result) = &result {
            self.status = SessionStatus::Finished;
            self.result = Some(result.clone());
        }

        AcceptedMove {
            notation,
            uci,
            fen: self.fen(),
            terminal: result.is_some(),
            result,
        }
    }

    fn fail(&mut self, err: GameError) -> GameError {
        self.status = SessionStatus::Finished;
        self.result = Some(GameResult::EngineError {
            message: err.to_string(),
        });
        err
    }
}

fn game_result(terminal: Terminal) -> GameResult {
    match terminal {
        Terminal::Checkmate { winner } => GameResult::Checkmate {
            winner: match winner {
                Color::White => Turn::Player,
                Color::Black => Turn::Opponent,
            },
        },
        Terminal::Stalemate => GameResult::Stalemate,
        Terminal::InsufficientMaterial => GameResult::InsufficientMaterial,
        Terminal::ThreefoldRepetition => GameResult::ThreefoldRepetition,
        Terminal::FiftyMoveRule => GameResult::FiftyMoveRule,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> GameSession {
        let mut session = GameSession::new(SessionId::new(), OwnerId(1));
        session.start().unwrap();
        session
    }

    #[test]
    fn start_only_from_waiting() {
        let mut session = GameSession::new(SessionId::new(), OwnerId(1));
        assert_eq!(session.status(), SessionStatus::Waiting);
        session.start().unwrap();
        assert_eq!(session.status(), SessionStatus::Ongoing);
        assert_eq!(
            session.start(),
            Err(GameError::InvalidState(SessionStatus::Ongoing))
        );
    }

    #[test]
    fn begin_twice_is_busy() {
        let mut session = started();
        session.apply_player_move(&MoveRequest::new("e2", "e4")).unwrap();

        session.begin_opponent_move().unwrap();
        assert!(session.is_searching());
        assert_eq!(session.begin_opponent_move(), Err(GameError::Busy));
    }

    #[test]
    fn cancelled_search_leaves_state_alone() {
        let mut session = started();
        session.apply_player_move(&MoveRequest::new("e2", "e4")).unwrap();
        session.begin_opponent_move().unwrap();

        let err = session
            .complete_opponent_move(Err(SearchError::Cancelled))
            .unwrap_err();
        assert_eq!(err, GameError::Cancelled);
        assert_eq!(session.status(), SessionStatus::Ongoing);
        assert_eq!(session.turn(), Turn::Opponent);
        assert!(!session.is_searching());
        assert_eq!(session.history(), ["e4"]);
    }

    #[test]
    fn complete_without_begin_is_rejected() {
        let mut session = started();
        session.apply_player_move(&MoveRequest::new("e2", "e4")).unwrap();
        let err = session
            .complete_opponent_move(Ok("e7e5".into()))
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidState(_)));
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn engine_move_rejected_by_rules_is_fatal() {
        let mut session = started();
        session.apply_player_move(&MoveRequest::new("e2", "e4")).unwrap();
        session.begin_opponent_move().unwrap();

        let err = session
            .complete_opponent_move(Ok("e2e4".into()))
            .unwrap_err();
        assert!(matches!(err, GameError::EngineProtocol(_)));
        assert_eq!(session.status(), SessionStatus::Finished);
        assert!(matches!(
            session.result(),
            Some(GameResult::EngineError { .. })
        ));
    }

    #[test]
    fn snapshot_reflects_history_and_turn() {
        let mut session = started();
        session.apply_player_move(&MoveRequest::new("d2", "d4")).unwrap();
        let snap = session.snapshot();
        assert_eq!(snap.move_history, vec!["d4".to_string()]);
        assert_eq!(snap.turn, Turn::Opponent);
        assert_eq!(snap.status, SessionStatus::Ongoing);
        assert!(snap.result.is_none());
        assert!(snap.fen.contains(" b "));
    }
}
