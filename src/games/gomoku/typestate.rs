//! Phase-specific typestate structs for five-in-a-row.
//!
//! Each phase is its own type with phase-specific fields. A `GameFinished`
//! ALWAYS has a resolution, not `Option<Resolution>`.

use super::action::{Move, MoveError};
#[cfg(debug_assertions)]
use super::invariants::{GomokuInvariants, InvariantSet};
use super::phases::{Outcome, Resolution};
use super::rules::{detect_win, is_full};
use super::{Board, Cell, Coord, Seat};
use tracing::{debug, instrument};

// ─────────────────────────────────────────────────────────────
//  Setup Phase
// ─────────────────────────────────────────────────────────────

/// Game in setup phase - board chosen, nobody has moved in this game yet.
#[derive(Debug, Clone)]
pub struct GameSetup {
    board: Board,
    to_move: Seat,
}

impl GameSetup {
    /// Creates a new game on an empty board.
    pub fn new() -> Self {
        Self {
            board: Board::new(),
            to_move: Seat::A,
        }
    }

    /// Creates a game starting from an arbitrary position.
    ///
    /// The side to move is derived from the stone counts; positions that
    /// could not arise from alternating play are rejected.
    #[instrument(skip(board))]
    pub fn from_position(board: Board) -> Result<Self, MoveError> {
        let a = board.stone_count(Seat::A);
        let b = board.stone_count(Seat::B);
        let to_move = if a == b {
            Seat::A
        } else if a == b + 1 {
            Seat::B
        } else {
            return Err(MoveError::InvariantViolation(format!(
                "Starting position has {} A stones and {} B stones",
                a, b
            )));
        };
        if is_full(&board) {
            return Err(MoveError::MatchOver);
        }
        Ok(Self { board, to_move })
    }

    /// Returns the board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Starts the game (consumes setup, returns in-progress).
    #[instrument(skip(self))]
    pub fn start(self) -> GameInProgress {
        GameInProgress {
            initial: self.board.clone(),
            board: self.board,
            history: Vec::new(),
            to_move: self.to_move,
        }
    }
}

impl Default for GameSetup {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────
//  InProgress Phase
// ─────────────────────────────────────────────────────────────

/// Game in progress - can accept moves.
#[derive(Debug, Clone)]
pub struct GameInProgress {
    pub(crate) initial: Board,
    pub(crate) board: Board,
    pub(crate) history: Vec<Move>,
    pub(crate) to_move: Seat,
}

impl GameInProgress {
    /// Checks a move's preconditions without consuming the game.
    ///
    /// - the cell must be on the board
    /// - the cell must be empty
    /// - it must be the seat's turn
    pub fn check(&self, mv: Move) -> Result<(), MoveError> {
        match self.board.get(mv.coord) {
            None => return Err(MoveError::OutOfRange(mv.coord)),
            Some(Cell::Occupied(_)) => return Err(MoveError::CellOccupied(mv.coord)),
            Some(Cell::Empty) => {}
        }
        if mv.seat != self.to_move {
            return Err(MoveError::WrongTurn(mv.seat));
        }
        Ok(())
    }

    /// Makes a move, consuming self and transitioning to the next state.
    ///
    /// Preconditions are always checked; postconditions (board invariants)
    /// in debug builds only.
    #[instrument(skip(self), fields(mv = %mv))]
    pub fn make_move(self, mv: Move) -> Result<GameResult, MoveError> {
        self.check(mv)?;

        let mut game = self;
        game.board.set(mv.coord, Cell::Occupied(mv.seat));
        game.history.push(mv);

        if let Some(line) = detect_win(&game.board, mv) {
            return Ok(GameResult::Finished(game.conclude(Resolution::FiveInARow(line))));
        }

        if is_full(&game.board) {
            debug!("Board full without a five");
            return Ok(GameResult::Finished(game.conclude(Resolution::BoardFull)));
        }

        game.to_move = game.to_move.opponent();

        #[cfg(debug_assertions)]
        GomokuInvariants::check_all(&game).map_err(|violations| {
            let descriptions = violations
                .iter()
                .map(|v| v.description.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            MoveError::InvariantViolation(format!("Postcondition failed: {}", descriptions))
        })?;

        Ok(GameResult::InProgress(game))
    }

    /// Ends the game off the board (surrender, forfeit, desync).
    #[instrument(skip(self))]
    pub fn conclude(self, resolution: Resolution) -> GameFinished {
        GameFinished {
            initial: self.initial,
            board: self.board,
            history: self.history,
            resolution,
        }
    }

    /// Returns the seat to move.
    pub fn to_move(&self) -> Seat {
        self.to_move
    }

    /// Returns the board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Returns the board the game started from.
    pub fn initial_board(&self) -> &Board {
        &self.initial
    }

    /// Returns move history.
    pub fn history(&self) -> &[Move] {
        &self.history
    }

    /// Returns the empty cells in row-major order.
    pub fn valid_moves(&self) -> Vec<Coord> {
        self.board.empty_cells().collect()
    }

    /// Replays moves from a starting position.
    #[instrument(skip(initial, moves), fields(moves = moves.len()))]
    pub fn replay(initial: Board, moves: &[Move]) -> Result<GameResult, MoveError> {
        let mut game = GameSetup::from_position(initial)?.start();

        for (index, mv) in moves.iter().enumerate() {
            match game.make_move(*mv)? {
                GameResult::InProgress(next) => game = next,
                GameResult::Finished(done) if index + 1 == moves.len() => {
                    return Ok(GameResult::Finished(done));
                }
                GameResult::Finished(_) => return Err(MoveError::MatchOver),
            }
        }

        Ok(GameResult::InProgress(game))
    }
}

// ─────────────────────────────────────────────────────────────
//  Finished Phase
// ─────────────────────────────────────────────────────────────

/// Game finished - resolution determined.
#[derive(Debug, Clone)]
pub struct GameFinished {
    initial: Board,
    board: Board,
    history: Vec<Move>,
    resolution: Resolution,
}

impl GameFinished {
    /// Returns how the game ended.
    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    /// Returns the outcome.
    pub fn outcome(&self) -> Outcome {
        self.resolution.outcome()
    }

    /// Returns the board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Returns the board the game started from.
    pub fn initial_board(&self) -> &Board {
        &self.initial
    }

    /// Returns move history.
    pub fn history(&self) -> &[Move] {
        &self.history
    }
}

// ─────────────────────────────────────────────────────────────
//  Result Type
// ─────────────────────────────────────────────────────────────

/// Result of making a move.
#[derive(Debug)]
pub enum GameResult {
    /// Game continues.
    InProgress(GameInProgress),
    /// Game finished.
    Finished(GameFinished),
}
