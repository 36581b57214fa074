//! Five-in-a-row on a 15x15 board.

mod action;
pub mod heuristic;
mod invariants;
mod phases;
pub mod rules;
mod types;
mod typestate;
mod wrapper;

pub use action::{Move, MoveError};
pub use heuristic::select_move;
pub use invariants::{
    AlternatingTurnInvariant, GomokuInvariants, Invariant, InvariantSet, InvariantViolation,
    MonotonicBoardInvariant,
};
pub use phases::{Outcome, Resolution};
pub use rules::{Direction, WinningLine, detect_win, is_full};
pub use types::{BOARD_SIZE, Board, BoardParseError, CENTER, Cell, Coord, Seat};
pub use typestate::{GameFinished, GameInProgress, GameResult, GameSetup};
pub use wrapper::{AnyGame, Progress};

/// Alias for clarity where a seat is used as the mark on a cell.
pub type Mark = Seat;
