//! First-class action types for five-in-a-row.
//!
//! Moves are domain events, not side effects. The same `Move` value is
//! applied locally, relayed to a remote peer and replayed from a log.

use super::{Board, Cell, Coord, Seat};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// A seat placing its mark on a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    /// The seat making the move.
    pub seat: Seat,
    /// Target cell.
    pub coord: Coord,
}

impl Move {
    /// Creates a new move.
    pub fn new(seat: Seat, coord: Coord) -> Self {
        Self { seat, coord }
    }

    /// Convenience constructor from raw row/column.
    pub fn at(seat: Seat, row: u8, col: u8) -> Self {
        Self::new(seat, Coord::new(row, col))
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.seat, self.coord)
    }
}

/// Error raised when a move is illegal.
///
/// Illegal moves never change state; the caller may retry with another cell.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum MoveError {
    /// The coordinate is off the board.
    #[display("Cell {} is off the board", _0)]
    OutOfRange(Coord),

    /// The cell already holds a mark.
    #[display("Cell {} is already occupied", _0)]
    CellOccupied(Coord),

    /// It is not this seat's turn.
    #[display("It's not {}'s turn", _0)]
    WrongTurn(Seat),

    /// The match has no game in progress yet.
    #[display("The match has not started")]
    NotStarted,

    /// The match is already resolved.
    #[display("The match is already over")]
    MatchOver,

    /// An invariant was violated (postcondition failure).
    #[display("Invariant violation: {}", _0)]
    InvariantViolation(String),
}

impl std::error::Error for MoveError {}

impl Board {
    /// Places a move on this board, checking range and occupancy.
    #[instrument(skip(self), fields(mv = %mv))]
    pub fn place(&mut self, mv: Move) -> Result<(), MoveError> {
        match self.get(mv.coord) {
            None => Err(MoveError::OutOfRange(mv.coord)),
            Some(Cell::Occupied(_)) => Err(MoveError::CellOccupied(mv.coord)),
            Some(Cell::Empty) => {
                self.set(mv.coord, Cell::Occupied(mv.seat));
                Ok(())
            }
        }
    }

    /// Returns a new board with `mv` applied, leaving `self` untouched.
    pub fn apply_move(&self, mv: Move) -> Result<Board, MoveError> {
        let mut next = self.clone();
        next.place(mv)?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_move_leaves_original() {
        let board = Board::new();
        let next = board.apply_move(Move::at(Seat::A, 7, 7)).expect("legal");
        assert!(board.is_empty(Coord::new(7, 7)));
        assert_eq!(next.seat_at(Coord::new(7, 7)), Some(Seat::A));
    }

    #[test]
    fn test_occupied_rejected() {
        let board = Board::new().apply_move(Move::at(Seat::A, 3, 3)).expect("legal");
        assert_eq!(
            board.apply_move(Move::at(Seat::B, 3, 3)),
            Err(MoveError::CellOccupied(Coord::new(3, 3)))
        );
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut board = Board::new();
        assert_eq!(
            board.place(Move::at(Seat::A, 15, 2)),
            Err(MoveError::OutOfRange(Coord::new(15, 2)))
        );
        assert_eq!(board, Board::new());
    }
}
