//! Monotonic board invariant: cells never change once set.

use super::super::{Cell, GameInProgress};
use super::Invariant;

/// Invariant: a cell, once occupied, is never overwritten.
///
/// Verified by replaying the move history onto the starting board and
/// comparing with the current board.
pub struct MonotonicBoardInvariant;

impl Invariant<GameInProgress> for MonotonicBoardInvariant {
    fn holds(game: &GameInProgress) -> bool {
        let mut reconstructed = game.initial_board().clone();

        for mv in game.history() {
            if reconstructed.get(mv.coord) != Some(Cell::Empty) {
                return false;
            }
            reconstructed.set(mv.coord, Cell::Occupied(mv.seat));
        }

        reconstructed == *game.board()
    }

    fn description() -> &'static str {
        "Board cells are monotonic (never overwritten)"
    }
}
