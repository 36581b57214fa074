//! Draw detection for five-in-a-row.

use super::super::Board;
use tracing::instrument;

/// Checks if the board is full (no empty cell left).
///
/// Win detection runs first on every move, so a full board reached by a
/// move that did not complete a line is a draw.
#[instrument(skip(board))]
pub fn is_full(board: &Board) -> bool {
    board.is_full()
}
