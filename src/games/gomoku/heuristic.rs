//! Single-ply heuristic move selection.
//!
//! Every empty cell is scored by looking along the four axes through it,
//! once for the mover and once for the opponent, and the best cell wins.
//! There is no lookahead: the engine only asks "what does this one stone
//! make or stop?".

use super::rules::{Direction, WIN_LENGTH};
use super::{Board, Cell, Coord, Seat};
use tracing::{debug, instrument};

/// Mover completes five.
pub const WIN_SCORE: i64 = 1_000_000;
/// Opponent would complete five here next turn.
pub const BLOCK_WIN_SCORE: i64 = 500_000;
/// Mover makes four with at least one open end.
pub const OPEN_FOUR_SCORE: i64 = 100_000;
/// Opponent has four with at least one open end through this cell.
pub const BLOCK_FOUR_SCORE: i64 = 80_000;
/// Opponent has a three open at both ends through this cell.
pub const BLOCK_OPEN_THREE_SCORE: i64 = 50_000;
/// Mover makes a three open at both ends.
pub const OPEN_THREE_SCORE: i64 = 40_000;
/// Per-stone shape bonus for the mover.
pub const MOVER_RUN_WEIGHT: i64 = 100;
/// Per-stone shape bonus for blocking the opponent.
pub const OPPONENT_RUN_WEIGHT: i64 = 50;
/// Centrality bonus ceiling; a cell earns this minus its distance to center.
pub const CENTER_BONUS: i64 = 15;

/// Run through a candidate cell along one axis, for one seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    /// Stones in the run, counting the candidate cell itself.
    pub count: usize,
    /// Ends of the run that finish on an empty cell (0, 1 or 2).
    pub open_ends: usize,
}

/// Measures the run `seat` would have through `cell` along `direction`.
///
/// Each side is walked at most four cells; a side ends open when the walk
/// stops on an empty cell and blocked on the edge or an opposing stone.
pub fn run_through(board: &Board, cell: Coord, direction: Direction, seat: Seat) -> Run {
    let (dr, dc) = direction.step();
    let mut run = Run {
        count: 1,
        open_ends: 0,
    };

    for sign in [1, -1] {
        for distance in 1..WIN_LENGTH as i32 {
            match cell.offset(dr * sign, dc * sign, distance).and_then(|c| board.get(c)) {
                Some(Cell::Occupied(owner)) if owner == seat => run.count += 1,
                Some(Cell::Empty) => {
                    run.open_ends += 1;
                    break;
                }
                _ => break,
            }
        }
    }

    run
}

/// Scores an empty cell for `mover`.
pub fn score_cell(board: &Board, cell: Coord, mover: Seat) -> i64 {
    let opponent = mover.opponent();
    let mut score = 0;

    for direction in Direction::all() {
        let mine = run_through(board, cell, direction, mover);
        let theirs = run_through(board, cell, direction, opponent);

        if mine.count >= WIN_LENGTH {
            score += WIN_SCORE;
        }
        if theirs.count >= WIN_LENGTH {
            score += BLOCK_WIN_SCORE;
        }
        if mine.count == 4 && mine.open_ends >= 1 {
            score += OPEN_FOUR_SCORE;
        }
        if theirs.count == 4 && theirs.open_ends >= 1 {
            score += BLOCK_FOUR_SCORE;
        }
        if theirs.count == 3 && theirs.open_ends == 2 {
            score += BLOCK_OPEN_THREE_SCORE;
        }
        if mine.count == 3 && mine.open_ends == 2 {
            score += OPEN_THREE_SCORE;
        }

        score += MOVER_RUN_WEIGHT * mine.count as i64 + OPPONENT_RUN_WEIGHT * theirs.count as i64;
    }

    score + CENTER_BONUS - cell.distance_to_center() as i64
}

/// Picks the best cell for `mover`.
///
/// Returns `None` only for a full board. Ties keep the first cell found in
/// row-major order.
#[instrument(skip(board), fields(mover = %mover))]
pub fn select_move(board: &Board, mover: Seat) -> Option<Coord> {
    let mut best: Option<(Coord, i64)> = None;

    for cell in board.empty_cells() {
        let score = score_cell(board, cell, mover);
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((cell, score));
        }
    }

    if let Some((cell, score)) = best {
        debug!(%cell, score, "Heuristic move selected");
    }
    best.map(|(cell, _)| cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::gomoku::Move;

    fn board_with(stones: &[(Seat, u8, u8)]) -> Board {
        let mut board = Board::new();
        for &(seat, row, col) in stones {
            board.place(Move::at(seat, row, col)).expect("legal");
        }
        board
    }

    #[test]
    fn test_empty_board_prefers_center() {
        assert_eq!(select_move(&Board::new(), Seat::A), Some(Coord::new(7, 7)));
    }

    #[test]
    fn test_takes_unique_win() {
        // A has four on row 3 with the left end blocked by B
        let board = board_with(&[
            (Seat::B, 3, 1),
            (Seat::A, 3, 2),
            (Seat::A, 3, 3),
            (Seat::A, 3, 4),
            (Seat::A, 3, 5),
            (Seat::B, 10, 10),
            (Seat::B, 12, 3),
        ]);
        assert_eq!(select_move(&board, Seat::A), Some(Coord::new(3, 6)));
    }

    #[test]
    fn test_blocks_open_four() {
        let board = board_with(&[
            (Seat::A, 7, 5),
            (Seat::A, 7, 6),
            (Seat::A, 7, 7),
            (Seat::A, 7, 8),
            (Seat::B, 0, 0),
            (Seat::B, 14, 14),
        ]);
        let choice = select_move(&board, Seat::B).expect("move");
        assert!(
            choice == Coord::new(7, 4) || choice == Coord::new(7, 9),
            "expected a block, got {}",
            choice
        );
    }

    #[test]
    fn test_prefers_win_over_block() {
        let board = board_with(&[
            (Seat::A, 2, 2),
            (Seat::A, 2, 3),
            (Seat::A, 2, 4),
            (Seat::A, 2, 5),
            (Seat::B, 9, 2),
            (Seat::B, 9, 3),
            (Seat::B, 9, 4),
            (Seat::B, 9, 5),
        ]);
        let choice = select_move(&board, Seat::B).expect("move");
        assert!(choice == Coord::new(9, 1) || choice == Coord::new(9, 6));
    }

    #[test]
    fn test_run_through_counts_open_ends() {
        let board = board_with(&[(Seat::A, 5, 5), (Seat::A, 5, 6), (Seat::B, 5, 8)]);
        let run = run_through(&board, Coord::new(5, 7), Direction::Horizontal, Seat::A);
        assert_eq!(run, Run { count: 3, open_ends: 1 });
    }

    #[test]
    fn test_never_picks_occupied_cell() {
        // Deterministic pseudo-random fill levels
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        for round in 0..40 {
            let mut board = Board::new();
            let mut seat = Seat::A;
            let stones = 20 + round * 5;
            let mut placed = 0;
            while placed < stones {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                let coord = Coord::new((state % 15) as u8, ((state >> 8) % 15) as u8);
                if board.place(Move::new(seat, coord)).is_ok() {
                    seat = seat.opponent();
                    placed += 1;
                }
            }
            let choice = select_move(&board, seat).expect("board not full");
            assert!(board.is_empty(choice), "round {} picked occupied {}", round, choice);
        }
    }

    #[test]
    fn test_full_board_returns_none() {
        let mut board = Board::new();
        for coord in Board::coords() {
            board
                .place(Move::new(crate::games::gomoku::rules::draw::tests::drawn_pattern(coord), coord))
                .expect("legal");
        }
        assert_eq!(select_move(&board, Seat::A), None);
    }
}
