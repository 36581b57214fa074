//! Win detection for five-in-a-row.
//!
//! Only the four axis lines through the last placed stone are examined: a
//! new five can only ever contain the stone that was just played.

use super::super::{Board, Coord, Move, Seat};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use tracing::{debug, instrument};

/// Stones needed in a row to win. Longer lines also win.
pub const WIN_LENGTH: usize = 5;

/// The four axes a line can run along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumIter)]
pub enum Direction {
    /// Left to right.
    Horizontal,
    /// Top to bottom.
    Vertical,
    /// Top-left to bottom-right.
    Diagonal,
    /// Top-right to bottom-left.
    AntiDiagonal,
}

impl Direction {
    /// Unit step `(dr, dc)` for the positive sign of this axis.
    pub fn step(self) -> (i32, i32) {
        match self {
            Direction::Horizontal => (0, 1),
            Direction::Vertical => (1, 0),
            Direction::Diagonal => (1, 1),
            Direction::AntiDiagonal => (1, -1),
        }
    }

    /// All four axes in scan order.
    pub fn all() -> impl Iterator<Item = Direction> {
        Direction::iter()
    }
}

/// A completed line of exactly five coordinates.
///
/// The anchor (last move) comes first, followed by the cells found walking
/// the positive sign and then the negative sign.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WinningLine {
    seat: Seat,
    direction: Direction,
    cells: Vec<Coord>,
}

impl WinningLine {
    /// Seat that owns the line.
    pub fn seat(&self) -> Seat {
        self.seat
    }

    /// Axis the line runs along.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The five coordinates, in discovery order.
    pub fn cells(&self) -> &[Coord] {
        &self.cells
    }

    /// Returns true if `coord` is part of the line.
    pub fn contains(&self, coord: Coord) -> bool {
        self.cells.contains(&coord)
    }
}

/// Walks from `anchor` along `(dr, dc)` collecting contiguous `seat` stones.
fn walk(board: &Board, anchor: Coord, (dr, dc): (i32, i32), seat: Seat) -> Vec<Coord> {
    (1..WIN_LENGTH as i32)
        .map_while(|distance| anchor.offset(dr, dc, distance))
        .take_while(|coord| board.seat_at(*coord) == Some(seat))
        .collect()
}

/// Checks whether the move just applied to `board` completed a line.
///
/// Returns the five cells nearest the last move when a run of five or more
/// passes through it. Returns `None` if the move's cell doesn't hold the
/// move's seat.
#[instrument(skip(board), fields(last_move = %last_move))]
pub fn detect_win(board: &Board, last_move: Move) -> Option<WinningLine> {
    let anchor = last_move.coord;
    let seat = board.seat_at(anchor)?;
    if seat != last_move.seat {
        return None;
    }

    for direction in Direction::all() {
        let (dr, dc) = direction.step();
        let forward = walk(board, anchor, (dr, dc), seat);
        let backward = walk(board, anchor, (-dr, -dc), seat);

        if 1 + forward.len() + backward.len() < WIN_LENGTH {
            continue;
        }

        // Take the four nearest neighbours, alternating sides by distance.
        let (mut take_forward, mut take_backward) = (0, 0);
        let mut distance = 1;
        while take_forward + take_backward < WIN_LENGTH - 1 {
            if distance <= forward.len() {
                take_forward += 1;
            }
            if take_forward + take_backward < WIN_LENGTH - 1 && distance <= backward.len() {
                take_backward += 1;
            }
            distance += 1;
        }

        let mut cells = Vec::with_capacity(WIN_LENGTH);
        cells.push(anchor);
        cells.extend_from_slice(&forward[..take_forward]);
        cells.extend_from_slice(&backward[..take_backward]);

        debug!(?direction, seat = %seat, "Five in a row");
        return Some(WinningLine {
            seat,
            direction,
            cells,
        });
    }

    None
}
