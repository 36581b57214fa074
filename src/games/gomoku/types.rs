//! Core domain types for five-in-a-row.

use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Side length of the board.
pub const BOARD_SIZE: usize = 15;

/// Index of the central row and column.
pub const CENTER: u8 = (BOARD_SIZE / 2) as u8;

/// A seat in a match. Seat A always moves first.
///
/// The seat doubles as the mark a player places on the board, so there is
/// exactly one enum for "who" in the whole engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, strum::EnumIter,
)]
pub enum Seat {
    /// First seat (plays `X`).
    A,
    /// Second seat (plays `O`).
    B,
}

impl Seat {
    /// Returns the opposing seat.
    pub fn opponent(self) -> Self {
        match self {
            Seat::A => Seat::B,
            Seat::B => Seat::A,
        }
    }

    /// Symbol used when rendering the board.
    pub fn symbol(self) -> char {
        match self {
            Seat::A => 'X',
            Seat::B => 'O',
        }
    }

    /// Parses a rendered symbol back into a seat.
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol.to_ascii_uppercase() {
            'X' => Some(Seat::A),
            'O' => Some(Seat::B),
            _ => None,
        }
    }
}

impl std::fmt::Display for Seat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A cell on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Cell {
    /// Nobody has played here.
    #[default]
    Empty,
    /// Cell holds a seat's mark.
    Occupied(Seat),
}

impl Cell {
    /// Returns the seat occupying this cell, if any.
    pub fn seat(self) -> Option<Seat> {
        match self {
            Cell::Empty => None,
            Cell::Occupied(seat) => Some(seat),
        }
    }
}

/// A board coordinate. Both components are in `0..BOARD_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    /// Row index, top to bottom.
    pub row: u8,
    /// Column index, left to right.
    pub col: u8,
}

impl Coord {
    /// Creates a coordinate without range checking.
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    /// Creates a coordinate from signed components, rejecting anything off the board.
    pub fn checked(row: i32, col: i32) -> Option<Self> {
        let size = BOARD_SIZE as i32;
        if (0..size).contains(&row) && (0..size).contains(&col) {
            Some(Self::new(row as u8, col as u8))
        } else {
            None
        }
    }

    /// Returns true if both components are on the board.
    pub fn in_bounds(self) -> bool {
        (self.row as usize) < BOARD_SIZE && (self.col as usize) < BOARD_SIZE
    }

    /// Steps `distance` cells along `(dr, dc)`.
    pub fn offset(self, dr: i32, dc: i32, distance: i32) -> Option<Self> {
        Self::checked(
            self.row as i32 + dr * distance,
            self.col as i32 + dc * distance,
        )
    }

    /// Manhattan distance to the board center.
    pub fn distance_to_center(self) -> u32 {
        (self.row as i32 - CENTER as i32).unsigned_abs()
            + (self.col as i32 - CENTER as i32).unsigned_abs()
    }

    fn index(self) -> usize {
        self.row as usize * BOARD_SIZE + self.col as usize
    }

    /// Parses `"r c"` or `"r,c"` input.
    pub fn parse(input: &str) -> Option<Self> {
        let mut parts = input
            .split(|ch: char| ch == ',' || ch.is_whitespace())
            .filter(|part| !part.is_empty());
        let row = parts.next()?.parse::<i32>().ok()?;
        let col = parts.next()?.parse::<i32>().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Self::checked(row, col)
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// 15x15 board stored row-major.
///
/// Serialized as one string per row (`.`, `X`, `O`) so it stays readable on
/// the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<String>", try_from = "Vec<String>")]
pub struct Board {
    cells: Vec<Cell>,
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self {
            cells: vec![Cell::Empty; BOARD_SIZE * BOARD_SIZE],
        }
    }

    /// Returns the cell at `coord`, or `None` when off the board.
    pub fn get(&self, coord: Coord) -> Option<Cell> {
        if coord.in_bounds() {
            self.cells.get(coord.index()).copied()
        } else {
            None
        }
    }

    /// Returns the seat occupying `coord`, if any.
    pub fn seat_at(&self, coord: Coord) -> Option<Seat> {
        self.get(coord).and_then(Cell::seat)
    }

    /// Checks whether `coord` is on the board and empty.
    pub fn is_empty(&self, coord: Coord) -> bool {
        matches!(self.get(coord), Some(Cell::Empty))
    }

    /// Writes a cell without any rule checks.
    ///
    /// Out of range coordinates are ignored. Game code goes through
    /// [`Board::apply_move`] or the typestate game instead.
    pub(crate) fn set(&mut self, coord: Coord, cell: Cell) {
        if coord.in_bounds() {
            let index = coord.index();
            self.cells[index] = cell;
        }
    }

    /// True when no empty cell remains.
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|cell| *cell != Cell::Empty)
    }

    /// Number of stones `seat` has on the board.
    pub fn stone_count(&self, seat: Seat) -> usize {
        self.cells
            .iter()
            .filter(|cell| **cell == Cell::Occupied(seat))
            .count()
    }

    /// Iterates over all coordinates in row-major order.
    pub fn coords() -> impl Iterator<Item = Coord> {
        (0..BOARD_SIZE as u8).flat_map(|row| (0..BOARD_SIZE as u8).map(move |col| Coord::new(row, col)))
    }

    /// Iterates over the empty coordinates in row-major order.
    pub fn empty_cells(&self) -> impl Iterator<Item = Coord> + '_ {
        Self::coords().filter(move |coord| self.is_empty(*coord))
    }

    /// Formats the board with row and column indices.
    #[instrument(skip(self))]
    pub fn render(&self) -> String {
        let header: String = (0..BOARD_SIZE)
            .map(|col| format!("{:>3}", col))
            .collect();
        let mut out = format!("   {}\n", header);
        for row in 0..BOARD_SIZE {
            out.push_str(&format!("{:>2} ", row));
            for col in 0..BOARD_SIZE {
                let symbol = match self.cells[row * BOARD_SIZE + col] {
                    Cell::Empty => '.',
                    Cell::Occupied(seat) => seat.symbol(),
                };
                out.push_str(&format!("{:>3}", symbol));
            }
            out.push('\n');
        }
        out
    }

    /// Parses the compact row format produced by serialization.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Self, BoardParseError> {
        if rows.len() != BOARD_SIZE {
            return Err(BoardParseError::RowCount(rows.len()));
        }
        let mut board = Self::new();
        for (row, line) in rows.iter().enumerate() {
            let symbols: Vec<char> = line.as_ref().chars().collect();
            if symbols.len() != BOARD_SIZE {
                return Err(BoardParseError::RowWidth { row, width: symbols.len() });
            }
            for (col, symbol) in symbols.into_iter().enumerate() {
                let cell = match symbol {
                    '.' => Cell::Empty,
                    other => Seat::from_symbol(other)
                        .map(Cell::Occupied)
                        .ok_or(BoardParseError::Symbol(other))?,
                };
                board.set(Coord::new(row as u8, col as u8), cell);
            }
        }
        Ok(board)
    }

    /// Compact row representation (`.`, `X`, `O`).
    pub fn to_rows(&self) -> Vec<String> {
        self.cells
            .chunks(BOARD_SIZE)
            .map(|row| {
                row.iter()
                    .map(|cell| match cell {
                        Cell::Empty => '.',
                        Cell::Occupied(seat) => seat.symbol(),
                    })
                    .collect()
            })
            .collect()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl From<Board> for Vec<String> {
    fn from(board: Board) -> Self {
        board.to_rows()
    }
}

impl TryFrom<Vec<String>> for Board {
    type Error = BoardParseError;

    fn try_from(rows: Vec<String>) -> Result<Self, Self::Error> {
        Board::from_rows(&rows)
    }
}

/// Error parsing a board from its row representation.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum BoardParseError {
    /// Wrong number of rows.
    #[display("Expected {} rows, got {}", BOARD_SIZE, _0)]
    RowCount(usize),
    /// A row has the wrong width.
    #[display("Row {} has {} cells, expected {}", row, width, BOARD_SIZE)]
    RowWidth {
        /// Offending row.
        row: usize,
        /// Width found.
        width: usize,
    },
    /// Unknown cell symbol.
    #[display("Unknown cell symbol {:?}", _0)]
    Symbol(char),
}

impl std::error::Error for BoardParseError {}
