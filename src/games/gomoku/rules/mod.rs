//! Game rules for five-in-a-row.
//!
//! Pure functions over the board, kept apart from board storage so the
//! typestate game, the session and the heuristic all share them.

pub mod draw;
pub mod win;

pub use draw::is_full;
pub use win::{Direction, WIN_LENGTH, WinningLine, detect_win};
