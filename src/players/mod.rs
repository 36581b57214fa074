//! Seats that pick moves: a human on an input channel or the computer.

mod computer;
mod human;

pub use computer::ComputerPlayer;
pub use human::HumanPlayer;

use crate::games::gomoku::{Board, Coord, Seat};
use anyhow::Result;

/// Anything that can choose a move for a seat.
#[async_trait::async_trait]
pub trait Player: Send {
    /// Chooses an empty cell on `board` for `seat`.
    async fn choose_move(&mut self, board: &Board, seat: Seat) -> Result<Coord>;

    /// Returns the player's display name.
    fn name(&self) -> &str;
}
