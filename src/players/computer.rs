//! Computer seat backed by the move advisor.

use super::Player;
use crate::advisor::MoveAdvisor;
use crate::games::gomoku::{Board, Coord, Seat};
use anyhow::Result;
use tracing::debug;

/// Computer player: optional suggester first, heuristic always.
#[derive(Debug, Clone)]
pub struct ComputerPlayer {
    name: String,
    advisor: MoveAdvisor,
}

impl ComputerPlayer {
    /// Creates a computer player using `advisor`.
    pub fn new(name: impl Into<String>, advisor: MoveAdvisor) -> Self {
        Self {
            name: name.into(),
            advisor,
        }
    }
}

#[async_trait::async_trait]
impl Player for ComputerPlayer {
    async fn choose_move(&mut self, board: &Board, seat: Seat) -> Result<Coord> {
        let advice = self
            .advisor
            .choose(board, seat)
            .await
            .ok_or_else(|| anyhow::anyhow!("No valid moves available"))?;
        debug!(player = %self.name, coord = %advice.coord, source = %advice.source, "Computer chose move");
        Ok(advice.coord)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
