//! Human player fed by lines of text input.

use super::Player;
use crate::games::gomoku::{Board, Coord, Seat};
use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Human player reading `"row col"` lines from an input channel.
///
/// Unreadable or occupied cells are skipped and the next line is read.
#[derive(Debug)]
pub struct HumanPlayer {
    name: String,
    input_rx: mpsc::UnboundedReceiver<String>,
}

impl HumanPlayer {
    /// Creates a new human player.
    pub fn new(name: impl Into<String>, input_rx: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            name: name.into(),
            input_rx,
        }
    }
}

#[async_trait::async_trait]
impl Player for HumanPlayer {
    async fn choose_move(&mut self, board: &Board, seat: Seat) -> Result<Coord> {
        while let Some(line) = self.input_rx.recv().await {
            let line = line.trim();
            if line.eq_ignore_ascii_case("q") || line.eq_ignore_ascii_case("quit") {
                anyhow::bail!("{} quit", self.name);
            }
            match Coord::parse(line) {
                Some(coord) if board.is_empty(coord) => {
                    debug!(player = %self.name, %seat, %coord, "Human chose move");
                    return Ok(coord);
                }
                Some(coord) => warn!(%coord, "Cell already taken"),
                None => warn!(input = %line, "Expected \"row col\" with both in 0..15"),
            }
        }

        anyhow::bail!("Input channel closed")
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::gomoku::Move;

    #[tokio::test]
    async fn test_skips_bad_input() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut player = HumanPlayer::new("tester", rx);
        let board = Board::new().apply_move(Move::at(Seat::A, 7, 7)).expect("legal");

        for line in ["hello", "7 7", "20 1", " 3, 4 "] {
            tx.send(line.to_string()).expect("send");
        }
        let coord = player.choose_move(&board, Seat::B).await.expect("move");
        assert_eq!(coord, Coord::new(3, 4));
    }

    #[tokio::test]
    async fn test_quit() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut player = HumanPlayer::new("tester", rx);
        tx.send("q".to_string()).expect("send");
        assert!(player.choose_move(&Board::new(), Seat::A).await.is_err());
    }
}
