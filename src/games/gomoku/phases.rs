//! Outcome types for a finished (or unfinished) game.

use super::{Seat, WinningLine};
use serde::{Deserialize, Serialize};

/// Result of a match, as a tagged variant rather than a nullable mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Outcome {
    /// No result yet.
    #[default]
    Unresolved,
    /// The seat won the match.
    WonBy(Seat),
    /// The board filled up without a five.
    Draw,
    /// The match was thrown away (peers diverged); wagers are refunded.
    Abandoned,
}

impl Outcome {
    /// Returns the winner if there is one.
    pub fn winner(&self) -> Option<Seat> {
        match self {
            Outcome::WonBy(seat) => Some(*seat),
            _ => None,
        }
    }

    /// Returns true once the outcome is final.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Outcome::Unresolved)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Unresolved => write!(f, "In progress"),
            Outcome::WonBy(seat) => write!(f, "Seat {} wins", seat),
            Outcome::Draw => write!(f, "Draw"),
            Outcome::Abandoned => write!(f, "Abandoned"),
        }
    }
}

/// How a match reached its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// A move completed a line of five.
    FiveInARow(WinningLine),
    /// The last empty cell was filled without a five.
    BoardFull,
    /// The seat conceded.
    Surrender(Seat),
    /// The seat left a peer match.
    Forfeit(Seat),
    /// The two peers' sessions diverged.
    Desync,
}

impl Resolution {
    /// The outcome implied by this resolution.
    pub fn outcome(&self) -> Outcome {
        match self {
            Resolution::FiveInARow(line) => Outcome::WonBy(line.seat()),
            Resolution::BoardFull => Outcome::Draw,
            Resolution::Surrender(seat) | Resolution::Forfeit(seat) => {
                Outcome::WonBy(seat.opponent())
            }
            Resolution::Desync => Outcome::Abandoned,
        }
    }

    /// The winning line, when the match ended on the board.
    pub fn winning_line(&self) -> Option<&WinningLine> {
        match self {
            Resolution::FiveInARow(line) => Some(line),
            _ => None,
        }
    }
}
