//! Game wrapper holding whichever typestate phase is current.

use super::action::{Move, MoveError};
use super::phases::{Outcome, Resolution};
use super::types::{Board, Seat};
use super::typestate::{GameFinished, GameInProgress, GameResult, GameSetup};
use super::WinningLine;
use tracing::{instrument, warn};

/// A game in any phase.
///
/// Typestate phases are distinct types; long-lived owners (a session) keep
/// this enum and swap the phase on every transition.
#[derive(Debug, Clone)]
pub enum AnyGame {
    /// Waiting to start.
    Setup(GameSetup),
    /// Accepting moves.
    InProgress(GameInProgress),
    /// Over.
    Finished(GameFinished),
}

/// What a successfully applied move did to the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// Game continues with `to_move`.
    Continue {
        /// Seat whose turn it now is.
        to_move: Seat,
    },
    /// The move completed a line.
    Won(WinningLine),
    /// The move filled the board.
    Draw,
}

impl From<GameSetup> for AnyGame {
    fn from(game: GameSetup) -> Self {
        AnyGame::Setup(game)
    }
}

impl From<GameInProgress> for AnyGame {
    fn from(game: GameInProgress) -> Self {
        AnyGame::InProgress(game)
    }
}

impl From<GameFinished> for AnyGame {
    fn from(game: GameFinished) -> Self {
        AnyGame::Finished(game)
    }
}

impl From<GameResult> for AnyGame {
    fn from(result: GameResult) -> Self {
        match result {
            GameResult::InProgress(g) => g.into(),
            GameResult::Finished(g) => g.into(),
        }
    }
}

impl AnyGame {
    /// Returns the board for any phase.
    pub fn board(&self) -> &Board {
        match self {
            AnyGame::Setup(game) => game.board(),
            AnyGame::InProgress(game) => game.board(),
            AnyGame::Finished(game) => game.board(),
        }
    }

    /// Returns the move history (empty before the start).
    pub fn history(&self) -> &[Move] {
        match self {
            AnyGame::Setup(_) => &[],
            AnyGame::InProgress(game) => game.history(),
            AnyGame::Finished(game) => game.history(),
        }
    }

    /// Returns the seat to move, if the game is in progress.
    pub fn to_move(&self) -> Option<Seat> {
        match self {
            AnyGame::InProgress(game) => Some(game.to_move()),
            _ => None,
        }
    }

    /// Returns the outcome so far.
    pub fn outcome(&self) -> Outcome {
        match self {
            AnyGame::Finished(game) => game.outcome(),
            _ => Outcome::Unresolved,
        }
    }

    /// Returns how the game ended, if it has.
    pub fn resolution(&self) -> Option<&Resolution> {
        match self {
            AnyGame::Finished(game) => Some(game.resolution()),
            _ => None,
        }
    }

    /// Returns true if the game is over.
    pub fn is_over(&self) -> bool {
        matches!(self, AnyGame::Finished(_))
    }

    /// Moves a setup game into play. No-op in other phases.
    #[instrument(skip(self))]
    pub fn start(&mut self) {
        if let AnyGame::Setup(setup) = self {
            let game = std::mem::take(setup).start();
            *self = AnyGame::InProgress(game);
        }
    }

    /// Applies a move in place.
    ///
    /// Preconditions are checked before anything is touched, so on error the
    /// game is exactly as it was.
    #[instrument(skip(self), fields(mv = %mv))]
    pub fn place(&mut self, mv: Move) -> Result<Progress, MoveError> {
        let game = match self {
            AnyGame::InProgress(game) => game,
            AnyGame::Setup(_) => return Err(MoveError::NotStarted),
            AnyGame::Finished(_) => return Err(MoveError::MatchOver),
        };
        game.check(mv)?;

        // Work on a copy so a failed postcondition leaves `self` untouched
        let (next, progress) = match game.clone().make_move(mv) {
            Ok(GameResult::InProgress(next)) => {
                let to_move = next.to_move();
                (AnyGame::InProgress(next), Progress::Continue { to_move })
            }
            Ok(GameResult::Finished(done)) => {
                let progress = match done.resolution() {
                    Resolution::FiveInARow(line) => Progress::Won(line.clone()),
                    _ => Progress::Draw,
                };
                (AnyGame::Finished(done), progress)
            }
            Err(e) => {
                // Only a postcondition failure can land here after `check`
                warn!(error = %e, "Move rejected after precondition check");
                return Err(e);
            }
        };
        *self = next;
        Ok(progress)
    }

    /// Ends an in-progress game with an off-board resolution.
    #[instrument(skip(self))]
    pub fn conclude(&mut self, resolution: Resolution) -> Result<(), MoveError> {
        match self {
            AnyGame::InProgress(game) => {
                let current = std::mem::replace(game, GameSetup::new().start());
                *self = AnyGame::Finished(current.conclude(resolution));
                Ok(())
            }
            AnyGame::Setup(setup) => {
                let current = std::mem::take(setup).start();
                *self = AnyGame::Finished(current.conclude(resolution));
                Ok(())
            }
            AnyGame::Finished(_) => Err(MoveError::MatchOver),
        }
    }
}
