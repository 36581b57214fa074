//! Chooses the computer seat's move.
//!
//! The optional suggester gets one bounded attempt; anything other than a
//! playable cell in time falls back to the heuristic engine.

use crate::config::AdvisorSettings;
use crate::games::gomoku::{Board, Coord, Seat, select_move};
use crate::suggestion::{MoveSuggester, SuggestionError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Where the chosen move came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum AdviceSource {
    /// The external suggester.
    #[display("suggester")]
    Suggester,
    /// The built-in heuristic.
    #[display("heuristic")]
    Heuristic,
}

/// A chosen move and its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advice {
    /// Cell to play.
    pub coord: Coord,
    /// Who picked it.
    pub source: AdviceSource,
}

/// Move chooser for the computer seat.
#[derive(Debug, Clone)]
pub struct MoveAdvisor {
    suggester: Option<Arc<dyn MoveSuggester>>,
    timeout: Duration,
    thinking_delay: Duration,
}

impl Default for MoveAdvisor {
    fn default() -> Self {
        Self::heuristic_only()
    }
}

impl MoveAdvisor {
    /// Advisor that never consults a suggester and answers immediately.
    pub fn heuristic_only() -> Self {
        Self {
            suggester: None,
            timeout: Duration::ZERO,
            thinking_delay: Duration::ZERO,
        }
    }

    /// Builds an advisor from settings and an optional suggester.
    pub fn from_settings(settings: &AdvisorSettings, suggester: Option<Arc<dyn MoveSuggester>>) -> Self {
        Self {
            suggester,
            timeout: settings.suggestion_timeout(),
            thinking_delay: settings.thinking_delay(),
        }
    }

    /// Attaches a suggester with its timeout.
    pub fn with_suggester(mut self, suggester: Arc<dyn MoveSuggester>, timeout: Duration) -> Self {
        self.suggester = Some(suggester);
        self.timeout = timeout;
        self
    }

    /// Sets the pause taken before a heuristic answer.
    pub fn with_thinking_delay(mut self, delay: Duration) -> Self {
        self.thinking_delay = delay;
        self
    }

    /// Chooses a move for `mover`. `None` only on a full board.
    #[instrument(skip(self, board), fields(mover = %mover))]
    pub async fn choose(&self, board: &Board, mover: Seat) -> Option<Advice> {
        if let Some(suggester) = &self.suggester {
            match self.ask(suggester.as_ref(), board, mover).await {
                Ok(coord) => {
                    info!(%coord, suggester = suggester.name(), "Using suggested move");
                    return Some(Advice {
                        coord,
                        source: AdviceSource::Suggester,
                    });
                }
                Err(e) => warn!(error = %e, "Suggestion unavailable, using heuristic"),
            }
        }

        if !self.thinking_delay.is_zero() {
            tokio::time::sleep(self.thinking_delay).await;
        }

        let coord = select_move(board, mover)?;
        debug!(%coord, "Using heuristic move");
        Some(Advice {
            coord,
            source: AdviceSource::Heuristic,
        })
    }

    async fn ask(
        &self,
        suggester: &dyn MoveSuggester,
        board: &Board,
        mover: Seat,
    ) -> Result<Coord, SuggestionError> {
        let coord = tokio::time::timeout(self.timeout, suggester.suggest(board, mover))
            .await
            .map_err(|_| SuggestionError::TimedOut)??;
        if !board.is_empty(coord) {
            return Err(SuggestionError::Unplayable(coord));
        }
        Ok(coord)
    }
}
