//! External move suggestions.
//!
//! A suggester is allowed to be slow, wrong or offline; callers never
//! trust its answer without checking it against the board.

use crate::games::gomoku::{Board, Coord, Seat};
use crate::llm_client::{LlmClient, LlmError};
use async_trait::async_trait;
use derive_more::Display;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

/// Source of suggested moves.
#[async_trait]
pub trait MoveSuggester: Send + Sync + std::fmt::Debug {
    /// Suggests a cell for `mover` on `board`.
    async fn suggest(&self, board: &Board, mover: Seat) -> Result<Coord, SuggestionError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Why a suggestion could not be used.
#[derive(Debug, Clone, Display)]
pub enum SuggestionError {
    /// The backing service failed.
    #[display("Suggestion service failed: {}", _0)]
    Service(LlmError),

    /// The reply could not be read as a coordinate.
    #[display("Unreadable suggestion: {}", _0)]
    Malformed(String),

    /// The reply named a cell that cannot be played.
    #[display("Suggested cell {} is not playable", _0)]
    Unplayable(Coord),

    /// No answer within the allotted time.
    #[display("Suggestion timed out")]
    TimedOut,
}

impl From<LlmError> for SuggestionError {
    fn from(e: LlmError) -> Self {
        SuggestionError::Service(e)
    }
}

impl std::error::Error for SuggestionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SuggestionError::Service(e) => Some(e),
            _ => None,
        }
    }
}

const SYSTEM_PROMPT: &str = "You are a five-in-a-row (gomoku) master playing on a 15x15 board. \
You MUST NOT lose. Reply with JSON only: {\"row\": number, \"col\": number}.";

#[derive(Debug, Deserialize)]
struct SuggestedCell {
    row: i64,
    col: i64,
}

/// Suggester backed by an LLM chat completion.
#[derive(Debug, Clone)]
pub struct LlmSuggester {
    client: LlmClient,
}

impl LlmSuggester {
    /// Wraps a configured LLM client.
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    /// Builds the user prompt for a position.
    pub fn prompt(board: &Board, mover: Seat) -> String {
        let opponent = mover.opponent().symbol();
        format!(
            "Play '{me}'. Opponent is '{them}'.\n\
             PRIORITY:\n\
             1. WIN if possible.\n\
             2. BLOCK any row of 4 '{them}'s.\n\
             3. BLOCK any row of 3 '{them}'s that has two open ends.\n\
             Board ('.' is empty, rows and columns numbered from 0):\n{board}\n\
             Return JSON: {{\"row\": number, \"col\": number}}",
            me = mover.symbol(),
            them = opponent,
            board = board.render(),
        )
    }

    /// Parses a reply, tolerating code fences and surrounding prose.
    pub fn parse_reply(reply: &str) -> Result<Coord, SuggestionError> {
        let start = reply.find('{');
        let end = reply.rfind('}');
        let json = match (start, end) {
            (Some(start), Some(end)) if start < end => &reply[start..=end],
            _ => return Err(SuggestionError::Malformed(reply.to_string())),
        };

        let cell: SuggestedCell = serde_json::from_str(json)
            .map_err(|e| SuggestionError::Malformed(format!("{}: {}", e, json)))?;
        let row = i32::try_from(cell.row).map_err(|_| SuggestionError::Malformed(json.to_string()))?;
        let col = i32::try_from(cell.col).map_err(|_| SuggestionError::Malformed(json.to_string()))?;
        Coord::checked(row, col).ok_or_else(|| SuggestionError::Malformed(json.to_string()))
    }
}

#[async_trait]
impl MoveSuggester for LlmSuggester {
    #[instrument(skip(self, board), fields(mover = %mover))]
    async fn suggest(&self, board: &Board, mover: Seat) -> Result<Coord, SuggestionError> {
        let reply = self
            .client
            .generate(SYSTEM_PROMPT, &Self::prompt(board, mover))
            .await?;
        debug!(reply = %reply, "Suggestion reply");

        let coord = Self::parse_reply(&reply)?;
        if !board.is_empty(coord) {
            warn!(%coord, "Suggested an occupied cell");
            return Err(SuggestionError::Unplayable(coord));
        }
        Ok(coord)
    }

    fn name(&self) -> &str {
        self.client.config().model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        assert_eq!(
            LlmSuggester::parse_reply(r#"{"row": 3, "col": 11}"#).expect("valid"),
            Coord::new(3, 11)
        );
    }

    #[test]
    fn test_parse_fenced_reply() {
        let reply = "```json\n{\"row\":7,\"col\":8}\n```";
        assert_eq!(LlmSuggester::parse_reply(reply).expect("valid"), Coord::new(7, 8));
    }

    #[test]
    fn test_parse_rejects_off_board() {
        assert!(matches!(
            LlmSuggester::parse_reply(r#"{"row": 15, "col": 0}"#),
            Err(SuggestionError::Malformed(_))
        ));
        assert!(matches!(
            LlmSuggester::parse_reply("no idea"),
            Err(SuggestionError::Malformed(_))
        ));
    }

    #[test]
    fn test_prompt_names_both_marks() {
        let prompt = LlmSuggester::prompt(&Board::new(), Seat::B);
        assert!(prompt.contains("Play 'O'"));
        assert!(prompt.contains("Opponent is 'X'"));
    }
}
