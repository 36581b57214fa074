//! Gomoku Royale - wager-backed five-in-a-row match engine
//!
//! Two parties play five-in-a-row on a 15x15 board for a stake. The
//! opponent is either the computer (a single-ply heuristic, optionally
//! seeded by an LLM suggestion) or a second human reached through a
//! room-scoped broadcast channel with no referee in between.
//!
//! # Architecture
//!
//! - **Games**: typestate board game with win and draw detection
//! - **Session**: one match's wager lifecycle, turns and settlement
//! - **Advisor**: suggestion first, heuristic fallback, bounded by a timeout
//! - **Protocol**: sans-IO peer state machine plus an async client shell
//! - **Orchestrator**: drives a [`Player`] through a local or peer match
//!
//! # Example
//!
//! ```no_run
//! use gomoku_royale::{Coord, InMemoryAccounts, MatchSession, Seat};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let accounts = Arc::new(InMemoryAccounts::new());
//! let mut session = MatchSession::new("alice", accounts).vs_computer(Seat::A);
//! session.start_with_wager(20_000)?;
//!
//! let report = session.play(Coord::new(7, 7)).await?;
//! println!("{:?}", report.reply);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod account;
mod activity;
mod advisor;
mod config;
mod games;
mod llm_client;
mod orchestrator;
mod players;
mod protocol;
mod session;
mod suggestion;
mod wager;

// Crate-level exports - Accounts and wagers
pub use account::{
    AccountError, AccountService, InMemoryAccounts, MatchRecord, PlayerRecord, STARTING_BALANCE,
};
pub use wager::{
    Amount, DEFAULT_MINIMUM, DEFAULT_PAYOUT_PERCENT, DEFAULT_TIERS, WagerError, WagerPolicy,
};

// Crate-level exports - Configuration
pub use config::{AdvisorSettings, ConfigError, EngineConfig, LlmSettings, ProtocolSettings};

// Crate-level exports - LLM client and move suggestions
pub use advisor::{Advice, AdviceSource, MoveAdvisor};
pub use llm_client::{LlmClient, LlmConfig, LlmError, LlmProvider};
pub use suggestion::{LlmSuggester, MoveSuggester, SuggestionError};

// Crate-level exports - Sessions
pub use activity::{ACTIVITY_CAPACITY, ActivityEntry, ActivityLog};
pub use session::{
    MatchSession, OpponentKind, PlayReport, SessionError, SessionId, SessionPhase, SessionView,
};

// Crate-level exports - Peer protocol
pub use protocol::{
    DropFilter, Envelope, LocalChannel, LocalHub, LossyHub, MatchTicket, Outbox, Payload,
    PeerClient, PeerEvent, PeerId, PeerProtocol, PeerState, PeerTimings, ProtocolError, Room,
    RoomChannel, RoomCode, RoomTransport,
};

// Crate-level exports - Players and orchestration
pub use orchestrator::{MatchEvent, run_local_match, run_peer_match};
pub use players::{ComputerPlayer, HumanPlayer, Player};

// Crate-level exports - Game types (gomoku)
pub use games::gomoku::{
    AlternatingTurnInvariant, AnyGame, BOARD_SIZE, Board, BoardParseError, CENTER, Cell, Coord,
    Direction, GameFinished, GameInProgress, GameResult, GameSetup, GomokuInvariants, Invariant,
    InvariantSet, InvariantViolation, Mark, MonotonicBoardInvariant, Move, MoveError, Outcome,
    Progress, Resolution, Seat, WinningLine, detect_win, is_full, select_move,
};
pub use games::gomoku::heuristic::score_cell;
