//! One wagered match: Wagering → InProgress → Resolved.
//!
//! The session owns the game, the stake and the settlement. It is driven by
//! a local player, by the computer seat through the advisor, or by moves
//! relayed from a remote peer.

use crate::account::{AccountError, AccountService, MatchRecord};
use crate::activity::ActivityLog;
use crate::advisor::{Advice, MoveAdvisor};
use crate::games::gomoku::{
    AnyGame, Board, Coord, GameSetup, Move, MoveError, Outcome, Progress, Resolution, Seat,
    WinningLine,
};
use crate::wager::{Amount, WagerError, WagerPolicy};
use chrono::Utc;
use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Unique identifier for a match session.
pub type SessionId = String;

/// Who sits across the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum OpponentKind {
    /// The computer, answering through the move advisor.
    #[display("computer")]
    Heuristic,
    /// Another human on a separate client.
    #[display("peer")]
    Peer,
}

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum SessionPhase {
    /// Choosing or accepting the stake.
    Wagering,
    /// Moves are being played.
    InProgress,
    /// Terminal; build a new session to play again.
    Resolved,
}

/// Error from a session operation. Session state is unchanged when one is
/// returned.
#[derive(Debug, Clone, PartialEq, Display, From, Error)]
pub enum SessionError {
    /// Illegal move or wrong phase for a move.
    #[display("Illegal move: {}", _0)]
    Move(MoveError),
    /// Stake rejected.
    #[display("Wager rejected: {}", _0)]
    Wager(WagerError),
    /// The account backend refused.
    #[display("Account error: {}", _0)]
    Account(AccountError),
}

fn signed(amount: Amount) -> i64 {
    i64::try_from(amount).unwrap_or(i64::MAX)
}

/// Read-only snapshot for presentation.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    /// Session identifier.
    pub id: SessionId,
    /// Local player's account name.
    pub player: String,
    /// Current phase.
    pub phase: SessionPhase,
    /// Seat the local player holds.
    pub local_seat: Seat,
    /// Opponent kind.
    pub opponent: OpponentKind,
    /// Stake, once chosen.
    pub wager: Option<Amount>,
    /// Board rows as text.
    pub board: Vec<String>,
    /// Seat to move while in progress.
    pub to_move: Option<Seat>,
    /// Outcome so far.
    pub outcome: Outcome,
    /// Winning cells, if the match ended on a five.
    pub winning_line: Option<Vec<Coord>>,
    /// Moves played.
    pub moves: usize,
    /// Recent activity, newest first.
    pub activity: Vec<String>,
}

/// What one call to [`MatchSession::play`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayReport {
    /// Effect of the local move.
    pub local: Progress,
    /// The computer's answer, when it was the computer's turn.
    pub reply: Option<(Advice, Progress)>,
}

/// A single wagered match.
#[derive(Debug)]
pub struct MatchSession {
    id: SessionId,
    player: String,
    local_seat: Seat,
    opponent: OpponentKind,
    policy: WagerPolicy,
    accounts: Arc<dyn AccountService>,
    advisor: MoveAdvisor,
    wager: Option<Amount>,
    game: AnyGame,
    settled: bool,
    activity: ActivityLog,
}

impl MatchSession {
    /// Creates a session for `player` against the computer, holding seat A.
    #[instrument(skip_all)]
    pub fn new(player: impl Into<String>, accounts: Arc<dyn AccountService>) -> Self {
        let player = player.into();
        let id = format!("{}-{}", player, Utc::now().timestamp_millis());
        info!(session_id = %id, player = %player, "Creating match session");
        Self {
            id,
            player,
            local_seat: Seat::A,
            opponent: OpponentKind::Heuristic,
            policy: WagerPolicy::default(),
            accounts,
            advisor: MoveAdvisor::default(),
            wager: None,
            game: AnyGame::from(GameSetup::new()),
            settled: false,
            activity: ActivityLog::default(),
        }
    }

    /// Plays against a remote peer from `local_seat`.
    pub fn vs_peer(mut self, local_seat: Seat) -> Self {
        self.opponent = OpponentKind::Peer;
        self.local_seat = local_seat;
        self
    }

    /// Plays against the computer from `local_seat`.
    pub fn vs_computer(mut self, local_seat: Seat) -> Self {
        self.opponent = OpponentKind::Heuristic;
        self.local_seat = local_seat;
        self
    }

    /// Uses a different wager policy.
    pub fn with_policy(mut self, policy: WagerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Uses a different advisor for the computer seat.
    pub fn with_advisor(mut self, advisor: MoveAdvisor) -> Self {
        self.advisor = advisor;
        self
    }

    /// Overrides the generated identifier.
    pub fn with_id(mut self, id: impl Into<SessionId>) -> Self {
        self.id = id.into();
        self
    }

    /// Starts from a non-empty position instead of an empty board.
    #[instrument(skip(self, board), fields(session_id = %self.id))]
    pub fn with_initial_board(mut self, board: Board) -> Result<Self, SessionError> {
        self.require_phase(SessionPhase::Wagering)?;
        self.game = AnyGame::from(GameSetup::from_position(board)?);
        Ok(self)
    }

    // ── Wagering ────────────────────────────────────────────

    /// Chooses a stake from the table tiers.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn choose_wager(&mut self, amount: Amount) -> Result<(), SessionError> {
        self.require_wagering()?;
        self.policy.validate_choice(amount)?;
        self.set_wager(amount)
    }

    /// Accepts the stake proposed by the peer holding seat A.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn accept_proposed_wager(&mut self, amount: Amount) -> Result<(), SessionError> {
        self.require_wagering()?;
        self.policy.validate_proposed(amount)?;
        self.set_wager(amount)
    }

    fn set_wager(&mut self, amount: Amount) -> Result<(), SessionError> {
        let balance = self.accounts.balance(&self.player)?;
        if balance < amount {
            warn!(amount, balance, "Stake exceeds balance");
            return Err(WagerError::InsufficientFunds { wager: amount, balance }.into());
        }
        self.wager = Some(amount);
        debug!(amount, "Wager set");
        Ok(())
    }

    /// Debits the chosen stake and opens play.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn start(&mut self) -> Result<(), SessionError> {
        self.require_wagering()?;
        let wager = self.wager.ok_or(WagerError::NoWager)?;

        match self.accounts.debit(&self.player, wager) {
            Ok(balance) => debug!(wager, balance, "Stake debited"),
            Err(AccountError::InsufficientFunds { available, .. }) => {
                return Err(WagerError::InsufficientFunds {
                    wager,
                    balance: available,
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        }

        self.game.start();
        self.activity
            .push(format!("{} staked {} against the {}", self.player, wager, self.opponent));
        info!(wager, opponent = %self.opponent, local_seat = %self.local_seat, "Match started");
        Ok(())
    }

    /// Chooses a table stake and starts in one step.
    pub fn start_with_wager(&mut self, amount: Amount) -> Result<(), SessionError> {
        self.choose_wager(amount)?;
        self.start()
    }

    // ── Play ────────────────────────────────────────────────

    /// Applies a move for whichever seat it names.
    ///
    /// Used for local moves and for moves relayed from a peer.
    ///
    /// A finishing move is settled before it is committed, so a refused
    /// credit leaves the board as it was.
    #[instrument(skip(self), fields(session_id = %self.id, mv = %mv))]
    pub fn submit_move(&mut self, mv: Move) -> Result<Progress, SessionError> {
        let mut next = self.game.clone();
        let progress = next.place(mv)?;

        match &progress {
            Progress::Continue { to_move } => debug!(to_move = %to_move, "Turn passes"),
            Progress::Won(line) => {
                info!(winner = %line.seat(), "Five in a row");
                self.settle(next.outcome())?;
            }
            Progress::Draw => {
                info!("Board full, match drawn");
                self.settle(next.outcome())?;
            }
        }
        self.game = next;
        self.activity.push(format!("{} plays {}", mv.seat.symbol(), mv.coord));
        Ok(progress)
    }

    /// Plays the local seat's move, then lets the computer answer.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn play(&mut self, coord: Coord) -> Result<PlayReport, SessionError> {
        let local = self.submit_move(Move::new(self.local_seat, coord))?;
        let reply = match local {
            Progress::Continue { .. } => self.computer_turn().await?,
            _ => None,
        };
        Ok(PlayReport { local, reply })
    }

    /// Lets the computer move if it is the computer's turn.
    ///
    /// Returns `None` when it is not.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn computer_turn(&mut self) -> Result<Option<(Advice, Progress)>, SessionError> {
        let Some(seat) = self.computer_seat() else {
            return Ok(None);
        };
        if self.game.to_move() != Some(seat) {
            return Ok(None);
        }

        let Some(advice) = self.advisor.choose(self.game.board(), seat).await else {
            return Ok(None);
        };
        let progress = self.submit_move(Move::new(seat, advice.coord))?;
        Ok(Some((advice, progress)))
    }

    /// Applies a recorded move log in order.
    #[instrument(skip(self, moves), fields(session_id = %self.id, moves = moves.len()))]
    pub fn replay(&mut self, moves: &[Move]) -> Result<(), SessionError> {
        for mv in moves {
            self.submit_move(*mv)?;
        }
        Ok(())
    }

    // ── Off-board endings ───────────────────────────────────

    /// The local seat concedes; settled as a loss.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn surrender(&mut self) -> Result<(), SessionError> {
        self.conclude(Resolution::Surrender(self.local_seat))?;
        self.activity.push(format!("{} surrendered", self.player));
        Ok(())
    }

    /// The remote seat left; settled as a win.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn forfeit_opponent(&mut self) -> Result<(), SessionError> {
        self.conclude(Resolution::Forfeit(self.local_seat.opponent()))?;
        self.activity.push("Opponent left the table".to_string());
        Ok(())
    }

    /// Throws the match away and refunds the stake.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn abandon(&mut self) -> Result<(), SessionError> {
        self.conclude(Resolution::Desync)?;
        self.activity.push("Match abandoned, stake refunded".to_string());
        Ok(())
    }

    fn conclude(&mut self, resolution: Resolution) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::InProgress)?;
        let mut next = self.game.clone();
        next.conclude(resolution)?;
        self.settle(next.outcome())?;
        self.game = next;
        Ok(())
    }

    // ── Settlement ──────────────────────────────────────────

    /// Pays out `outcome`. The credit goes first so that a refused credit
    /// leaves the account untouched.
    fn settle(&mut self, outcome: Outcome) -> Result<(), SessionError> {
        if self.settled {
            return Ok(());
        }
        let wager = self.wager.unwrap_or_default();

        match outcome {
            Outcome::WonBy(seat) if seat == self.local_seat => {
                let prize = self.policy.payout(wager);
                self.accounts.credit(&self.player, prize)?;
                self.accounts.record_result(
                    &self.player,
                    MatchRecord::new(1, 1, signed(prize).saturating_sub(signed(wager))),
                )?;
                self.activity.push(format!("{} wins {}", self.player, prize));
                info!(prize, "Match won");
            }
            Outcome::WonBy(_) => {
                self.accounts
                    .record_result(&self.player, MatchRecord::new(1, 0, -signed(wager)))?;
                self.activity.push(format!("{} loses {}", self.player, wager));
                info!(wager, "Match lost");
            }
            Outcome::Draw => {
                self.accounts.credit(&self.player, wager)?;
                self.accounts
                    .record_result(&self.player, MatchRecord::new(1, 0, 0))?;
                self.activity.push(format!("Draw, {} refunded", wager));
                info!(wager, "Match drawn");
            }
            Outcome::Abandoned => {
                self.accounts.credit(&self.player, wager)?;
                info!(wager, "Match abandoned");
            }
            Outcome::Unresolved => return Ok(()),
        }

        self.settled = true;
        Ok(())
    }

    // ── Accessors ───────────────────────────────────────────

    fn require_wagering(&self) -> Result<(), SessionError> {
        if self.phase() != SessionPhase::Wagering {
            return Err(WagerError::AlreadyStarted.into());
        }
        Ok(())
    }

    fn require_phase(&self, phase: SessionPhase) -> Result<(), SessionError> {
        match (self.phase(), phase) {
            (current, wanted) if current == wanted => Ok(()),
            (SessionPhase::Wagering, _) => Err(MoveError::NotStarted.into()),
            (SessionPhase::Resolved, _) => Err(MoveError::MatchOver.into()),
            (SessionPhase::InProgress, _) => Err(WagerError::AlreadyStarted.into()),
        }
    }

    /// Seat played by the computer, if any.
    pub fn computer_seat(&self) -> Option<Seat> {
        match self.opponent {
            OpponentKind::Heuristic => Some(self.local_seat.opponent()),
            OpponentKind::Peer => None,
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SessionPhase {
        match self.game {
            AnyGame::Setup(_) => SessionPhase::Wagering,
            AnyGame::InProgress(_) => SessionPhase::InProgress,
            AnyGame::Finished(_) => SessionPhase::Resolved,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Local player's account name.
    pub fn player(&self) -> &str {
        &self.player
    }

    /// Seat held by the local player.
    pub fn local_seat(&self) -> Seat {
        self.local_seat
    }

    /// Opponent kind.
    pub fn opponent(&self) -> OpponentKind {
        self.opponent
    }

    /// Stake, once chosen.
    pub fn wager(&self) -> Option<Amount> {
        self.wager
    }

    /// Current board.
    pub fn board(&self) -> &Board {
        self.game.board()
    }

    /// Seat to move while in progress.
    pub fn to_move(&self) -> Option<Seat> {
        self.game.to_move()
    }

    /// True when the local seat is to move.
    pub fn is_local_turn(&self) -> bool {
        self.to_move() == Some(self.local_seat)
    }

    /// Outcome so far.
    pub fn outcome(&self) -> Outcome {
        self.game.outcome()
    }

    /// How the match ended.
    pub fn resolution(&self) -> Option<&Resolution> {
        self.game.resolution()
    }

    /// Winning line, if the match ended on a five.
    pub fn winning_line(&self) -> Option<&WinningLine> {
        self.resolution().and_then(Resolution::winning_line)
    }

    /// Moves played so far.
    pub fn history(&self) -> &[Move] {
        self.game.history()
    }

    /// Recent activity.
    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    /// Snapshot for presentation.
    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id.clone(),
            player: self.player.clone(),
            phase: self.phase(),
            local_seat: self.local_seat,
            opponent: self.opponent,
            wager: self.wager,
            board: self.board().to_rows(),
            to_move: self.to_move(),
            outcome: self.outcome(),
            winning_line: self.winning_line().map(|line| line.cells().to_vec()),
            moves: self.history().len(),
            activity: self.activity.iter().map(|e| e.message.clone()).collect(),
        }
    }
}
