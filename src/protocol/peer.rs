//! Peer state machine: Idle → Seeking → Paired → Playing → Done.
//!
//! Pure logic. Every input (a local call, a received envelope, a clock
//! tick) returns an [`Outbox`] of envelopes to publish and events to
//! surface; the caller owns the channel and the clock.
//!
//! Role assignment:
//! - a seeking peer that hears SEEKING replies MATCHED and takes seat A
//! - a seeking peer that gets MATCHED addressed to it takes seat B and
//!   adopts the stake
//! - when both claimed A, the smaller [`PeerId`] keeps it
//!
//! Seat A sends START as soon as it is paired but holds its first move
//! until seat B answers READY, repeating START until then. Until READY
//! arrives a claim can still be overturned, and a LEAVE refunds instead of
//! paying out. MATCHED or START from anyone but the partner is answered
//! with LEAVE.

use super::ProtocolError;
use super::message::{Envelope, Payload, PeerId, Room};
use crate::account::AccountService;
use crate::config::ProtocolSettings;
use crate::games::gomoku::{Board, Coord, Move, Outcome, Progress, Seat};
use crate::session::{MatchSession, SessionError, SessionPhase};
use crate::wager::{Amount, WagerError, WagerPolicy};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Where a peer is in its matchmaking and play cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum PeerState {
    /// Not looking for a match.
    Idle,
    /// Broadcasting SEEKING.
    Seeking,
    /// Seats assigned, waiting for START.
    Paired,
    /// Moves are being exchanged.
    Playing,
    /// The match ended on the board or by a forfeit.
    Done,
}

/// A request to be matched, alive from seek until pairing gives up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchTicket {
    /// Stake this peer asked for.
    pub requested_wager: Amount,
    /// Room being searched.
    pub room: Room,
    /// Seat once assigned; `None` while unassigned.
    pub role: Option<Seat>,
}

/// Protocol clock settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerTimings {
    /// Interval between SEEKING broadcasts.
    pub seek_interval: Duration,
    /// Seeking gives up after this long.
    pub seek_timeout: Duration,
    /// Silence from the partner reported after this long.
    pub stall_timeout: Duration,
}

impl Default for PeerTimings {
    fn default() -> Self {
        Self::from(&ProtocolSettings::default())
    }
}

impl From<&ProtocolSettings> for PeerTimings {
    fn from(settings: &ProtocolSettings) -> Self {
        Self {
            seek_interval: settings.seek_interval(),
            seek_timeout: settings.seek_timeout(),
            stall_timeout: settings.stall_timeout(),
        }
    }
}

/// Something the presentation layer should hear about.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    /// Seats were assigned.
    Paired {
        /// The other peer.
        partner: PeerId,
        /// Seat this peer holds.
        seat: Seat,
        /// Agreed stake.
        wager: Amount,
    },
    /// A concurrent claim on seat A was settled against this peer.
    RoleChanged {
        /// Seat now held.
        seat: Seat,
        /// Stake adopted from the partner.
        wager: Amount,
    },
    /// The stake was debited and play began.
    GameStarted {
        /// Seat this peer holds.
        seat: Seat,
        /// Stake.
        wager: Amount,
    },
    /// The partner's move was applied.
    RemoteMove {
        /// The move.
        mv: Move,
        /// What it did.
        progress: Progress,
    },
    /// The match reached its outcome.
    MatchEnded {
        /// Final outcome.
        outcome: Outcome,
    },
    /// Seat B answered START; seat A may move.
    PartnerJoined,
    /// The partner left. Once the partner has joined this is a forfeit win.
    OpponentLeft {
        /// Outcome after the departure: `Unresolved` before START,
        /// `Abandoned` (stake refunded) when the partner never joined.
        outcome: Outcome,
    },
    /// The match was thrown away; any stake was refunded.
    Aborted {
        /// Why.
        error: ProtocolError,
    },
    /// Nobody paired within the seek timeout.
    SeekTimedOut,
    /// The partner has been silent for at least the stall timeout.
    Stalled {
        /// How long this peer has been waiting.
        waited: Duration,
    },
    /// The local player cancelled.
    Cancelled,
}

/// Output of one protocol step.
#[derive(Debug, Default)]
pub struct Outbox {
    /// Envelopes to publish, in order.
    pub messages: Vec<Envelope>,
    /// Events to surface, in order.
    pub events: Vec<PeerEvent>,
}

impl Outbox {
    /// True when there is nothing to do.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.events.is_empty()
    }
}

/// Sans-IO protocol core for one peer.
#[derive(Debug)]
pub struct PeerProtocol {
    id: PeerId,
    player: String,
    accounts: Arc<dyn AccountService>,
    policy: WagerPolicy,
    timings: PeerTimings,
    state: PeerState,
    ticket: Option<MatchTicket>,
    partner: Option<PeerId>,
    session: Option<MatchSession>,
    partner_joined: bool,
    seek_started: Option<Instant>,
    next_broadcast: Option<Instant>,
    waiting_since: Option<Instant>,
    stall_reported: bool,
}

impl PeerProtocol {
    /// Creates an idle peer playing for `player`'s account.
    #[instrument(skip(player, accounts), fields(peer = %id))]
    pub fn new(id: PeerId, player: impl Into<String>, accounts: Arc<dyn AccountService>) -> Self {
        info!("Creating peer");
        Self {
            id,
            player: player.into(),
            accounts,
            policy: WagerPolicy::default(),
            timings: PeerTimings::default(),
            state: PeerState::Idle,
            ticket: None,
            partner: None,
            session: None,
            partner_joined: false,
            seek_started: None,
            next_broadcast: None,
            waiting_since: None,
            stall_reported: false,
        }
    }

    /// Uses a different wager policy.
    pub fn with_policy(mut self, policy: WagerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Uses different timings.
    pub fn with_timings(mut self, timings: PeerTimings) -> Self {
        self.timings = timings;
        self
    }

    // ── Local operations ────────────────────────────────────

    /// Opens a ticket and starts broadcasting SEEKING.
    #[instrument(skip(self, now), fields(peer = %self.id))]
    pub fn start_seeking(
        &mut self,
        wager: Amount,
        room: Room,
        now: Instant,
    ) -> Result<Outbox, ProtocolError> {
        self.require(&[PeerState::Idle, PeerState::Done], "start_seeking")?;
        self.policy.validate_choice(wager).map_err(SessionError::from)?;
        let balance = self.accounts.balance(&self.player).map_err(SessionError::from)?;
        if balance < wager {
            return Err(SessionError::from(WagerError::InsufficientFunds { wager, balance }).into());
        }

        self.reset_to_idle();
        self.session = None;
        self.ticket = Some(MatchTicket {
            requested_wager: wager,
            room: room.clone(),
            role: None,
        });
        self.state = PeerState::Seeking;
        self.seek_started = Some(now);
        self.next_broadcast = Some(now + self.timings.seek_interval);
        info!(wager, %room, "Seeking opponent");

        let mut out = Outbox::default();
        out.messages.push(self.broadcast(Payload::Seeking { wager }));
        Ok(out)
    }

    /// Seat A debits the stake and sends START.
    ///
    /// START is repeated on every seek interval until the partner answers
    /// READY.
    #[instrument(skip(self, now), fields(peer = %self.id))]
    pub fn start_game(&mut self, now: Instant) -> Result<Outbox, ProtocolError> {
        self.require(&[PeerState::Paired], "start_game")?;
        if self.role() != Some(Seat::A) {
            return Err(self.invalid("start_game"));
        }
        let partner = self.partner.clone().ok_or_else(|| self.invalid("start_game"))?;
        let session = self.session.as_mut().ok_or(ProtocolError::InvalidState {
            operation: "start_game",
            state: PeerState::Paired,
        })?;

        session.start()?;
        let wager = session.wager().unwrap_or_default();
        let initial_board = session.board().clone();
        self.state = PeerState::Playing;
        self.next_broadcast = Some(now + self.timings.seek_interval);
        self.mark_activity(now);
        info!(wager, %partner, "Game started as seat A");

        let mut out = Outbox::default();
        out.messages
            .push(self.addressed(partner, Payload::Start { initial_board, wager }));
        out.events.push(PeerEvent::GameStarted {
            seat: Seat::A,
            wager,
        });
        Ok(out)
    }

    /// Plays the local seat's move and relays it.
    ///
    /// Illegal moves are returned as errors and leave everything unchanged.
    /// Seat A cannot move before the partner has joined.
    #[instrument(skip(self, now), fields(peer = %self.id))]
    pub fn submit_local_move(&mut self, coord: Coord, now: Instant) -> Result<Outbox, ProtocolError> {
        self.require(&[PeerState::Playing], "submit_local_move")?;
        if !self.partner_joined {
            return Err(self.invalid("submit_local_move"));
        }
        let partner = self.partner.clone().ok_or_else(|| self.invalid("submit_local_move"))?;
        let session = self.session.as_mut().ok_or(ProtocolError::InvalidState {
            operation: "submit_local_move",
            state: PeerState::Playing,
        })?;

        let mv = Move::new(session.local_seat(), coord);
        let progress = session.submit_move(mv)?;
        let outcome = session.outcome();
        self.mark_activity(now);

        let mut out = Outbox::default();
        out.messages.push(self.addressed(partner, Payload::from_move(mv)));
        if !matches!(progress, Progress::Continue { .. }) {
            self.state = PeerState::Done;
            out.events.push(PeerEvent::MatchEnded { outcome });
        }
        Ok(out)
    }

    /// Leaves whatever is in progress and returns to Idle.
    ///
    /// While playing this is a surrender and a LEAVE is sent.
    #[instrument(skip(self, _now), fields(peer = %self.id))]
    pub fn cancel(&mut self, _now: Instant) -> Outbox {
        let mut out = Outbox::default();
        match self.state {
            PeerState::Idle | PeerState::Done => return out,
            PeerState::Seeking => info!("Seeking cancelled"),
            PeerState::Paired => {
                if let Some(partner) = self.partner.clone() {
                    out.messages.push(self.addressed(partner, Payload::Leave));
                }
                info!("Left before the game started");
            }
            PeerState::Playing => {
                if let Some(session) = self.session.as_mut() {
                    match session.surrender() {
                        Ok(()) => out.events.push(PeerEvent::MatchEnded {
                            outcome: session.outcome(),
                        }),
                        Err(e) => error!(error = %e, "Surrender failed"),
                    }
                }
                if let Some(partner) = self.partner.clone() {
                    out.messages.push(self.addressed(partner, Payload::Leave));
                }
                info!("Surrendered and left");
            }
        }
        self.reset_to_idle();
        out.events.push(PeerEvent::Cancelled);
        out
    }

    // ── Clock ───────────────────────────────────────────────

    /// Advances timers: SEEKING and START repeats, seek timeout, stall
    /// detection.
    pub fn tick(&mut self, now: Instant) -> Outbox {
        let mut out = Outbox::default();
        if self.state == PeerState::Playing && !self.partner_joined {
            self.repeat_start(now, &mut out);
        }
        match self.state {
            PeerState::Seeking => {
                if self.elapsed(now).is_some_and(|e| e >= self.timings.seek_timeout) {
                    info!(peer = %self.id, "Seek timed out");
                    self.reset_to_idle();
                    out.events.push(PeerEvent::SeekTimedOut);
                } else if self.next_broadcast.is_some_and(|at| now >= at) {
                    if let Some(wager) = self.ticket.as_ref().map(|t| t.requested_wager) {
                        out.messages.push(self.broadcast(Payload::Seeking { wager }));
                    }
                    self.next_broadcast = Some(now + self.timings.seek_interval);
                }
            }
            PeerState::Paired | PeerState::Playing if self.awaiting_remote() => {
                if let Some(since) = self.waiting_since {
                    let waited = now.saturating_duration_since(since);
                    if waited >= self.timings.stall_timeout && !self.stall_reported {
                        warn!(peer = %self.id, waited_secs = waited.as_secs(), "Partner stalled");
                        self.stall_reported = true;
                        out.events.push(PeerEvent::Stalled { waited });
                    }
                }
            }
            _ => {}
        }
        out
    }

    fn repeat_start(&mut self, now: Instant, out: &mut Outbox) {
        if !self.next_broadcast.is_some_and(|at| now >= at) || self.role() != Some(Seat::A) {
            return;
        }
        let (Some(partner), Some(session)) = (self.partner.clone(), self.session.as_ref()) else {
            return;
        };
        let start = Payload::Start {
            initial_board: session.board().clone(),
            wager: session.wager().unwrap_or_default(),
        };
        debug!(%partner, "Repeating START");
        out.messages.push(self.addressed(partner, start));
        self.next_broadcast = Some(now + self.timings.seek_interval);
    }

    /// Time spent seeking, while seeking.
    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        match self.state {
            PeerState::Seeking => self.seek_started.map(|s| now.saturating_duration_since(s)),
            _ => None,
        }
    }

    // ── Inbound ─────────────────────────────────────────────

    /// Handles one envelope from the room.
    #[instrument(skip(self, envelope, now), fields(peer = %self.id, kind = envelope.payload.kind(), from = %envelope.from))]
    pub fn receive(&mut self, envelope: Envelope, now: Instant) -> Outbox {
        let mut out = Outbox::default();
        if envelope.from == self.id || !envelope.is_for(&self.id) {
            return out;
        }

        let addressed = envelope.to.is_some();
        let from_partner = self.partner.as_ref() == Some(&envelope.from);
        if from_partner {
            self.mark_activity(now);
        }

        match (self.state, envelope.payload) {
            (PeerState::Seeking, Payload::Seeking { .. }) => {
                self.claim_seat_a(envelope.from, &mut out);
            }
            (PeerState::Seeking, Payload::Matched { wager }) if addressed => {
                self.take_seat_b(envelope.from, wager, now, &mut out);
            }
            (PeerState::Seeking, Payload::Start { initial_board, wager }) if addressed => {
                // MATCHED was lost; START carries enough to join
                self.take_seat_b(envelope.from, wager, now, &mut out);
                if self.state == PeerState::Paired {
                    self.join_game(initial_board, wager, now, &mut out);
                }
            }
            (PeerState::Paired | PeerState::Playing, Payload::Matched { wager }) if from_partner => {
                if self.role() == Some(Seat::A) {
                    self.resolve_claim(wager, None, now, &mut out);
                }
            }
            (PeerState::Paired | PeerState::Playing, Payload::Start { initial_board, wager })
                if from_partner =>
            {
                match (self.role(), self.state) {
                    (Some(Seat::B), PeerState::Paired) => {
                        self.join_game(initial_board, wager, now, &mut out)
                    }
                    (Some(Seat::A), _) => {
                        self.resolve_claim(wager, Some(initial_board), now, &mut out)
                    }
                    (Some(Seat::B), _) => {
                        // Our READY was lost
                        debug!("Duplicate START; answering READY again");
                        out.messages.push(self.addressed(envelope.from, Payload::Ready));
                    }
                    _ => debug!("START ignored"),
                }
            }
            (PeerState::Playing, Payload::Ready) if from_partner => {
                if self.role() == Some(Seat::A) && !self.partner_joined {
                    info!("Partner joined");
                    self.partner_joined = true;
                    self.next_broadcast = None;
                    out.events.push(PeerEvent::PartnerJoined);
                }
            }
            (PeerState::Playing, Payload::Move { row, col, mark }) if from_partner => {
                self.apply_remote_move(Move::new(mark, Coord::new(row, col)), &mut out);
            }
            (PeerState::Playing, Payload::Leave) if from_partner => {
                if self.partner_joined {
                    self.partner_left_mid_game(&mut out);
                } else {
                    self.partner_left_before_joining(&mut out);
                }
            }
            (PeerState::Paired, Payload::Leave) if from_partner => {
                info!("Partner left before the game started");
                self.reset_to_idle();
                out.events.push(PeerEvent::OpponentLeft {
                    outcome: Outcome::Unresolved,
                });
            }
            (state, Payload::Matched { .. } | Payload::Start { .. })
                if addressed && !from_partner && state != PeerState::Seeking =>
            {
                // Someone claimed us while we are taken; tell them so they stop waiting
                info!(%state, claimant = %envelope.from, "Turning away a second claimant");
                out.messages.push(self.addressed(envelope.from, Payload::Leave));
            }
            (state, payload) => {
                debug!(%state, kind = payload.kind(), "Message ignored");
            }
        }
        out
    }

    fn claim_seat_a(&mut self, partner: PeerId, out: &mut Outbox) {
        let Some(wager) = self.ticket.as_ref().map(|t| t.requested_wager) else {
            return;
        };
        match self.open_session(Seat::A, wager, None) {
            Ok(session) => self.session = Some(session),
            Err(e) => {
                warn!(error = %e, "Cannot pair; stake no longer covered");
                self.abort(ProtocolError::Session(e), out);
                return;
            }
        }
        self.pair(partner.clone(), Seat::A);
        info!(%partner, wager, "Paired as seat A");
        out.messages
            .push(self.addressed(partner.clone(), Payload::Matched { wager }));
        out.events.push(PeerEvent::Paired {
            partner,
            seat: Seat::A,
            wager,
        });
    }

    fn take_seat_b(&mut self, partner: PeerId, wager: Amount, now: Instant, out: &mut Outbox) {
        match self.open_session(Seat::B, wager, None) {
            Ok(session) => self.session = Some(session),
            Err(e) => {
                // Turn the claimant away and keep seeking
                warn!(%partner, wager, error = %e, "Declining proposed stake");
                out.messages.push(self.addressed(partner, Payload::Leave));
                return;
            }
        }
        self.pair(partner.clone(), Seat::B);
        self.mark_activity(now);
        info!(%partner, wager, "Paired as seat B");
        out.events.push(PeerEvent::Paired {
            partner,
            seat: Seat::B,
            wager,
        });
    }

    fn resolve_claim(
        &mut self,
        wager: Amount,
        start: Option<Board>,
        now: Instant,
        out: &mut Outbox,
    ) {
        let Some(partner) = self.partner.clone() else {
            return;
        };
        if self.id < partner {
            debug!(%partner, "Concurrent claim: keeping seat A");
            return;
        }

        let moves_played = self.session.as_ref().is_some_and(|s| !s.history().is_empty());
        if moves_played {
            self.desync("Seat A contested after moves were played".to_string(), out);
            return;
        }

        if let Some(session) = self.session.as_mut().filter(|s| s.phase() == SessionPhase::InProgress) {
            if let Err(e) = session.abandon() {
                error!(error = %e, "Refund failed while giving up seat A");
            }
        }

        match self.open_session(Seat::B, wager, None) {
            Ok(session) => self.session = Some(session),
            Err(e) => {
                out.messages.push(self.addressed(partner, Payload::Leave));
                self.abort(ProtocolError::Session(e), out);
                return;
            }
        }
        self.state = PeerState::Paired;
        self.partner_joined = false;
        self.next_broadcast = None;
        if let Some(ticket) = self.ticket.as_mut() {
            ticket.role = Some(Seat::B);
        }
        self.mark_activity(now);
        info!(%partner, wager, "Concurrent claim: yielding seat A");
        out.events.push(PeerEvent::RoleChanged {
            seat: Seat::B,
            wager,
        });

        if let Some(board) = start {
            self.join_game(board, wager, now, out);
        }
    }

    fn join_game(&mut self, initial_board: Board, wager: Amount, now: Instant, out: &mut Outbox) {
        let started = self.open_session(Seat::B, wager, Some(initial_board)).and_then(|mut session| {
            session.start()?;
            Ok(session)
        });

        match started {
            Ok(session) => {
                self.session = Some(session);
                self.state = PeerState::Playing;
                self.partner_joined = true;
                self.mark_activity(now);
                info!(wager, "Game started as seat B");
                if let Some(partner) = self.partner.clone() {
                    out.messages.push(self.addressed(partner, Payload::Ready));
                }
                out.events.push(PeerEvent::GameStarted {
                    seat: Seat::B,
                    wager,
                });
            }
            Err(e) => {
                warn!(error = %e, "Cannot join game");
                if let Some(partner) = self.partner.clone() {
                    out.messages.push(self.addressed(partner, Payload::Leave));
                }
                self.abort(ProtocolError::Session(e), out);
            }
        }
    }

    fn apply_remote_move(&mut self, mv: Move, out: &mut Outbox) {
        let Some(local_seat) = self.session.as_ref().map(MatchSession::local_seat) else {
            return;
        };
        if mv.seat == local_seat {
            self.desync(format!("Partner played our seat: {}", mv), out);
            return;
        }

        let applied = match self.session.as_mut() {
            Some(session) => session.submit_move(mv).map(|progress| (progress, session.outcome())),
            None => return,
        };
        match applied {
            Ok((progress, outcome)) => {
                let finished = !matches!(progress, Progress::Continue { .. });
                out.events.push(PeerEvent::RemoteMove { mv, progress });
                if finished {
                    self.state = PeerState::Done;
                    out.events.push(PeerEvent::MatchEnded { outcome });
                }
            }
            Err(e) => self.desync(format!("Rejected remote move {}: {}", mv, e), out),
        }
    }

    fn partner_left_mid_game(&mut self, out: &mut Outbox) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.forfeit_opponent() {
            Ok(()) => {
                info!("Partner left; forfeit win");
                self.state = PeerState::Done;
                out.events.push(PeerEvent::OpponentLeft {
                    outcome: session.outcome(),
                });
            }
            Err(e) => error!(error = %e, "Forfeit could not be settled"),
        }
    }

    fn partner_left_before_joining(&mut self, out: &mut Outbox) {
        if let Some(session) = self.session.as_mut().filter(|s| s.phase() == SessionPhase::InProgress) {
            if let Err(e) = session.abandon() {
                error!(error = %e, "Refund failed");
            }
        }
        info!("Partner left without joining; stake refunded");
        self.reset_to_idle();
        out.events.push(PeerEvent::OpponentLeft {
            outcome: Outcome::Abandoned,
        });
    }

    fn desync(&mut self, reason: String, out: &mut Outbox) {
        error!(peer = %self.id, reason = %reason, "Protocol desync; abandoning match");
        self.abort(ProtocolError::Desync(reason), out);
    }

    /// Refunds any running match and returns to Idle.
    fn abort(&mut self, error: ProtocolError, out: &mut Outbox) {
        if let Some(session) = self.session.as_mut().filter(|s| s.phase() == SessionPhase::InProgress) {
            if let Err(e) = session.abandon() {
                error!(error = %e, "Refund failed");
            }
        }
        self.reset_to_idle();
        out.events.push(PeerEvent::Aborted { error });
    }

    // ── Helpers ─────────────────────────────────────────────

    fn open_session(
        &self,
        seat: Seat,
        wager: Amount,
        initial_board: Option<Board>,
    ) -> Result<MatchSession, SessionError> {
        let mut session = MatchSession::new(self.player.clone(), self.accounts.clone())
            .with_policy(self.policy.clone())
            .vs_peer(seat);
        if let Some(board) = initial_board {
            session = session.with_initial_board(board)?;
        }
        match seat {
            Seat::A => session.choose_wager(wager)?,
            Seat::B => session.accept_proposed_wager(wager)?,
        }
        Ok(session)
    }

    fn pair(&mut self, partner: PeerId, seat: Seat) {
        self.partner = Some(partner);
        if let Some(ticket) = self.ticket.as_mut() {
            ticket.role = Some(seat);
        }
        self.state = PeerState::Paired;
        self.partner_joined = false;
        self.seek_started = None;
        self.next_broadcast = None;
    }

    fn reset_to_idle(&mut self) {
        self.state = PeerState::Idle;
        self.ticket = None;
        self.partner = None;
        self.partner_joined = false;
        self.seek_started = None;
        self.next_broadcast = None;
        self.waiting_since = None;
        self.stall_reported = false;
    }

    fn mark_activity(&mut self, now: Instant) {
        self.waiting_since = Some(now);
        self.stall_reported = false;
    }

    /// True when the next message we need has to come from the partner.
    fn awaiting_remote(&self) -> bool {
        match self.state {
            PeerState::Paired => self.role() == Some(Seat::B),
            PeerState::Playing => {
                !self.partner_joined
                    || self
                        .session
                        .as_ref()
                        .is_some_and(|s| s.to_move().is_some() && !s.is_local_turn())
            }
            _ => false,
        }
    }

    fn require(&self, allowed: &[PeerState], operation: &'static str) -> Result<(), ProtocolError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(self.invalid(operation))
        }
    }

    fn invalid(&self, operation: &'static str) -> ProtocolError {
        ProtocolError::InvalidState {
            operation,
            state: self.state,
        }
    }

    fn broadcast(&self, payload: Payload) -> Envelope {
        Envelope::broadcast(self.id.clone(), payload)
    }

    fn addressed(&self, to: PeerId, payload: Payload) -> Envelope {
        Envelope::addressed(self.id.clone(), to, payload)
    }

    // ── Accessors ───────────────────────────────────────────

    /// This peer's identifier.
    pub fn id(&self) -> &PeerId {
        &self.id
    }

    /// Current state.
    pub fn state(&self) -> PeerState {
        self.state
    }

    /// Open ticket, while seeking or paired.
    pub fn ticket(&self) -> Option<&MatchTicket> {
        self.ticket.as_ref()
    }

    /// Seat held, once assigned.
    pub fn role(&self) -> Option<Seat> {
        self.ticket.as_ref().and_then(|t| t.role)
    }

    /// The paired peer.
    pub fn partner(&self) -> Option<&PeerId> {
        self.partner.as_ref()
    }

    /// True once both stakes are in: seat B has answered START, or this
    /// peer is seat B and has joined.
    pub fn partner_joined(&self) -> bool {
        self.partner_joined
    }

    /// The current or most recent session.
    pub fn session(&self) -> Option<&MatchSession> {
        self.session.as_ref()
    }

    /// Protocol timings.
    pub fn timings(&self) -> &PeerTimings {
        &self.timings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{InMemoryAccounts, STARTING_BALANCE};

    fn peer(id: &str, accounts: &Arc<InMemoryAccounts>) -> PeerProtocol {
        PeerProtocol::new(PeerId::new(id), id, accounts.clone())
    }

    fn deliver(to: &mut PeerProtocol, out: &Outbox, now: Instant) -> Outbox {
        let mut combined = Outbox::default();
        for env in &out.messages {
            let next = to.receive(env.clone(), now);
            combined.messages.extend(next.messages);
            combined.events.extend(next.events);
        }
        combined
    }

    #[test]
    fn test_seek_requires_tier_and_funds() {
        let accounts = Arc::new(InMemoryAccounts::new());
        let mut p = peer("p", &accounts);
        let now = Instant::now();
        assert!(p.start_seeking(1_234, Room::PublicQueue, now).is_err());
        accounts.withdraw("p", STARTING_BALANCE - 1_000).expect("withdraw");
        assert!(p.start_seeking(5_000, Room::PublicQueue, now).is_err());
        assert_eq!(p.state(), PeerState::Idle);
    }

    #[test]
    fn test_sequential_pairing() {
        let accounts = Arc::new(InMemoryAccounts::new());
        let mut a = peer("a", &accounts);
        let mut b = peer("b", &accounts);
        let now = Instant::now();

        let seek_a = a.start_seeking(20_000, Room::PublicQueue, now).expect("seek");
        b.start_seeking(5_000, Room::PublicQueue, now).expect("seek");

        // b hears a first, claims A and proposes its own stake
        let matched = deliver(&mut b, &seek_a, now);
        assert_eq!(b.role(), Some(Seat::A));
        deliver(&mut a, &matched, now);
        assert_eq!(a.role(), Some(Seat::B));
        assert_eq!(a.session().and_then(|s| s.wager()), Some(5_000));
    }

    #[test]
    fn test_seek_rebroadcast_and_timeout() {
        let accounts = Arc::new(InMemoryAccounts::new());
        let mut p = peer("p", &accounts);
        let t0 = Instant::now();
        p.start_seeking(5_000, Room::PublicQueue, t0).expect("seek");

        assert!(p.tick(t0 + Duration::from_millis(500)).is_empty());
        let out = p.tick(t0 + Duration::from_millis(1_000));
        assert_eq!(out.messages.len(), 1);
        assert_eq!(p.elapsed(t0 + Duration::from_secs(30)), Some(Duration::from_secs(30)));

        let out = p.tick(t0 + Duration::from_secs(120));
        assert_eq!(out.events, vec![PeerEvent::SeekTimedOut]);
        assert_eq!(p.state(), PeerState::Idle);
        assert!(p.ticket().is_none());
    }

    #[test]
    fn test_stall_reported_once() {
        let accounts = Arc::new(InMemoryAccounts::new());
        let mut a = peer("a", &accounts);
        let mut b = peer("b", &accounts);
        let t0 = Instant::now();

        let seek_b = b.start_seeking(5_000, Room::PublicQueue, t0).expect("seek");
        a.start_seeking(5_000, Room::PublicQueue, t0).expect("seek");
        let matched = deliver(&mut a, &seek_b, t0);
        deliver(&mut b, &matched, t0);
        let start = a.start_game(t0).expect("start");
        let ready = deliver(&mut b, &start, t0);
        deliver(&mut a, &ready, t0);

        // A moves first; A is waiting on nobody, B waits on A
        assert!(a.tick(t0 + Duration::from_secs(61)).is_empty());
        let out = b.tick(t0 + Duration::from_secs(61));
        assert!(matches!(out.events.as_slice(), [PeerEvent::Stalled { .. }]));
        assert!(b.tick(t0 + Duration::from_secs(90)).is_empty());
        assert_eq!(b.state(), PeerState::Playing);
    }

    #[test]
    fn test_start_repeated_until_ready() {
        let accounts = Arc::new(InMemoryAccounts::new());
        let mut a = peer("a", &accounts);
        let mut b = peer("b", &accounts);
        let t0 = Instant::now();

        let seek_b = b.start_seeking(5_000, Room::PublicQueue, t0).expect("seek");
        a.start_seeking(5_000, Room::PublicQueue, t0).expect("seek");
        let matched = deliver(&mut a, &seek_b, t0);
        deliver(&mut b, &matched, t0);
        let start = a.start_game(t0).expect("start");
        assert!(!a.partner_joined());
        assert!(a.submit_local_move(Coord::new(7, 7), t0).is_err());

        // The first READY is lost; the repeated START draws another
        let _lost = deliver(&mut b, &start, t0);
        let repeat = a.tick(t0 + Duration::from_secs(1));
        assert!(matches!(repeat.messages.as_slice(), [Envelope { payload: Payload::Start { .. }, .. }]));
        let ready = deliver(&mut b, &repeat, t0 + Duration::from_secs(1));
        assert!(matches!(ready.messages.as_slice(), [Envelope { payload: Payload::Ready, .. }]));

        let joined = deliver(&mut a, &ready, t0 + Duration::from_secs(1));
        assert_eq!(joined.events, vec![PeerEvent::PartnerJoined]);
        assert!(a.tick(t0 + Duration::from_secs(2)).messages.is_empty());
        assert!(a.submit_local_move(Coord::new(7, 7), t0).is_ok());
    }

    #[test]
    fn test_ignores_own_and_foreign_messages() {
        let accounts = Arc::new(InMemoryAccounts::new());
        let mut p = peer("p", &accounts);
        let now = Instant::now();
        let own = p.start_seeking(5_000, Room::PublicQueue, now).expect("seek");
        assert!(deliver(&mut p, &own, now).is_empty());

        let foreign = Envelope::addressed(
            PeerId::new("x"),
            PeerId::new("y"),
            Payload::Matched { wager: 5_000 },
        );
        assert!(p.receive(foreign, now).is_empty());
        assert_eq!(p.state(), PeerState::Seeking);
    }
}
