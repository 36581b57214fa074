//! Tests for peer pairing and move synchronization.

use gomoku_royale::{
    ComputerPlayer, Coord, Envelope, InMemoryAccounts, LocalHub, LossyHub, MatchEvent,
    MoveAdvisor, Outbox, Outcome, Payload, PeerClient, PeerEvent, PeerId, PeerProtocol,
    PeerState, PeerTimings, ProtocolError, Room, RoomCode, STARTING_BALANCE, Seat, SessionPhase,
    run_peer_match,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

fn peer(id: &str, accounts: &Arc<InMemoryAccounts>) -> PeerProtocol {
    PeerProtocol::new(PeerId::new(id), id, accounts.clone())
}

/// Delivers every message in `out` to `to`, collecting what it produces.
fn deliver(to: &mut PeerProtocol, out: &Outbox, now: Instant) -> Outbox {
    let mut combined = Outbox::default();
    for envelope in &out.messages {
        let next = to.receive(envelope.clone(), now);
        combined.messages.extend(next.messages);
        combined.events.extend(next.events);
    }
    combined
}

fn balance(accounts: &InMemoryAccounts, player: &str) -> u64 {
    accounts.record(player).map(|r| *r.balance()).unwrap_or(STARTING_BALANCE)
}

fn assert_one_of_each(a: &PeerProtocol, b: &PeerProtocol) {
    let mut roles = [a.role().expect("a paired"), b.role().expect("b paired")];
    roles.sort();
    assert_eq!(roles, [Seat::A, Seat::B]);
    assert_eq!(a.partner(), Some(b.id()));
    assert_eq!(b.partner(), Some(a.id()));
}

/// Pairs and starts a game; returns (seat A peer, seat B peer).
fn started(accounts: &Arc<InMemoryAccounts>, wager: u64) -> (PeerProtocol, PeerProtocol) {
    let now = Instant::now();
    let mut a = peer("a", accounts);
    let mut b = peer("b", accounts);
    let seek_b = b.start_seeking(wager, Room::PublicQueue, now).expect("seek");
    a.start_seeking(wager, Room::PublicQueue, now).expect("seek");

    let matched = deliver(&mut a, &seek_b, now);
    deliver(&mut b, &matched, now);
    let start = a.start_game(now).expect("start");
    let joined = deliver(&mut b, &start, now);
    assert!(joined.events.contains(&PeerEvent::GameStarted {
        seat: Seat::B,
        wager
    }));
    let ready = deliver(&mut a, &joined, now);
    assert_eq!(ready.events, vec![PeerEvent::PartnerJoined]);
    (a, b)
}

/// Merges outboxes in order, as a room would deliver them.
fn merged(outboxes: impl IntoIterator<Item = Outbox>) -> Outbox {
    let mut all = Outbox::default();
    for out in outboxes {
        all.messages.extend(out.messages);
        all.events.extend(out.events);
    }
    all
}

#[test]
fn test_pairing_converges_either_order() {
    for a_hears_first in [true, false] {
        let accounts = Arc::new(InMemoryAccounts::new());
        let now = Instant::now();
        let mut a = peer("a", &accounts);
        let mut b = peer("b", &accounts);
        let seek_a = a.start_seeking(5_000, Room::PublicQueue, now).expect("seek");
        let seek_b = b.start_seeking(5_000, Room::PublicQueue, now).expect("seek");

        if a_hears_first {
            let matched = deliver(&mut a, &seek_b, now);
            deliver(&mut b, &matched, now);
            // b's stale view of a's SEEKING arrives after pairing
            deliver(&mut b, &seek_a, now);
        } else {
            let matched = deliver(&mut b, &seek_a, now);
            deliver(&mut a, &matched, now);
            deliver(&mut a, &seek_b, now);
        }

        assert_eq!(a.state(), PeerState::Paired);
        assert_eq!(b.state(), PeerState::Paired);
        assert_one_of_each(&a, &b);
    }
}

#[test]
fn test_concurrent_claims_resolved_by_peer_id() {
    let accounts = Arc::new(InMemoryAccounts::new());
    let now = Instant::now();
    let mut a = peer("a", &accounts);
    let mut b = peer("b", &accounts);
    let seek_a = a.start_seeking(20_000, Room::PublicQueue, now).expect("seek");
    let seek_b = b.start_seeking(5_000, Room::PublicQueue, now).expect("seek");

    // Both hear SEEKING before any MATCHED: both claim A
    let matched_from_a = deliver(&mut a, &seek_b, now);
    let matched_from_b = deliver(&mut b, &seek_a, now);
    assert_eq!(a.role(), Some(Seat::A));
    assert_eq!(b.role(), Some(Seat::A));

    let b_out = deliver(&mut b, &matched_from_a, now);
    let a_out = deliver(&mut a, &matched_from_b, now);
    assert_eq!(b_out.events, vec![PeerEvent::RoleChanged {
        seat: Seat::B,
        wager: 20_000
    }]);
    assert!(a_out.is_empty());
    assert_one_of_each(&a, &b);
    assert_eq!(b.session().and_then(|s| s.wager()), Some(20_000));
}

#[test]
fn test_early_start_by_losing_claimant_is_undone() {
    let accounts = Arc::new(InMemoryAccounts::new());
    let now = Instant::now();
    let mut a = peer("a", &accounts);
    let mut b = peer("b", &accounts);
    let seek_a = a.start_seeking(5_000, Room::PublicQueue, now).expect("seek");
    let seek_b = b.start_seeking(5_000, Room::PublicQueue, now).expect("seek");
    let matched_from_a = deliver(&mut a, &seek_b, now);
    deliver(&mut b, &seek_a, now);

    // b starts before hearing a's claim, then loses the tie-break
    let start_from_b = b.start_game(now).expect("b starts");
    assert_eq!(balance(&accounts, "b"), STARTING_BALANCE - 5_000);
    assert!(deliver(&mut a, &start_from_b, now).is_empty());
    deliver(&mut b, &matched_from_a, now);
    assert_eq!(b.state(), PeerState::Paired);
    assert_eq!(b.role(), Some(Seat::B));
    assert_eq!(balance(&accounts, "b"), STARTING_BALANCE);

    let start_from_a = a.start_game(now).expect("a starts");
    deliver(&mut b, &start_from_a, now);
    assert_eq!(b.state(), PeerState::Playing);
    assert_eq!(balance(&accounts, "a"), STARTING_BALANCE - 5_000);
    assert_eq!(balance(&accounts, "b"), STARTING_BALANCE - 5_000);
}

#[test]
fn test_start_joins_when_matched_was_lost() {
    let accounts = Arc::new(InMemoryAccounts::new());
    let now = Instant::now();
    let mut a = peer("a", &accounts);
    let mut b = peer("b", &accounts);
    let seek_b = b.start_seeking(5_000, Room::PublicQueue, now).expect("seek");
    a.start_seeking(50_000, Room::PublicQueue, now).expect("seek");

    let _lost = deliver(&mut a, &seek_b, now);
    let start = a.start_game(now).expect("start");
    let out = deliver(&mut b, &start, now);

    assert_eq!(b.state(), PeerState::Playing);
    assert_eq!(b.role(), Some(Seat::B));
    assert!(out.events.contains(&PeerEvent::GameStarted {
        seat: Seat::B,
        wager: 50_000
    }));
    assert!(matches!(
        out.messages.as_slice(),
        [Envelope {
            payload: Payload::Ready,
            ..
        }]
    ));
}

#[test]
fn test_crossed_claims_with_immediate_start_converge() {
    let accounts = Arc::new(InMemoryAccounts::new());
    let now = Instant::now();
    let mut a = peer("a", &accounts);
    let mut b = peer("b", &accounts);
    let seek_a = a.start_seeking(5_000, Room::PublicQueue, now).expect("seek");
    let seek_b = b.start_seeking(5_000, Room::PublicQueue, now).expect("seek");

    // Both claim A and start at once, the way the orchestrator reacts to pairing
    let claim_a = deliver(&mut a, &seek_b, now);
    let claim_b = deliver(&mut b, &seek_a, now);
    let from_a = merged([claim_a, a.start_game(now).expect("a starts")]);
    let from_b = merged([claim_b, b.start_game(now).expect("b starts")]);

    // b is eager but cannot move before anyone joined
    assert!(b.submit_local_move(Coord::new(7, 7), now).is_err());
    assert!(a.submit_local_move(Coord::new(7, 7), now).is_err());

    let b_out = deliver(&mut b, &from_a, now);
    let a_out = deliver(&mut a, &from_b, now);
    assert!(a_out.is_empty());
    assert_one_of_each(&a, &b);
    assert_eq!(a.role(), Some(Seat::A));
    assert_eq!(b.state(), PeerState::Playing);
    assert!(b_out.events.contains(&PeerEvent::GameStarted {
        seat: Seat::B,
        wager: 5_000
    }));

    let joined = deliver(&mut a, &b_out, now);
    assert_eq!(joined.events, vec![PeerEvent::PartnerJoined]);
    let first = a.submit_local_move(Coord::new(7, 7), now).expect("a moves");
    let applied = deliver(&mut b, &first, now);
    assert!(matches!(applied.events.as_slice(), [PeerEvent::RemoteMove { .. }]));
    assert_eq!(balance(&accounts, "a"), STARTING_BALANCE - 5_000);
    assert_eq!(balance(&accounts, "b"), STARTING_BALANCE - 5_000);
}

#[test]
fn test_declined_stake_refunds_claimant() {
    let accounts = Arc::new(InMemoryAccounts::new());
    let now = Instant::now();
    let mut a = peer("a", &accounts);
    let mut b = peer("b", &accounts);
    accounts.withdraw("b", STARTING_BALANCE - 10_000).expect("withdraw");
    let seek_b = b.start_seeking(5_000, Room::PublicQueue, now).expect("seek");
    a.start_seeking(200_000, Room::PublicQueue, now).expect("seek");

    let claim = deliver(&mut a, &seek_b, now);
    let from_a = merged([claim, a.start_game(now).expect("start")]);
    assert_eq!(balance(&accounts, "a"), STARTING_BALANCE - 200_000);

    // b cannot cover 200,000: it declines with LEAVE and keeps seeking
    let declined = deliver(&mut b, &from_a, now);
    assert_eq!(b.state(), PeerState::Seeking);
    assert!(declined.messages.iter().all(|env| env.payload == Payload::Leave));

    let out = deliver(&mut a, &declined, now);
    assert_eq!(out.events, vec![PeerEvent::OpponentLeft {
        outcome: Outcome::Abandoned
    }]);
    assert_eq!(a.state(), PeerState::Idle);
    assert_eq!(a.session().map(|s| s.outcome()), Some(Outcome::Abandoned));
    assert_eq!(balance(&accounts, "a"), STARTING_BALANCE);
    assert_eq!(balance(&accounts, "b"), 10_000);
}

#[test]
fn test_second_claimant_is_turned_away() {
    let accounts = Arc::new(InMemoryAccounts::new());
    let now = Instant::now();
    let mut b = peer("b", &accounts);
    let mut c = peer("c", &accounts);
    let mut d = peer("d", &accounts);
    let seek_b = b.start_seeking(5_000, Room::PublicQueue, now).expect("seek");
    c.start_seeking(5_000, Room::PublicQueue, now).expect("seek");
    d.start_seeking(5_000, Room::PublicQueue, now).expect("seek");

    // c and d both hear b and both claim it
    let claim_c = deliver(&mut c, &seek_b, now);
    let claim_d = deliver(&mut d, &seek_b, now);
    let from_c = merged([claim_c, c.start_game(now).expect("c starts")]);
    let from_d = merged([claim_d, d.start_game(now).expect("d starts")]);

    let ready = deliver(&mut b, &from_c, now);
    assert_eq!(b.partner(), Some(c.id()));
    deliver(&mut c, &ready, now);
    assert!(c.partner_joined());

    let refused = deliver(&mut b, &from_d, now);
    assert_eq!(refused.messages.len(), 2);
    assert!(refused.messages.iter().all(|env| {
        env.payload == Payload::Leave && env.to.as_ref() == Some(d.id())
    }));
    assert_eq!(b.partner(), Some(c.id()));
    assert_eq!(b.state(), PeerState::Playing);

    let out = deliver(&mut d, &refused, now);
    assert_eq!(out.events, vec![PeerEvent::OpponentLeft {
        outcome: Outcome::Abandoned
    }]);
    assert_eq!(d.state(), PeerState::Idle);
    assert_eq!(balance(&accounts, "d"), STARTING_BALANCE);
    assert!(d.start_seeking(5_000, Room::PublicQueue, now).is_ok());
}

#[test]
fn test_moves_replayed_on_both_sides() {
    let accounts = Arc::new(InMemoryAccounts::new());
    let (mut a, mut b) = started(&accounts, 50_000);
    let now = Instant::now();

    let script = [
        (Seat::A, 7, 7),
        (Seat::B, 0, 0),
        (Seat::A, 7, 8),
        (Seat::B, 0, 1),
        (Seat::A, 7, 9),
        (Seat::B, 0, 2),
        (Seat::A, 7, 10),
        (Seat::B, 14, 14),
        (Seat::A, 7, 11),
    ];
    let mut last = Outbox::default();
    for (seat, row, col) in script {
        let (mover, other) = match seat {
            Seat::A => (&mut a, &mut b),
            Seat::B => (&mut b, &mut a),
        };
        let out = mover.submit_local_move(Coord::new(row, col), now).expect("legal");
        last = deliver(other, &out, now);
    }

    let won = Outcome::WonBy(Seat::A);
    assert!(last.events.contains(&PeerEvent::MatchEnded { outcome: won }));
    assert_eq!(a.state(), PeerState::Done);
    assert_eq!(b.state(), PeerState::Done);
    let (sa, sb) = (a.session().expect("a"), b.session().expect("b"));
    assert_eq!(sa.board(), sb.board());
    assert_eq!(sb.outcome(), won);
    assert_eq!(balance(&accounts, "a"), STARTING_BALANCE + 40_000);
    assert_eq!(balance(&accounts, "b"), STARTING_BALANCE - 50_000);
}

#[test]
fn test_illegal_local_move_is_not_sent() {
    let accounts = Arc::new(InMemoryAccounts::new());
    let (mut a, _b) = started(&accounts, 5_000);
    let now = Instant::now();

    assert!(matches!(
        a.submit_local_move(Coord::new(15, 0), Instant::now()),
        Err(ProtocolError::Session(_))
    ));
    a.submit_local_move(Coord::new(7, 7), now).expect("legal");
    // Not our turn any more
    assert!(a.submit_local_move(Coord::new(7, 8), now).is_err());
    assert_eq!(a.session().map(|s| s.history().len()), Some(1));
}

#[test]
fn test_leave_is_a_forfeit_win() {
    let accounts = Arc::new(InMemoryAccounts::new());
    let (mut a, mut b) = started(&accounts, 20_000);
    let now = Instant::now();
    let first = a.submit_local_move(Coord::new(7, 7), now).expect("legal");
    deliver(&mut b, &first, now);

    let leaving = b.cancel(now);
    assert!(leaving.events.contains(&PeerEvent::Cancelled));
    assert!(matches!(
        leaving.messages.as_slice(),
        [Envelope {
            payload: Payload::Leave,
            ..
        }]
    ));
    assert_eq!(b.state(), PeerState::Idle);

    let out = deliver(&mut a, &leaving, now);
    assert_eq!(out.events, vec![PeerEvent::OpponentLeft {
        outcome: Outcome::WonBy(Seat::A)
    }]);
    assert_eq!(a.state(), PeerState::Done);
    assert_eq!(balance(&accounts, "a"), STARTING_BALANCE + 16_000);
    assert_eq!(balance(&accounts, "b"), STARTING_BALANCE - 20_000);
}

#[test]
fn test_desync_abandons_and_refunds() {
    let accounts = Arc::new(InMemoryAccounts::new());
    let (mut a, mut b) = started(&accounts, 5_000);
    let now = Instant::now();
    let first = a.submit_local_move(Coord::new(7, 7), now).expect("legal");
    deliver(&mut b, &first, now);

    // A second A move while B is to move: the sessions have diverged
    let rogue = Envelope::addressed(
        a.id().clone(),
        b.id().clone(),
        Payload::Move {
            row: 3,
            col: 3,
            mark: Seat::A,
        },
    );
    let out = b.receive(rogue, now);

    assert!(matches!(
        out.events.as_slice(),
        [PeerEvent::Aborted {
            error: ProtocolError::Desync(_)
        }]
    ));
    assert_eq!(b.state(), PeerState::Idle);
    let session = b.session().expect("kept for viewing");
    assert_eq!(session.phase(), SessionPhase::Resolved);
    assert_eq!(session.outcome(), Outcome::Abandoned);
    assert_eq!(balance(&accounts, "b"), STARTING_BALANCE);

    // Back to matchmaking
    assert!(b.start_seeking(5_000, Room::PublicQueue, now).is_ok());
}

#[test]
fn test_leave_before_start_returns_to_idle() {
    let accounts = Arc::new(InMemoryAccounts::new());
    let now = Instant::now();
    let mut a = peer("a", &accounts);
    let mut b = peer("b", &accounts);
    let seek_b = b.start_seeking(5_000, Room::PublicQueue, now).expect("seek");
    a.start_seeking(5_000, Room::PublicQueue, now).expect("seek");
    let matched = deliver(&mut a, &seek_b, now);
    deliver(&mut b, &matched, now);

    let leaving = b.cancel(now);
    let out = deliver(&mut a, &leaving, now);
    assert_eq!(out.events, vec![PeerEvent::OpponentLeft {
        outcome: Outcome::Unresolved
    }]);
    assert_eq!(a.state(), PeerState::Idle);
    assert_eq!(balance(&accounts, "a"), STARTING_BALANCE);
}

fn fast_timings() -> PeerTimings {
    PeerTimings {
        seek_interval: Duration::from_millis(20),
        seek_timeout: Duration::from_secs(10),
        stall_timeout: Duration::from_secs(10),
    }
}

async fn duel<T>(hub: Arc<T>, room: Room) -> (Outcome, Outcome, Arc<InMemoryAccounts>)
where
    T: gomoku_royale::RoomTransport + 'static,
{
    let accounts = Arc::new(InMemoryAccounts::new());
    let mut handles = Vec::new();
    for name in ["east", "west"] {
        let protocol = PeerProtocol::new(PeerId::generate(), name, accounts.clone())
            .with_timings(fast_timings());
        let mut client = PeerClient::new(protocol, hub.clone());
        let mut player = ComputerPlayer::new(name, MoveAdvisor::heuristic_only());
        let room = room.clone();
        handles.push(tokio::spawn(async move {
            let (tx, _rx) = mpsc::unbounded_channel::<MatchEvent>();
            run_peer_match(&mut client, &mut player, 5_000, room, &tx).await
        }));
    }

    let mut outcomes = Vec::new();
    for handle in handles {
        let outcome = tokio::time::timeout(Duration::from_secs(30), handle)
            .await
            .expect("duel finishes")
            .expect("task joins")
            .expect("match runs");
        outcomes.push(outcome);
    }
    (outcomes[0], outcomes[1], accounts)
}

#[tokio::test]
async fn test_duel_over_local_hub() {
    let room = Room::Code(RoomCode::parse("4242").expect("code"));
    let (east, west, accounts) = duel(Arc::new(LocalHub::new()), room).await;

    assert_eq!(east, west);
    let total = balance(&accounts, "east") + balance(&accounts, "west");
    match east {
        Outcome::WonBy(_) => assert_eq!(total, 2 * STARTING_BALANCE - 1_000),
        Outcome::Draw => assert_eq!(total, 2 * STARTING_BALANCE),
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_duel_survives_lost_matched() {
    let hub = LossyHub::new(LocalHub::new(), |env: &Envelope| {
        matches!(env.payload, Payload::Matched { .. })
    });
    let (east, west, _) = duel(Arc::new(hub), Room::PublicQueue).await;
    assert_eq!(east, west);
    assert_ne!(east, Outcome::Abandoned);
}
