//! Match orchestration: drives a [`Player`] through a local or peer match.

use crate::games::gomoku::{Coord, Move, Outcome, Seat};
use crate::players::Player;
use crate::protocol::{PeerClient, PeerEvent, PeerState, ProtocolError, Room};
use crate::session::{MatchSession, SessionError};
use crate::wager::Amount;
use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Messages sent from the orchestrator to the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchEvent {
    /// Something happened in the peer protocol.
    Protocol(PeerEvent),
    /// A seat is choosing its move.
    Thinking {
        /// Seat to move.
        seat: Seat,
    },
    /// A move was applied.
    MovePlayed {
        /// Seat that moved.
        seat: Seat,
        /// Where.
        coord: Coord,
    },
    /// The local player's move was rejected; they choose again.
    IllegalMove {
        /// Rejected cell.
        coord: Coord,
        /// Why.
        reason: String,
    },
    /// Rendered board after a change.
    Board(String),
    /// The match is over.
    Finished {
        /// Final outcome.
        outcome: Outcome,
    },
}

fn emit(events: &mpsc::UnboundedSender<MatchEvent>, event: MatchEvent) {
    if events.send(event).is_err() {
        debug!("Event receiver dropped");
    }
}

/// Plays a started session against the computer until it resolves.
///
/// The computer's replies come from the session's own advisor.
#[instrument(skip_all, fields(session = %session.id(), player = %player.name()))]
pub async fn run_local_match(
    session: &mut MatchSession,
    player: &mut dyn Player,
    events: &mpsc::UnboundedSender<MatchEvent>,
) -> Result<Outcome> {
    info!("Starting local match");
    emit(events, MatchEvent::Board(session.board().render()));

    while let Some(seat) = session.to_move() {
        if !session.is_local_turn() {
            emit(events, MatchEvent::Thinking { seat });
            let Some((advice, _)) = session.computer_turn().await? else {
                anyhow::bail!("Computer could not find a move");
            };
            emit(events, MatchEvent::MovePlayed {
                seat,
                coord: advice.coord,
            });
            emit(events, MatchEvent::Board(session.board().render()));
            continue;
        }

        emit(events, MatchEvent::Thinking { seat });
        let board = session.board().clone();
        let coord = match player.choose_move(&board, seat).await {
            Ok(coord) => coord,
            Err(e) => {
                warn!(error = %e, "Player gave up; surrendering");
                session.surrender()?;
                break;
            }
        };

        // Local move only; the computer answers on the next pass
        match session.submit_move(Move::new(seat, coord)) {
            Ok(_) => {
                emit(events, MatchEvent::MovePlayed { seat, coord });
                emit(events, MatchEvent::Board(session.board().render()));
            }
            Err(SessionError::Move(reason)) => emit(events, MatchEvent::IllegalMove {
                coord,
                reason: reason.to_string(),
            }),
            Err(e) => return Err(e.into()),
        }
    }

    let outcome = session.outcome();
    info!(%outcome, "Local match finished");
    emit(events, MatchEvent::Finished { outcome });
    Ok(outcome)
}

/// Seeks a partner in `room` and plays one peer match to its end.
///
/// Returns `Outcome::Abandoned` when the peers desynchronized (stakes are
/// refunded). A partner leaving before it joined sends this peer back to
/// seeking.
#[instrument(skip_all, fields(peer = %client.protocol().id(), wager = wager, room = %room))]
pub async fn run_peer_match(
    client: &mut PeerClient,
    player: &mut dyn Player,
    wager: Amount,
    room: Room,
    events: &mpsc::UnboundedSender<MatchEvent>,
) -> Result<Outcome> {
    client.seek(wager, room.clone()).await?;

    loop {
        if let Some(seat) = local_turn(client) {
            emit(events, MatchEvent::Thinking { seat });
            let board = client
                .protocol()
                .session()
                .map(|s| s.board().clone())
                .unwrap_or_default();

            // Inbound traffic preempts the local choice
            tokio::select! {
                biased;
                event = client.next_event() => {
                    if let Some(outcome) = handle_event(client, event?, wager, &room, events).await? {
                        return Ok(outcome);
                    }
                }
                choice = player.choose_move(&board, seat) => {
                    let coord = match choice {
                        Ok(coord) => coord,
                        Err(e) => {
                            warn!(error = %e, "Player gave up; leaving match");
                            client.cancel().await?;
                            return Err(e);
                        }
                    };
                    play_local(client, seat, coord, events).await?;
                }
            }
            continue;
        }

        let event = client.next_event().await?;
        if let Some(outcome) = handle_event(client, event, wager, &room, events).await? {
            return Ok(outcome);
        }
    }
}

fn local_turn(client: &PeerClient) -> Option<Seat> {
    let protocol = client.protocol();
    if protocol.state() != PeerState::Playing || !protocol.partner_joined() {
        return None;
    }
    protocol
        .session()
        .filter(|s| s.is_local_turn())
        .map(MatchSession::local_seat)
}

async fn play_local(
    client: &mut PeerClient,
    seat: Seat,
    coord: Coord,
    events: &mpsc::UnboundedSender<MatchEvent>,
) -> Result<()> {
    match client.play(coord).await {
        Ok(()) => {}
        Err(ProtocolError::Session(SessionError::Move(reason))) => {
            emit(events, MatchEvent::IllegalMove {
                coord,
                reason: reason.to_string(),
            });
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    emit(events, MatchEvent::MovePlayed { seat, coord });
    if let Some(session) = client.protocol().session() {
        emit(events, MatchEvent::Board(session.board().render()));
    }
    Ok(())
}

async fn handle_event(
    client: &mut PeerClient,
    event: PeerEvent,
    wager: Amount,
    room: &Room,
    events: &mpsc::UnboundedSender<MatchEvent>,
) -> Result<Option<Outcome>> {
    emit(events, MatchEvent::Protocol(event.clone()));

    match event {
        PeerEvent::Paired { seat: Seat::A, .. } => {
            let protocol = client.protocol();
            if protocol.state() == PeerState::Paired && protocol.role() == Some(Seat::A) {
                client.start_game().await?;
            }
        }
        PeerEvent::Paired { .. } | PeerEvent::RoleChanged { .. } => {}
        PeerEvent::PartnerJoined => debug!("Partner joined; first move may be played"),
        PeerEvent::GameStarted { .. } => {
            if let Some(session) = client.protocol().session() {
                emit(events, MatchEvent::Board(session.board().render()));
            }
        }
        PeerEvent::RemoteMove { mv, .. } => {
            emit(events, MatchEvent::MovePlayed {
                seat: mv.seat,
                coord: mv.coord,
            });
            if let Some(session) = client.protocol().session() {
                emit(events, MatchEvent::Board(session.board().render()));
            }
        }
        PeerEvent::MatchEnded { outcome } => {
            emit(events, MatchEvent::Finished { outcome });
            return Ok(Some(outcome));
        }
        PeerEvent::OpponentLeft {
            outcome: Outcome::Unresolved | Outcome::Abandoned,
        } => {
            info!("Partner left before joining; seeking again");
            client.seek(wager, room.clone()).await?;
        }
        PeerEvent::OpponentLeft { outcome } => {
            emit(events, MatchEvent::Finished { outcome });
            return Ok(Some(outcome));
        }
        PeerEvent::Aborted { error } => {
            warn!(%error, "Match abandoned");
            emit(events, MatchEvent::Finished {
                outcome: Outcome::Abandoned,
            });
            return Ok(Some(Outcome::Abandoned));
        }
        PeerEvent::Stalled { waited } => {
            warn!(waited_secs = waited.as_secs(), "Still waiting on partner");
        }
        PeerEvent::SeekTimedOut => anyhow::bail!("No opponent found in {}", room),
        PeerEvent::Cancelled => anyhow::bail!("Match cancelled"),
    }
    Ok(None)
}
