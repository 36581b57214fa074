//! Async shell around [`PeerProtocol`]: owns the room channel and the clock.

use super::ProtocolError;
use super::message::Room;
use super::peer::{Outbox, PeerEvent, PeerProtocol, PeerState};
use super::transport::{RoomChannel, RoomTransport};
use crate::games::gomoku::Coord;
use crate::wager::Amount;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

/// Upper bound on how long the client sleeps between protocol ticks.
const MAX_TICK: Duration = Duration::from_millis(250);

/// One peer connected to a room transport.
#[derive(Debug)]
pub struct PeerClient {
    protocol: PeerProtocol,
    transport: Arc<dyn RoomTransport>,
    channel: Option<Box<dyn RoomChannel>>,
    pending: VecDeque<PeerEvent>,
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}

impl PeerClient {
    /// Wraps a protocol core and the transport it will use.
    pub fn new(protocol: PeerProtocol, transport: Arc<dyn RoomTransport>) -> Self {
        Self {
            protocol,
            transport,
            channel: None,
            pending: VecDeque::new(),
        }
    }

    /// Joins `room` and starts seeking at `wager`.
    #[instrument(skip(self), fields(peer = %self.protocol.id()))]
    pub async fn seek(&mut self, wager: Amount, room: Room) -> Result<(), ProtocolError> {
        let outbox = self.protocol.start_seeking(wager, room.clone(), now())?;
        match self.transport.open(&room).await {
            Ok(channel) => self.channel = Some(channel),
            Err(e) => {
                self.protocol.cancel(now());
                return Err(e);
            }
        }
        info!(%room, "Joined room");
        self.flush(outbox).await
    }

    /// Seat A opens the game.
    pub async fn start_game(&mut self) -> Result<(), ProtocolError> {
        let outbox = self.protocol.start_game(now())?;
        self.flush(outbox).await
    }

    /// Plays a local move.
    pub async fn play(&mut self, coord: Coord) -> Result<(), ProtocolError> {
        let outbox = self.protocol.submit_local_move(coord, now())?;
        self.flush(outbox).await
    }

    /// Cancels seeking or leaves the match.
    pub async fn cancel(&mut self) -> Result<(), ProtocolError> {
        let outbox = self.protocol.cancel(now());
        self.flush(outbox).await
    }

    /// Waits for the next protocol event.
    ///
    /// Drives the channel and the timers until something happens. Fails
    /// with `InvalidState` when idle with nothing queued.
    pub async fn next_event(&mut self) -> Result<PeerEvent, ProtocolError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(event);
            }

            let tick = self.protocol.timings().seek_interval.min(MAX_TICK);
            let channel = self.channel.as_mut().ok_or(ProtocolError::InvalidState {
                operation: "next_event",
                state: self.protocol.state(),
            })?;

            let outbox = tokio::select! {
                received = channel.recv() => self.protocol.receive(received?, now()),
                _ = tokio::time::sleep(tick) => self.protocol.tick(now()),
            };
            self.flush(outbox).await?;
        }
    }

    async fn flush(&mut self, outbox: Outbox) -> Result<(), ProtocolError> {
        if let Some(channel) = self.channel.as_ref() {
            for envelope in &outbox.messages {
                debug!(kind = envelope.payload.kind(), to = ?envelope.to, "Publishing");
                channel.publish(envelope).await?;
            }
        }
        self.pending.extend(outbox.events);

        if self.protocol.state() == PeerState::Idle && self.channel.take().is_some() {
            debug!("Left room");
        }
        Ok(())
    }

    /// The protocol core.
    pub fn protocol(&self) -> &PeerProtocol {
        &self.protocol
    }
}
