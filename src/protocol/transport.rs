//! Room-scoped broadcast channels.
//!
//! Delivery is best effort: at most once, ordered per sender, unordered
//! across senders. Nothing above this layer may assume a message arrived.

use super::ProtocolError;
use super::message::{Envelope, Room};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

/// Messages buffered per room before slow receivers start lagging.
const ROOM_CAPACITY: usize = 256;

/// Opens channels scoped to a room.
#[async_trait]
pub trait RoomTransport: Send + Sync + std::fmt::Debug {
    /// Joins `room`. Dropping the returned channel leaves it.
    async fn open(&self, room: &Room) -> Result<Box<dyn RoomChannel>, ProtocolError>;
}

/// One peer's membership of a room.
#[async_trait]
pub trait RoomChannel: Send + Sync + std::fmt::Debug {
    /// Sends to every member of the room, the sender included.
    async fn publish(&self, envelope: &Envelope) -> Result<(), ProtocolError>;

    /// Waits for the next message.
    async fn recv(&mut self) -> Result<Envelope, ProtocolError>;
}

/// In-process transport: one broadcast channel of JSON text per room.
#[derive(Debug, Clone, Default)]
pub struct LocalHub {
    rooms: Arc<Mutex<HashMap<Room, broadcast::Sender<String>>>>,
}

impl LocalHub {
    /// Creates a hub with no rooms.
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, room: &Room) -> broadcast::Sender<String> {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        rooms
            .entry(room.clone())
            .or_insert_with(|| {
                info!(%room, "Opening room");
                broadcast::channel(ROOM_CAPACITY).0
            })
            .clone()
    }
}

#[async_trait]
impl RoomTransport for LocalHub {
    #[instrument(skip(self))]
    async fn open(&self, room: &Room) -> Result<Box<dyn RoomChannel>, ProtocolError> {
        let sender = self.sender(room);
        let receiver = sender.subscribe();
        debug!(%room, members = sender.receiver_count(), "Joined room");
        Ok(Box::new(LocalChannel {
            room: room.clone(),
            sender,
            receiver,
        }))
    }
}

/// Channel handed out by [`LocalHub`].
#[derive(Debug)]
pub struct LocalChannel {
    room: Room,
    sender: broadcast::Sender<String>,
    receiver: broadcast::Receiver<String>,
}

#[async_trait]
impl RoomChannel for LocalChannel {
    async fn publish(&self, envelope: &Envelope) -> Result<(), ProtocolError> {
        let text = envelope.encode()?;
        // A send error only means nobody is listening, which is fine here
        if self.sender.send(text).is_err() {
            debug!(room = %self.room, kind = envelope.payload.kind(), "Published to empty room");
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Envelope, ProtocolError> {
        loop {
            match self.receiver.recv().await {
                Ok(text) => match Envelope::decode(&text) {
                    Ok(envelope) => return Ok(envelope),
                    Err(e) => warn!(room = %self.room, error = %e, "Dropping undecodable message"),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(room = %self.room, skipped, "Receiver lagged; messages lost");
                }
                Err(broadcast::error::RecvError::Closed) => return Err(ProtocolError::ChannelClosed),
            }
        }
    }
}

/// Decides whether a published message is silently lost.
pub type DropFilter = Arc<dyn Fn(&Envelope) -> bool + Send + Sync>;

/// Transport wrapper that loses the messages a filter selects.
///
/// Useful for exercising the protocol against the delivery guarantees it
/// is supposed to tolerate.
#[derive(Clone)]
pub struct LossyHub<T> {
    inner: T,
    drop_if: DropFilter,
}

impl<T: std::fmt::Debug> std::fmt::Debug for LossyHub<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LossyHub").field("inner", &self.inner).finish_non_exhaustive()
    }
}

impl<T: RoomTransport> LossyHub<T> {
    /// Wraps `inner`, dropping every published message for which `drop_if` is true.
    pub fn new(inner: T, drop_if: impl Fn(&Envelope) -> bool + Send + Sync + 'static) -> Self {
        Self {
            inner,
            drop_if: Arc::new(drop_if),
        }
    }
}

#[async_trait]
impl<T: RoomTransport> RoomTransport for LossyHub<T> {
    async fn open(&self, room: &Room) -> Result<Box<dyn RoomChannel>, ProtocolError> {
        let inner = self.inner.open(room).await?;
        Ok(Box::new(LossyChannel {
            inner,
            drop_if: self.drop_if.clone(),
        }))
    }
}

struct LossyChannel {
    inner: Box<dyn RoomChannel>,
    drop_if: DropFilter,
}

impl std::fmt::Debug for LossyChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LossyChannel").field("inner", &self.inner).finish_non_exhaustive()
    }
}

#[async_trait]
impl RoomChannel for LossyChannel {
    async fn publish(&self, envelope: &Envelope) -> Result<(), ProtocolError> {
        if (self.drop_if)(envelope) {
            debug!(kind = envelope.payload.kind(), from = %envelope.from, "Message lost");
            return Ok(());
        }
        self.inner.publish(envelope).await
    }

    async fn recv(&mut self) -> Result<Envelope, ProtocolError> {
        self.inner.recv().await
    }
}
