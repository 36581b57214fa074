//! Peer synchronization for human-vs-human matches.
//!
//! There is no referee. Each peer runs its own session, pairs through a
//! shared room, and replays the other side's moves. [`PeerProtocol`] holds
//! every rule and never touches I/O; [`PeerClient`] wires it to a
//! [`RoomTransport`] and a clock.

mod client;
mod message;
mod peer;
mod transport;

pub use client::PeerClient;
pub use message::{Envelope, Payload, PeerId, Room, RoomCode};
pub use peer::{MatchTicket, Outbox, PeerEvent, PeerProtocol, PeerState, PeerTimings};
pub use transport::{DropFilter, LocalChannel, LocalHub, LossyHub, RoomChannel, RoomTransport};

use crate::session::SessionError;
use derive_more::Display;

/// Error from the peer protocol.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum ProtocolError {
    /// The two peers no longer agree on the match; fatal to it.
    #[display("Protocol desync: {}", _0)]
    Desync(String),

    /// The operation does not apply in the current peer state.
    #[display("{} is not allowed while {}", operation, state)]
    InvalidState {
        /// Operation attempted.
        operation: &'static str,
        /// State the peer was in.
        state: PeerState,
    },

    /// The room channel went away.
    #[display("Room channel closed")]
    ChannelClosed,

    /// A message could not be encoded or decoded.
    #[display("Codec error: {}", _0)]
    Codec(String),

    /// Room codes are exactly four digits.
    #[display("Invalid room code {:?}", _0)]
    InvalidRoomCode(String),

    /// The local session refused the operation.
    #[display("{}", _0)]
    Session(SessionError),
}

impl From<SessionError> for ProtocolError {
    fn from(e: SessionError) -> Self {
        ProtocolError::Session(e)
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::Session(e) => Some(e),
            _ => None,
        }
    }
}
