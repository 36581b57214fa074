//! Wire messages exchanged between peers in a room.

use super::ProtocolError;
use crate::games::gomoku::{Board, Coord, Move, Seat};
use crate::wager::Amount;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier a peer stamps on every message it sends.
///
/// Ordering is plain string ordering; the role tie-break relies on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

static NEXT_PEER: AtomicU64 = AtomicU64::new(0);

impl PeerId {
    /// Wraps an explicit identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates an identifier unique within this process and unlikely to
    /// collide across processes.
    pub fn generate() -> Self {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let counter = NEXT_PEER.fetch_add(1, Ordering::Relaxed);
        Self(format!("peer-{:x}-{}-{}", nanos, std::process::id(), counter))
    }

    /// Returns the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Four-digit private room code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Validates a room code: exactly four ASCII digits.
    pub fn parse(code: &str) -> Result<Self, ProtocolError> {
        if code.len() == 4 && code.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(code.to_string()))
        } else {
            Err(ProtocolError::InvalidRoomCode(code.to_string()))
        }
    }

    /// Returns the code text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomCode {
    type Error = ProtocolError;

    fn try_from(code: String) -> Result<Self, Self::Error> {
        Self::parse(&code)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

/// Where a peer looks for an opponent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Room {
    /// Anyone seeking without a code.
    #[default]
    PublicQueue,
    /// Only peers that entered the same code.
    Code(RoomCode),
}

impl Room {
    /// Public queue for `None`, private room otherwise.
    pub fn from_code(code: Option<&str>) -> Result<Self, ProtocolError> {
        code.map_or(Ok(Room::PublicQueue), |code| RoomCode::parse(code).map(Room::Code))
    }
}

impl std::fmt::Display for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Room::PublicQueue => write!(f, "public"),
            Room::Code(code) => write!(f, "room-{}", code.as_str()),
        }
    }
}

/// Message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Payload {
    /// Looking for an opponent at this stake.
    Seeking {
        /// Stake the sender wants to play for.
        wager: Amount,
    },
    /// Reply to a SEEKING: the sender claims seat A at this stake.
    Matched {
        /// Stake the sender will play for.
        wager: Amount,
    },
    /// Seat A opens the game.
    Start {
        /// Position play starts from.
        initial_board: Board,
        /// Stake, repeated so a peer that missed MATCHED can still join.
        wager: Amount,
    },
    /// A stone was placed.
    Move {
        /// Row index.
        row: u8,
        /// Column index.
        col: u8,
        /// Seat that played.
        mark: Seat,
    },
    /// Seat B has staked and joined the game the addressee started.
    Ready,
    /// The sender is leaving the match.
    Leave,
}

impl Payload {
    /// Builds a MOVE payload.
    pub fn from_move(mv: Move) -> Self {
        Payload::Move {
            row: mv.coord.row,
            col: mv.coord.col,
            mark: mv.seat,
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Seeking { .. } => "SEEKING",
            Payload::Matched { .. } => "MATCHED",
            Payload::Start { .. } => "START",
            Payload::Move { .. } => "MOVE",
            Payload::Ready => "READY",
            Payload::Leave => "LEAVE",
        }
    }
}

/// A payload with its sender and optional addressee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Sending peer.
    pub from: PeerId,
    /// Intended recipient; `None` for room broadcasts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<PeerId>,
    /// Message body.
    pub payload: Payload,
}

impl Envelope {
    /// A message for everybody in the room.
    pub fn broadcast(from: PeerId, payload: Payload) -> Self {
        Self { from, to: None, payload }
    }

    /// A message for one peer.
    pub fn addressed(from: PeerId, to: PeerId, payload: Payload) -> Self {
        Self {
            from,
            to: Some(to),
            payload,
        }
    }

    /// True when `peer` should look at this message.
    pub fn is_for(&self, peer: &PeerId) -> bool {
        self.to.as_ref().is_none_or(|to| to == peer)
    }

    /// The move carried by a MOVE payload.
    pub fn as_move(&self) -> Option<Move> {
        match self.payload {
            Payload::Move { row, col, mark } => Some(Move::new(mark, Coord::new(row, col))),
            _ => None,
        }
    }

    /// Serializes to JSON text.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Codec(e.to_string()))
    }

    /// Parses JSON text.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Codec(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let env = Envelope::broadcast(PeerId::new("p1"), Payload::Seeking { wager: 5_000 });
        let json: serde_json::Value =
            serde_json::from_str(&env.encode().expect("encode")).expect("json");
        assert_eq!(json["from"], "p1");
        assert_eq!(json["payload"]["kind"], "SEEKING");
        assert_eq!(json["payload"]["wager"], 5_000);
        assert!(json.get("to").is_none());

        let ready = Envelope::addressed(PeerId::new("b"), PeerId::new("a"), Payload::Ready);
        let json: serde_json::Value =
            serde_json::from_str(&ready.encode().expect("encode")).expect("json");
        assert_eq!(json["payload"]["kind"], "READY");
        assert_eq!(json["to"], "a");
    }

    #[test]
    fn test_start_carries_board_rows() {
        let board = Board::new().apply_move(Move::at(Seat::A, 0, 1)).expect("legal");
        let env = Envelope::addressed(
            PeerId::new("a"),
            PeerId::new("b"),
            Payload::Start {
                initial_board: board.clone(),
                wager: 20_000,
            },
        );
        let decoded = Envelope::decode(&env.encode().expect("encode")).expect("decode");
        assert_eq!(decoded, env);
        assert!(decoded.is_for(&PeerId::new("b")));
        assert!(!decoded.is_for(&PeerId::new("c")));
    }

    #[test]
    fn test_garbage_is_codec_error() {
        assert!(matches!(Envelope::decode("{nope"), Err(ProtocolError::Codec(_))));
    }

    #[test]
    fn test_room_codes() {
        assert!(RoomCode::parse("0420").is_ok());
        assert!(RoomCode::parse("42").is_err());
        assert!(RoomCode::parse("12a4").is_err());
        assert_eq!(Room::from_code(None).expect("public"), Room::PublicQueue);
    }
}
