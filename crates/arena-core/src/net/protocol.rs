//! Wire envelope carried over the host's UDP transport: a `PacketHeader`/
//! `PacketType` pair framing inbound commands and outbound snapshot traffic.
//!
//! The core itself never touches this module — `Match` only knows
//! [`crate::match_::InboundMessage`]/[`OutboundMessage`]; this is the
//! transport-layer encoding `arena-server` uses to move those across a
//! socket. Kept in `arena-core` (rather than the server crate) because the
//! client side of a future bot/spectator also needs to speak it.

use rkyv::{Archive, Deserialize, Serialize, rancor};

use crate::entity::Side;
use crate::event::EventId;
use crate::input::InputEnvelope;
use crate::match_::{EntityAssignment, PlayerId};
use crate::snapshot::{FullStateSnapshot, StateUpdate};

pub const MAX_PACKET_SIZE: usize = 1200;
pub const PROTOCOL_VERSION: u32 = 1;
pub const PROTOCOL_MAGIC: u32 = 0x4152_454E; // "AREN"
pub const DEFAULT_PORT: u16 = 27115;
pub const DEFAULT_TICK_RATE: u32 = 125;

const SEQUENCE_WRAP_THRESHOLD: u32 = u32::MAX / 2;

/// Sequence-wraparound-aware comparison: is `s1` logically newer than `s2`?
#[inline]
pub fn sequence_greater_than(s1: u32, s2: u32) -> bool {
    ((s1 > s2) && (s1 - s2 <= SEQUENCE_WRAP_THRESHOLD)) || ((s1 < s2) && (s2 - s1 > SEQUENCE_WRAP_THRESHOLD))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct PacketHeader {
    pub magic: u32,
    pub version: u32,
    pub sequence: u32,
    pub ack: u32,
    pub ack_bitfield: u32,
}

impl PacketHeader {
    pub fn new(sequence: u32, ack: u32, ack_bitfield: u32) -> Self {
        Self { magic: PROTOCOL_MAGIC, version: PROTOCOL_VERSION, sequence, ack, ack_bitfield }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }
}

/// Every payload this protocol carries. Client-originated and
/// server-originated variants share one enum, since both directions flow
/// over the same socket and the same ack/sequence machinery.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum PacketType {
    /// Connect-handshake over a salt exchange. No cryptographic guarantee
    /// is implied — this is liveness/identity bookkeeping only.
    ConnectionRequest { client_salt: u64 },
    ConnectionChallenge { server_salt: u64, challenge: u64 },
    ChallengeResponse { combined_salt: u64 },
    ConnectionAccepted { player_id: u32 },
    ConnectionDenied { reason: String },

    Ping { timestamp: u64 },
    Pong { timestamp: u64 },
    /// Transport-level disconnect notice, distinct from the core's
    /// `InboundMessage::Disconnect` (which the host emits into the match
    /// once it has mapped this socket to a `PlayerId`).
    Disconnect,

    ClientReady,
    ClientInput(InputEnvelope),
    ClientEventAck { last_event_id: u64 },

    ServerGameStart { assignments: Vec<EntityAssignment> },
    ServerFullSnapshot(FullStateSnapshot),
    ServerStateUpdate(StateUpdate),
    ServerGameEnd { winning_side: Side },
    ServerError { detail: String },
}

impl PacketType {
    pub fn event_ack(last_event_id: EventId) -> Self {
        PacketType::ClientEventAck { last_event_id: last_event_id.0 }
    }
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: PacketType,
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
}

impl Packet {
    pub fn new(header: PacketHeader, payload: PacketType) -> Self {
        Self { header, payload }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        rkyv::to_bytes::<rancor::Error>(self).map(|aligned| aligned.into_vec()).map_err(PacketError::Serialize)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, PacketError> {
        rkyv::from_bytes::<Self, rancor::Error>(data).map_err(PacketError::Deserialize)
    }

    pub fn access_archived(data: &[u8]) -> Result<&ArchivedPacket, PacketError> {
        rkyv::access::<ArchivedPacket, rancor::Error>(data).map_err(PacketError::Deserialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_comparison_handles_wraparound() {
        assert!(sequence_greater_than(2, 1));
        assert!(!sequence_greater_than(1, 2));
        assert!(sequence_greater_than(0, u32::MAX));
        assert!(!sequence_greater_than(u32::MAX, 0));
    }

    #[test]
    fn packet_round_trips() {
        let header = PacketHeader::new(1, 0, 0);
        let packet = Packet::new(header, PacketType::Ping { timestamp: 12345 });

        let bytes = packet.serialize().unwrap();
        let decoded = Packet::deserialize(&bytes).unwrap();

        assert_eq!(packet.header, decoded.header);
        assert!(matches!(decoded.payload, PacketType::Ping { timestamp: 12345 }));
    }

    #[test]
    fn rejects_wrong_magic_header() {
        let mut header = PacketHeader::new(0, 0, 0);
        header.magic = 0xdead_beef;
        assert!(!header.is_valid());
    }
}
