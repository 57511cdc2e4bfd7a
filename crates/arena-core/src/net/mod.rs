//! UDP-style unreliable-ordered transport: packet framing, connection/session
//! bookkeeping, and the ack/RTT machinery the reliable event sub-channel
//! (`crate::event::reliable`) builds on.

mod connection;
mod endpoint;
mod protocol;
mod stats;
mod tracking;

pub use connection::{ClientConnection, ConnectionManager, ConnectionState};
pub use endpoint::NetworkEndpoint;
pub use protocol::{
    ArchivedPacket, DEFAULT_PORT, DEFAULT_TICK_RATE, MAX_PACKET_SIZE, PROTOCOL_MAGIC, PROTOCOL_VERSION, Packet,
    PacketError, PacketHeader, PacketType, sequence_greater_than,
};
pub use stats::{NetworkStats, PacketLossSimulation};
pub use tracking::{AckTracker, PendingPacket, ReceiveTracker};
