//! Host-observable connection lifecycle events, drained by `main` for
//! logging/TUI display. Distinct from `arena_core::GameEvent` (gameplay
//! events inside a match) and from `InboundMessage`/`OutboundMessage` (the
//! core's wire contract) — this is transport-layer bookkeeping local to this
//! binary.

use std::net::SocketAddr;

use arena_core::{PlayerId, Side};

#[derive(Debug, Clone)]
pub enum ServerEvent {
    ClientConnecting { addr: SocketAddr },
    ClientConnected { player: PlayerId, addr: SocketAddr, side: Side },
    ClientDisconnected { player: PlayerId, reason: DisconnectReason },
    ConnectionDenied { addr: SocketAddr, reason: String },
    Error { message: String },
}

#[derive(Debug, Clone, Copy)]
pub enum DisconnectReason {
    Graceful,
    Timeout,
    Kicked,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Graceful => "disconnected",
            DisconnectReason::Timeout => "timed out",
            DisconnectReason::Kicked => "kicked",
        }
    }
}
