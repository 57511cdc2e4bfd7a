//! Per-socket connection bookkeeping: handshake state, timeouts, and the
//! address<->player mapping a host uses to route packets into `Match`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use super::stats::{PacketLossSimulation, rand_u64};
use super::tracking::ReceiveTracker;
use crate::match_::PlayerId;

const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    ChallengeResponse,
    Connected,
    Disconnecting,
}

#[derive(Debug)]
pub struct ClientConnection {
    pub addr: SocketAddr,
    pub player_id: PlayerId,
    pub state: ConnectionState,
    pub client_salt: u64,
    pub server_salt: u64,
    pub last_input_seq_acked: u32,
    pub last_receive_time: Instant,
    pub receive_tracker: ReceiveTracker,
    pub send_sequence: u32,
    pub packet_loss_sim: PacketLossSimulation,
}

impl ClientConnection {
    pub fn new(addr: SocketAddr, player_id: PlayerId, client_salt: u64) -> Self {
        Self {
            addr,
            player_id,
            state: ConnectionState::Connecting,
            client_salt,
            server_salt: rand_u64(),
            last_input_seq_acked: 0,
            last_receive_time: Instant::now(),
            receive_tracker: ReceiveTracker::new(),
            send_sequence: 0,
            packet_loss_sim: PacketLossSimulation::default(),
        }
    }

    pub fn combined_salt(&self) -> u64 {
        self.client_salt ^ self.server_salt
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_receive_time.elapsed() > timeout
    }

    pub fn touch(&mut self) {
        self.last_receive_time = Instant::now();
    }
}

/// Maps player identities to sockets for one match's worth of connections.
/// Distinct from [`crate::registry::MatchRegistry`], which maps players to
/// matches process-wide; this is per-match, host-transport bookkeeping.
#[derive(Debug)]
pub struct ConnectionManager {
    clients_by_addr: HashMap<SocketAddr, PlayerId>,
    clients: HashMap<PlayerId, ClientConnection>,
    next_player_id: u32,
    max_clients: usize,
    timeout: Duration,
}

impl ConnectionManager {
    pub fn new(max_clients: usize) -> Self {
        Self::with_timeout(max_clients, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(max_clients: usize, timeout_secs: u64) -> Self {
        Self {
            clients_by_addr: HashMap::new(),
            clients: HashMap::new(),
            next_player_id: 1,
            max_clients,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn get_or_create_pending(
        &mut self,
        addr: SocketAddr,
        client_salt: u64,
    ) -> Result<&mut ClientConnection, &'static str> {
        if let Some(&player_id) = self.clients_by_addr.get(&addr) {
            return Ok(self.clients.get_mut(&player_id).unwrap());
        }

        if self.clients.len() >= self.max_clients {
            return Err("server full");
        }

        let player_id = PlayerId(self.next_player_id);
        self.next_player_id += 1;

        let connection = ClientConnection::new(addr, player_id, client_salt);
        self.clients.insert(player_id, connection);
        self.clients_by_addr.insert(addr, player_id);

        Ok(self.clients.get_mut(&player_id).unwrap())
    }

    pub fn get_by_addr(&self, addr: &SocketAddr) -> Option<&ClientConnection> {
        self.clients_by_addr.get(addr).and_then(|id| self.clients.get(id))
    }

    pub fn get_by_addr_mut(&mut self, addr: &SocketAddr) -> Option<&mut ClientConnection> {
        let id = *self.clients_by_addr.get(addr)?;
        self.clients.get_mut(&id)
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&ClientConnection> {
        self.clients.get(&player_id)
    }

    pub fn get_mut(&mut self, player_id: PlayerId) -> Option<&mut ClientConnection> {
        self.clients.get_mut(&player_id)
    }

    pub fn remove(&mut self, player_id: PlayerId) -> Option<ClientConnection> {
        let conn = self.clients.remove(&player_id)?;
        self.clients_by_addr.remove(&conn.addr);
        Some(conn)
    }

    pub fn remove_by_addr(&mut self, addr: &SocketAddr) -> Option<ClientConnection> {
        let player_id = self.clients_by_addr.remove(addr)?;
        self.clients.remove(&player_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientConnection> {
        self.clients.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ClientConnection> {
        self.clients.values_mut()
    }

    pub fn cleanup_timed_out(&mut self) -> Vec<PlayerId> {
        let timed_out: Vec<PlayerId> =
            self.clients.iter().filter(|(_, c)| c.is_timed_out(self.timeout)).map(|(&id, _)| id).collect();
        for id in &timed_out {
            self.remove(*id);
        }
        timed_out
    }

    pub fn connected_count(&self) -> usize {
        self.clients.values().filter(|c| c.state == ConnectionState::Connected).count()
    }

    pub fn total_count(&self) -> usize {
        self.clients.len()
    }
}
