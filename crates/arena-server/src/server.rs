//! `GameServer`: wraps one [`arena_core::Match`] in a UDP host loop —
//! handshake, packet dispatch, fixed-tick advancement, and snapshot delivery.

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use arena_core::{
    ConnectionManager, ConnectionState, EventId, FixedClock, Match, MatchState, NetworkEndpoint,
    NetworkStats, OutboundMessage, OutboundSink, Packet, PacketHeader, PacketType, PlayerId, Side,
};

use crate::config::ServerConfig;
use crate::events::{DisconnectReason, ServerEvent};
use crate::simulation::{DemoRulesCatalogue, DemoRulesConfig};

/// Built from the connection manager at send time so the serializer never
/// needs to know about sockets.
struct PacketSink<'a> {
    endpoint: &'a mut NetworkEndpoint,
    connections: &'a mut ConnectionManager,
}

impl OutboundSink for PacketSink<'_> {
    fn send(&mut self, player: PlayerId, message: OutboundMessage) {
        let Some(conn) = self.connections.get_mut(player) else { return };
        let addr = conn.addr;
        conn.send_sequence = conn.send_sequence.wrapping_add(1);
        let sequence = conn.send_sequence;
        let (ack, ack_bitfield) = conn.receive_tracker.ack_data();

        let payload = match message {
            OutboundMessage::GameStart { assignments } => PacketType::ServerGameStart { assignments },
            OutboundMessage::FullStateSnapshot(snapshot) => PacketType::ServerFullSnapshot(snapshot),
            OutboundMessage::StateUpdate(update) => PacketType::ServerStateUpdate(update),
            OutboundMessage::GameEnd { winning_side } => PacketType::ServerGameEnd { winning_side },
            OutboundMessage::Error { detail } => PacketType::ServerError { detail },
        };

        let header = PacketHeader::new(sequence, ack, ack_bitfield);
        let packet = Packet::new(header, payload);
        if let Err(e) = self.endpoint.send_to(&packet, addr) {
            log::warn!("failed to send to player {player:?}: {e}");
        }
    }
}

pub struct GameServer {
    endpoint: NetworkEndpoint,
    connections: ConnectionManager,
    config: ServerConfig,
    match_: Match<DemoRulesCatalogue>,
    clock: FixedClock,
    last_tick_time: Instant,
    start_time: Instant,
    running: bool,
    pending_events: VecDeque<ServerEvent>,
    ready: std::collections::HashSet<PlayerId>,
    next_side: Side,
}

#[derive(Debug, Clone)]
pub struct ServerStats {
    pub tick: u64,
    pub uptime_secs: u64,
    pub client_count: usize,
    pub max_clients: usize,
    pub match_state: MatchState,
    pub network_stats: NetworkStats,
}

impl GameServer {
    pub fn new(config: ServerConfig) -> io::Result<Self> {
        let endpoint = NetworkEndpoint::bind(&config.bind_addr)?;
        let connections = ConnectionManager::new(config.max_clients);
        let rules = DemoRulesCatalogue::new(DemoRulesConfig::default());
        let match_config = config.match_config.clone();
        let clock = FixedClock::new(match_config.tick_rate);
        let match_ = Match::new(match_config, rules);

        Ok(Self {
            endpoint,
            connections,
            config,
            match_,
            clock,
            last_tick_time: Instant::now(),
            start_time: Instant::now(),
            running: true,
            pending_events: VecDeque::new(),
            ready: std::collections::HashSet::new(),
            next_side: Side::A,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ServerEvent> + '_ {
        self.pending_events.drain(..)
    }

    pub fn run(&mut self) {
        while self.running {
            self.tick_once();
            std::thread::sleep(Duration::from_millis(1));
        }
        self.shutdown_connections();
    }

    pub fn shutdown_connections(&mut self) {
        let players: Vec<PlayerId> = self.connections.iter().map(|c| c.player_id).collect();
        for player in players {
            self.kick_player(player, DisconnectReason::Kicked);
        }
    }

    pub fn kick_player(&mut self, player: PlayerId, reason: DisconnectReason) {
        if let Some(conn) = self.connections.get(player) {
            let addr = conn.addr;
            let header = PacketHeader::new(0, 0, 0);
            let packet = Packet::new(header, PacketType::Disconnect);
            let _ = self.endpoint.send_to(&packet, addr);
        }
        if self.connections.remove(player).is_some() {
            self.match_.handle_disconnect(player);
            self.pending_events.push_back(ServerEvent::ClientDisconnected { player, reason });
        }
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            tick: self.clock.tick(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            client_count: self.connections.connected_count(),
            max_clients: self.config.max_clients,
            match_state: self.match_.state(),
            network_stats: self.endpoint.stats().clone(),
        }
    }

    pub fn tick_once(&mut self) {
        self.process_network();

        let now = Instant::now();
        let elapsed_secs = now.duration_since(self.last_tick_time).as_secs_f32();
        self.last_tick_time = now;

        if self.clock.advance(elapsed_secs).is_some() {
            let wall_time_ms = self.start_time.elapsed().as_millis() as u64;
            let dt = self.clock.dt();
            let mut sink = PacketSink { endpoint: &mut self.endpoint, connections: &mut self.connections };
            self.match_.tick(dt, wall_time_ms, &mut sink);
        }

        for player in self.connections.cleanup_timed_out() {
            self.match_.handle_disconnect(player);
            self.pending_events.push_back(ServerEvent::ClientDisconnected { player, reason: DisconnectReason::Timeout });
        }
    }

    fn process_network(&mut self) {
        let packets = match self.endpoint.receive() {
            Ok(packets) => packets,
            Err(e) => {
                self.pending_events.push_back(ServerEvent::Error { message: format!("network error: {e}") });
                return;
            }
        };
        for (packet, addr) in packets {
            self.dispatch_packet(packet, addr);
        }
    }

    fn dispatch_packet(&mut self, packet: Packet, addr: SocketAddr) {
        if let PacketType::ConnectionRequest { client_salt } = &packet.payload {
            self.handle_connection_request(addr, *client_salt);
            return;
        }

        let Some(player) = self.connections.get_by_addr(&addr).map(|c| c.player_id) else {
            return;
        };

        if let Some(conn) = self.connections.get_by_addr_mut(&addr) {
            conn.touch();
            conn.receive_tracker.record_received(packet.header.sequence);
        }

        match packet.payload {
            PacketType::ChallengeResponse { combined_salt } => self.handle_challenge_response(addr, combined_salt),
            PacketType::Ping { timestamp } => self.handle_ping(addr, timestamp),
            PacketType::Disconnect => self.kick_player(player, DisconnectReason::Graceful),
            PacketType::ClientReady => self.handle_client_ready(player),
            PacketType::ClientInput(envelope) => self.match_.handle_input(player, envelope),
            PacketType::ClientEventAck { last_event_id } => {
                self.match_.handle_event_ack(player, EventId(last_event_id));
            }
            _ => {}
        }
    }

    fn handle_connection_request(&mut self, addr: SocketAddr, client_salt: u64) {
        if self.connections.get_by_addr(&addr).is_some() {
            return;
        }
        self.pending_events.push_back(ServerEvent::ClientConnecting { addr });

        let global_packet_loss = self.config.global_packet_loss.clone();
        match self.connections.get_or_create_pending(addr, client_salt) {
            Ok(conn) => {
                if let Some(sim) = global_packet_loss {
                    conn.packet_loss_sim = sim;
                }
                let server_salt = conn.server_salt;
                let challenge = conn.combined_salt();
                let header = PacketHeader::new(0, 0, 0);
                let packet = Packet::new(header, PacketType::ConnectionChallenge { server_salt, challenge });
                let _ = self.endpoint.send_to(&packet, addr);
            }
            Err(reason) => {
                let header = PacketHeader::new(0, 0, 0);
                let packet = Packet::new(header, PacketType::ConnectionDenied { reason: reason.to_string() });
                let _ = self.endpoint.send_to(&packet, addr);
                self.pending_events.push_back(ServerEvent::ConnectionDenied { addr, reason: reason.to_string() });
            }
        }
    }

    fn handle_challenge_response(&mut self, addr: SocketAddr, combined_salt: u64) {
        let Some(conn) = self.connections.get_by_addr_mut(&addr) else { return };
        if conn.state == ConnectionState::Connected {
            return;
        }
        if combined_salt != conn.combined_salt() {
            self.pending_events.push_back(ServerEvent::Error { message: format!("invalid challenge response from {addr}") });
            return;
        }
        conn.state = ConnectionState::Connected;
        let player = conn.player_id;

        let side = self.next_side;
        self.next_side = side.opposite();
        self.match_.register_player(player, side);

        let header = PacketHeader::new(0, 0, 0);
        let packet = Packet::new(header, PacketType::ConnectionAccepted { player_id: player.0 });
        let _ = self.endpoint.send_to(&packet, addr);
        self.pending_events.push_back(ServerEvent::ClientConnected { player, addr, side });
    }

    fn handle_ping(&mut self, addr: SocketAddr, timestamp: u64) {
        let header = PacketHeader::new(0, 0, 0);
        let packet = Packet::new(header, PacketType::Pong { timestamp });
        let _ = self.endpoint.send_to(&packet, addr);
    }

    fn handle_client_ready(&mut self, player: PlayerId) {
        self.match_.handle_ready(player);
        self.ready.insert(player);
        self.maybe_start();
    }

    /// Starts once every connected player has signalled ready. The
    /// `waiting -> starting` transition is host-triggered; `Match` itself
    /// never auto-starts.
    fn maybe_start(&mut self) {
        if self.match_.state() != MatchState::Waiting {
            return;
        }
        let required = self.config.max_clients;
        if self.connections.connected_count() < required || self.ready.len() < required {
            return;
        }
        let mut sink = PacketSink { endpoint: &mut self.endpoint, connections: &mut self.connections };
        self.match_.start(&mut sink);
    }
}
