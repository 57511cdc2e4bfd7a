//! A non-rendering CLI client exercising `arena-core`'s wire protocol
//! directly: handshake, periodic movement input, and logging of every
//! inbound server message. A second, minimal entry point alongside the
//! main server, built as an actually-functional bot rather than a one-shot
//! serialization sample.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use arena_core::{
    AckTracker, ClientInput, InputEnvelope, NetworkEndpoint, Packet, PacketHeader, PacketType,
    ReceiveTracker,
};
use clap::Parser;
use glam::Vec2;

#[derive(Parser)]
#[command(name = "arena-bot")]
#[command(about = "Scripted CLI client for exercising an arena-server host")]
struct Args {
    /// Address of the arena-server host to connect to.
    #[arg(short, long, default_value_t = format!("127.0.0.1:{}", arena_core::DEFAULT_PORT))]
    server: String,

    /// How long to stay connected before disconnecting, in seconds.
    #[arg(short, long, default_value_t = 120)]
    duration: u64,

    /// How many ticks to wait between each wander input.
    #[arg(long, default_value_t = 8)]
    wander_period_ticks: u64,
}

/// Handshake + connected lifecycle, mirroring `ConnectionState` on the host
/// side of `arena-core::net`.
#[derive(Debug, PartialEq, Eq)]
enum BotState {
    AwaitingChallenge,
    AwaitingAccept,
    Connected,
}

struct Bot {
    endpoint: NetworkEndpoint,
    server_addr: SocketAddr,
    state: BotState,
    client_salt: u64,
    send_seq: u32,
    input_seq: u32,
    client_time_start: Instant,
    recv_tracker: ReceiveTracker,
    ack_tracker: AckTracker,
    player_id: Option<u32>,
}

impl Bot {
    fn new(server_addr: SocketAddr) -> std::io::Result<Self> {
        let endpoint = NetworkEndpoint::bind("0.0.0.0:0")?;
        Ok(Self {
            endpoint,
            server_addr,
            state: BotState::AwaitingChallenge,
            client_salt: random_u64(),
            send_seq: 0,
            input_seq: 0,
            client_time_start: Instant::now(),
            recv_tracker: ReceiveTracker::new(),
            ack_tracker: AckTracker::new(64),
            player_id: None,
        })
    }

    fn client_time_ms(&self) -> u64 {
        self.client_time_start.elapsed().as_millis() as u64
    }

    fn send(&mut self, payload: PacketType) {
        self.send_seq = self.send_seq.wrapping_add(1);
        let (ack, ack_bitfield) = self.recv_tracker.ack_data();
        let header = PacketHeader::new(self.send_seq, ack, ack_bitfield);
        self.ack_tracker.track_packet(self.send_seq);
        let packet = Packet::new(header, payload);
        if let Err(e) = self.endpoint.send_to(&packet, self.server_addr) {
            log::warn!("send failed: {e}");
        }
    }

    fn send_connection_request(&mut self) {
        let client_salt = self.client_salt;
        self.send(PacketType::ConnectionRequest { client_salt });
    }

    /// Polls the socket and advances handshake/gameplay state. Returns
    /// `false` once the server has ended the match or dropped the connection.
    fn poll(&mut self) -> Result<bool> {
        let packets = self.endpoint.receive().context("reading from socket")?;
        for (packet, addr) in packets {
            if addr != self.server_addr {
                continue;
            }
            if !self.recv_tracker.record_received(packet.header.sequence) {
                continue;
            }
            self.ack_tracker.process_ack(packet.header.ack, packet.header.ack_bitfield);

            match packet.payload {
                PacketType::ConnectionChallenge { server_salt, challenge } => {
                    if self.state != BotState::AwaitingChallenge {
                        continue;
                    }
                    let combined_salt = self.client_salt ^ server_salt;
                    if combined_salt != challenge {
                        bail!("challenge mismatch from server");
                    }
                    self.state = BotState::AwaitingAccept;
                    self.send(PacketType::ChallengeResponse { combined_salt });
                }
                PacketType::ConnectionAccepted { player_id } => {
                    self.player_id = Some(player_id);
                    self.state = BotState::Connected;
                    log::info!("connected as player {player_id}");
                    self.send(PacketType::ClientReady);
                }
                PacketType::ConnectionDenied { reason } => {
                    bail!("connection denied: {reason}");
                }
                PacketType::Pong { timestamp } => {
                    let rtt_ms = self.client_time_ms().saturating_sub(timestamp);
                    log::debug!("pong rtt={rtt_ms}ms");
                }
                PacketType::ServerGameStart { assignments } => {
                    log::info!("match started, {} players assigned", assignments.len());
                }
                PacketType::ServerFullSnapshot(snapshot) => {
                    log::info!(
                        "full snapshot tick={} entities={} events={}",
                        snapshot.tick,
                        snapshot.entities.len(),
                        snapshot.events.len()
                    );
                }
                PacketType::ServerStateUpdate(update) => {
                    log::debug!(
                        "state update tick={} deltas={} removed={} events={}",
                        update.tick,
                        update.deltas.len(),
                        update.removed.len(),
                        update.events.len()
                    );
                }
                PacketType::ServerGameEnd { winning_side } => {
                    log::info!("match ended, winning side: {winning_side:?}");
                    return Ok(false);
                }
                PacketType::ServerError { detail } => {
                    log::error!("server error: {detail}");
                    return Ok(false);
                }
                PacketType::Disconnect => {
                    log::info!("server closed the connection");
                    return Ok(false);
                }
                _ => {}
            }
        }
        Ok(true)
    }

    /// Wanders towards a new random point inside a square arena every call;
    /// good enough to keep a champion moving and exercise the input
    /// pipeline without any real gameplay logic to react to.
    fn send_wander_input(&mut self) {
        if self.player_id.is_none() {
            return;
        }
        self.input_seq = self.input_seq.wrapping_add(1);
        let target = Vec2::new((random_u64() % 8000) as f32 - 4000.0, (random_u64() % 8000) as f32 - 4000.0);
        let envelope = InputEnvelope {
            seq: self.input_seq,
            client_time: self.client_time_ms(),
            payload: ClientInput::Move { target },
        };
        self.send(PacketType::ClientInput(envelope));
    }

    fn send_ping(&mut self) {
        let timestamp = self.client_time_ms();
        self.send(PacketType::Ping { timestamp });
    }

    fn disconnect(&mut self) {
        self.send(PacketType::Disconnect);
    }
}

fn random_u64() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let state = RandomState::new();
    let mut hasher = state.build_hasher();
    hasher.write_u64(std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos() as u64);
    hasher.finish()
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let server_addr: SocketAddr = args.server.parse().context("invalid --server address")?;
    let mut bot = Bot::new(server_addr)?;

    log::info!("connecting to {server_addr}");
    bot.send_connection_request();

    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut last_handshake_resend = Instant::now();
    let mut last_wander = Instant::now();
    let mut last_ping = Instant::now();
    let tick_duration = Duration::from_secs_f64(1.0 / 125.0);
    let wander_interval = tick_duration * args.wander_period_ticks as u32;

    while Instant::now() < deadline {
        if !bot.poll()? {
            break;
        }

        if bot.state != BotState::Connected && last_handshake_resend.elapsed() > Duration::from_secs(1) {
            last_handshake_resend = Instant::now();
            if bot.state == BotState::AwaitingChallenge {
                bot.send_connection_request();
            }
        }

        if bot.state == BotState::Connected {
            if last_wander.elapsed() >= wander_interval {
                last_wander = Instant::now();
                bot.send_wander_input();
            }
            if last_ping.elapsed() >= Duration::from_secs(2) {
                last_ping = Instant::now();
                bot.send_ping();
            }
        }

        std::thread::sleep(Duration::from_millis(5));
    }

    if bot.state == BotState::Connected {
        bot.disconnect();
    }
    log::info!("shutting down");
    Ok(())
}
