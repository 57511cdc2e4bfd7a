use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::thread;
use std::time::Duration;

use arena_core::{
    ClientInput, ConnectionManager, ConnectionState, InputEnvelope, NetworkEndpoint, Packet, PacketHeader, PacketType,
    PlayerId,
};

static PORT_COUNTER: AtomicU16 = AtomicU16::new(41000);

fn next_port() -> u16 {
    PORT_COUNTER.fetch_add(10, Ordering::SeqCst)
}

fn generate_salt() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};
    let state = RandomState::new();
    let mut hasher = state.build_hasher();
    hasher.write_u64(std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos() as u64);
    hasher.finish()
}

fn wait_for_packet(endpoint: &mut NetworkEndpoint, timeout_ms: u64) -> Option<Vec<(Packet, SocketAddr)>> {
    let start = std::time::Instant::now();
    while start.elapsed() < Duration::from_millis(timeout_ms) {
        let received = endpoint.receive().unwrap();
        if !received.is_empty() {
            return Some(received);
        }
        thread::sleep(Duration::from_millis(1));
    }
    None
}

#[test]
fn connection_handshake_full_flow() {
    let port = next_port();
    let server_addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
    let client_addr: SocketAddr = format!("127.0.0.1:{}", port + 1).parse().unwrap();

    let mut server_endpoint = NetworkEndpoint::bind(server_addr).unwrap();
    let mut client_endpoint = NetworkEndpoint::bind(client_addr).unwrap();

    let mut connections = ConnectionManager::new(32);
    let client_salt = generate_salt();

    client_endpoint.set_remote(server_addr);
    let request = Packet::new(PacketHeader::new(0, 0, 0), PacketType::ConnectionRequest { client_salt });
    client_endpoint.send(&request).unwrap();

    let received = wait_for_packet(&mut server_endpoint, 200).expect("no packet received");
    assert_eq!(received.len(), 1);

    let (packet, from_addr) = &received[0];
    match &packet.payload {
        PacketType::ConnectionRequest { client_salt: salt } => {
            assert_eq!(*salt, client_salt);

            let client = connections.get_or_create_pending(*from_addr, *salt).unwrap();
            let server_salt = client.server_salt;
            let challenge = client.combined_salt();

            let header = PacketHeader::new(client.send_sequence, 0, 0);
            client.send_sequence += 1;

            let response = Packet::new(header, PacketType::ConnectionChallenge { server_salt, challenge });
            server_endpoint.send_to(&response, *from_addr).unwrap();
        }
        _ => panic!("expected ConnectionRequest"),
    }

    let received = wait_for_packet(&mut client_endpoint, 200).expect("no packet received");
    let (packet, _) = &received[0];
    match &packet.payload {
        PacketType::ConnectionChallenge { server_salt, challenge } => {
            let expected = client_salt ^ server_salt;
            assert_eq!(*challenge, expected);

            let response = Packet::new(PacketHeader::new(1, 0, 0), PacketType::ChallengeResponse { combined_salt: expected });
            client_endpoint.send(&response).unwrap();
        }
        _ => panic!("expected ConnectionChallenge"),
    }

    let received = wait_for_packet(&mut server_endpoint, 200).expect("no packet received");
    let (packet, from_addr) = &received[0];
    match &packet.payload {
        PacketType::ChallengeResponse { combined_salt } => {
            let client = connections.get_by_addr_mut(from_addr).unwrap();
            assert_eq!(*combined_salt, client.combined_salt());

            client.state = ConnectionState::Connected;
            let player_id = client.player_id;

            let header = PacketHeader::new(client.send_sequence, 0, 0);
            client.send_sequence += 1;

            let accepted = Packet::new(header, PacketType::ConnectionAccepted { player_id: player_id.0 });
            server_endpoint.send_to(&accepted, *from_addr).unwrap();
        }
        _ => panic!("expected ChallengeResponse"),
    }

    let received = wait_for_packet(&mut client_endpoint, 200).expect("no packet received");
    let (packet, _) = &received[0];
    match &packet.payload {
        PacketType::ConnectionAccepted { player_id } => assert!(*player_id > 0),
        _ => panic!("expected ConnectionAccepted"),
    }

    assert_eq!(connections.connected_count(), 1);
}

#[test]
fn connection_denied_when_server_full() {
    let port = next_port();
    let server_addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
    let client_addr: SocketAddr = format!("127.0.0.1:{}", port + 1).parse().unwrap();

    let mut server_endpoint = NetworkEndpoint::bind(server_addr).unwrap();
    let mut client_endpoint = NetworkEndpoint::bind(client_addr).unwrap();

    let mut connections = ConnectionManager::new(0);
    let client_salt = generate_salt();

    client_endpoint.set_remote(server_addr);
    let request = Packet::new(PacketHeader::new(0, 0, 0), PacketType::ConnectionRequest { client_salt });
    client_endpoint.send(&request).unwrap();

    let received = wait_for_packet(&mut server_endpoint, 200).expect("no packet received on server");
    let (packet, from_addr) = &received[0];
    match &packet.payload {
        PacketType::ConnectionRequest { client_salt: salt } => match connections.get_or_create_pending(*from_addr, *salt) {
            Ok(_) => panic!("should have been denied"),
            Err(reason) => {
                let denied = Packet::new(PacketHeader::new(0, 0, 0), PacketType::ConnectionDenied { reason: reason.to_string() });
                server_endpoint.send_to(&denied, *from_addr).unwrap();
            }
        },
        _ => panic!("expected ConnectionRequest"),
    }

    let received = wait_for_packet(&mut client_endpoint, 200).expect("no packet received on client");
    let (packet, _) = &received[0];
    match &packet.payload {
        PacketType::ConnectionDenied { reason } => assert!(reason.contains("full")),
        _ => panic!("expected ConnectionDenied"),
    }
}

#[test]
fn invalid_challenge_response_leaves_connection_unconnected() {
    let port = next_port();
    let server_addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
    let client_addr: SocketAddr = format!("127.0.0.1:{}", port + 1).parse().unwrap();

    let mut server_endpoint = NetworkEndpoint::bind(server_addr).unwrap();
    let mut client_endpoint = NetworkEndpoint::bind(client_addr).unwrap();

    let mut connections = ConnectionManager::new(32);
    let client_salt = generate_salt();

    client_endpoint.set_remote(server_addr);
    let request = Packet::new(PacketHeader::new(0, 0, 0), PacketType::ConnectionRequest { client_salt });
    client_endpoint.send(&request).unwrap();

    let received = wait_for_packet(&mut server_endpoint, 200).expect("no packet received");
    let (_, from_addr) = &received[0];

    let client = connections.get_or_create_pending(*from_addr, client_salt).unwrap();
    let server_salt = client.server_salt;
    let challenge = client.combined_salt();

    let response = Packet::new(
        PacketHeader::new(client.send_sequence, 0, 0),
        PacketType::ConnectionChallenge { server_salt, challenge },
    );
    server_endpoint.send_to(&response, *from_addr).unwrap();

    let _ = wait_for_packet(&mut client_endpoint, 200).expect("no packet received");

    let wrong_salt = 0xDEAD_BEEF;
    let response = Packet::new(PacketHeader::new(1, 0, 0), PacketType::ChallengeResponse { combined_salt: wrong_salt });
    client_endpoint.send(&response).unwrap();

    let _ = wait_for_packet(&mut server_endpoint, 200).expect("no packet received");

    let client = connections.get_by_addr(from_addr).unwrap();
    assert_eq!(client.state, ConnectionState::Connecting);
    assert_eq!(connections.connected_count(), 0);
}

#[test]
fn ping_pong_round_trip() {
    let port = next_port();
    let server_addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
    let client_addr: SocketAddr = format!("127.0.0.1:{}", port + 1).parse().unwrap();

    let mut server_endpoint = NetworkEndpoint::bind(server_addr).unwrap();
    let mut client_endpoint = NetworkEndpoint::bind(client_addr).unwrap();

    let timestamp = 12345u64;

    client_endpoint.set_remote(server_addr);
    let ping = Packet::new(PacketHeader::new(0, 0, 0), PacketType::Ping { timestamp });
    client_endpoint.send(&ping).unwrap();

    let received = wait_for_packet(&mut server_endpoint, 200).expect("no packet received");
    let (packet, from_addr) = &received[0];
    match &packet.payload {
        PacketType::Ping { timestamp: ts } => {
            let pong = Packet::new(PacketHeader::new(0, 0, 0), PacketType::Pong { timestamp: *ts });
            server_endpoint.send_to(&pong, *from_addr).unwrap();
        }
        _ => panic!("expected Ping"),
    }

    let received = wait_for_packet(&mut client_endpoint, 200).expect("no packet received");
    let (packet, _) = &received[0];
    match &packet.payload {
        PacketType::Pong { timestamp: ts } => assert_eq!(*ts, timestamp),
        _ => panic!("expected Pong"),
    }
}

#[test]
fn client_input_transmission_round_trips() {
    let port = next_port();
    let server_addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
    let client_addr: SocketAddr = format!("127.0.0.1:{}", port + 1).parse().unwrap();

    let mut server_endpoint = NetworkEndpoint::bind(server_addr).unwrap();
    let mut client_endpoint = NetworkEndpoint::bind(client_addr).unwrap();

    let envelope = InputEnvelope { seq: 7, client_time: 555, payload: ClientInput::Move { target: glam::Vec2::new(10.0, -4.0) } };

    client_endpoint.set_remote(server_addr);
    let packet = Packet::new(PacketHeader::new(0, 0, 0), PacketType::ClientInput(envelope));
    client_endpoint.send(&packet).unwrap();

    let received = wait_for_packet(&mut server_endpoint, 200).expect("no packet received");
    let (packet, _) = &received[0];
    match &packet.payload {
        PacketType::ClientInput(env) => {
            assert_eq!(env.seq, 7);
            assert_eq!(env.client_time, 555);
            match env.payload {
                ClientInput::Move { target } => {
                    assert!((target.x - 10.0).abs() < 0.01);
                    assert!((target.y - -4.0).abs() < 0.01);
                }
                _ => panic!("expected Move"),
            }
        }
        _ => panic!("expected ClientInput"),
    }
}

#[test]
fn disconnect_packet_round_trips() {
    let port = next_port();
    let server_addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
    let client_addr: SocketAddr = format!("127.0.0.1:{}", port + 1).parse().unwrap();

    let mut server_endpoint = NetworkEndpoint::bind(server_addr).unwrap();
    let mut client_endpoint = NetworkEndpoint::bind(client_addr).unwrap();

    client_endpoint.set_remote(server_addr);
    let packet = Packet::new(PacketHeader::new(0, 0, 0), PacketType::Disconnect);
    client_endpoint.send(&packet).unwrap();

    let received = wait_for_packet(&mut server_endpoint, 200).expect("no packet received");
    assert!(matches!(&received[0].0.payload, PacketType::Disconnect));
}

#[test]
fn multiple_clients_connect_and_are_tracked_independently() {
    let port = next_port();
    let server_addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();

    let mut server_endpoint = NetworkEndpoint::bind(server_addr).unwrap();
    let mut connections = ConnectionManager::new(32);

    for i in 0..3u16 {
        let client_port = port + 2 + i;
        let client_addr: SocketAddr = format!("127.0.0.1:{client_port}").parse().unwrap();
        let mut client_endpoint = NetworkEndpoint::bind(client_addr).unwrap();

        let client_salt = generate_salt();
        client_endpoint.set_remote(server_addr);

        let request = Packet::new(PacketHeader::new(0, 0, 0), PacketType::ConnectionRequest { client_salt });
        client_endpoint.send(&request).unwrap();

        let received = wait_for_packet(&mut server_endpoint, 200).expect("no packet received");
        let (packet, from_addr) = &received[0];
        if let PacketType::ConnectionRequest { client_salt: salt } = &packet.payload {
            let client = connections.get_or_create_pending(*from_addr, *salt).unwrap();
            client.state = ConnectionState::Connected;
        }
    }

    assert_eq!(connections.connected_count(), 3);
    assert_eq!(connections.total_count(), 3);
}

#[test]
fn player_ids_are_assigned_and_not_reused_across_addresses() {
    let mut connections = ConnectionManager::new(32);
    let addr_a: SocketAddr = "127.0.0.1:50001".parse().unwrap();
    let addr_b: SocketAddr = "127.0.0.1:50002".parse().unwrap();

    let id_a = connections.get_or_create_pending(addr_a, 1).unwrap().player_id;
    let id_b = connections.get_or_create_pending(addr_b, 2).unwrap().player_id;
    assert_ne!(id_a, id_b);

    connections.remove(id_a);
    assert!(connections.get(id_a).is_none());
    assert_eq!(connections.total_count(), 1);

    let id_a_again = connections.get_or_create_pending(addr_a, 3).unwrap().player_id;
    assert_ne!(id_a_again, id_a, "player ids are not reused once released");
}

#[test]
fn packet_sequence_header_round_trips() {
    let p1 = Packet::new(PacketHeader::new(0, 0, 0), PacketType::Ping { timestamp: 1 });
    let p2 = Packet::new(PacketHeader::new(1, 0, 0), PacketType::Ping { timestamp: 2 });
    let p3 = Packet::new(PacketHeader::new(2, 0, 0), PacketType::Ping { timestamp: 3 });

    assert_eq!(p1.header.sequence, 0);
    assert_eq!(p2.header.sequence, 1);
    assert_eq!(p3.header.sequence, 2);
}

#[test]
fn unused_player_id_has_no_connection() {
    let port = next_port();
    let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
    let mut connections = ConnectionManager::new(32);
    let _ = addr;
    assert!(connections.get(PlayerId(1)).is_none());
    assert_eq!(connections.cleanup_timed_out().len(), 0);
}
