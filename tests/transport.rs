//! The TCP server end to end: framing, transform, dispatch, teardown.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::time::Duration;

use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

use common::*;
use world_protocol::config::{ServerConfig, WorldConfig};
use world_protocol::core::codec::WorldCodec;
use world_protocol::core::packet::{RawPacket, OBFUSCATION_START};
use world_protocol::protocol::opcodes::{server, Opcode};
use world_protocol::server::serve;
use world_protocol::utils::obfuscation::Obfuscator;
use world_protocol::world::PacketBlobs;

struct Client {
    framed: Framed<TcpStream, WorldCodec>,
}

impl Client {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        Self::connect_with(addr, WorldCodec::default()).await
    }

    async fn connect_with(addr: std::net::SocketAddr, codec: WorldCodec) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        Self {
            framed: Framed::new(stream, codec),
        }
    }

    async fn send(&mut self, h: &Harness, payload: Payload, opcode: Opcode) {
        let mut frame = payload.packet(opcode).frame().to_vec();
        h.obfuscator.apply(&mut frame, OBFUSCATION_START).unwrap();
        self.framed.send(bytes::Bytes::from(frame)).await.unwrap();
    }

    async fn recv(&mut self, h: &Harness) -> Vec<u8> {
        let frame: BytesMut = tokio::time::timeout(Duration::from_secs(5), self.framed.next())
            .await
            .expect("frame in time")
            .expect("stream open")
            .expect("valid frame");
        h.plain(&frame)
    }
}

async fn start(h: &Harness, config: ServerConfig) -> (std::net::SocketAddr, mpsc::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let world = h.world.clone();
    tokio::spawn(async move {
        serve(listener, world, config, shutdown_rx).await.unwrap();
    });
    (addr, shutdown_tx)
}

#[tokio::test]
async fn handshake_and_keep_alive_over_tcp() {
    let h = harness().await;
    let (addr, shutdown) = start(&h, ServerConfig::default()).await;
    h.store.insert(record(1, 10003));
    h.keys.issue_key(ACCOUNT + 1, "127.0.0.1".parse().unwrap()).await;

    let mut client = Client::connect(addr).await;
    client
        .send(&h, Payload::new().i32(ACCOUNT + 1).i32(1), Opcode::ConnectWorldServer)
        .await;

    assert_eq!(opcode_of(&client.recv(&h).await), server::SERVER_DATE);
    assert_eq!(opcode_of(&client.recv(&h).await), server::SERVER_VERSION);
    assert_eq!(opcode_of(&client.recv(&h).await), server::ENTER_GAME_SERVER);

    client.send(&h, Payload::new().i32(99), Opcode::KeepAlive).await;
    let echo = client.recv(&h).await;
    assert_eq!(opcode_of(&echo), server::KEEP_ALIVE);
    assert_eq!(payload_of(&echo), 99i32.to_le_bytes());

    drop(client);
    for _ in 0..50 {
        if h.world.registry().count().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(h.world.registry().count().await, 0);
    assert_eq!(h.store.saved().len(), 1);

    shutdown.send(()).await.unwrap();
}

#[tokio::test]
async fn movement_reaches_peer_over_tcp() {
    let h = harness().await;
    let (addr, shutdown) = start(&h, ServerConfig::default()).await;

    let mut clients = Vec::new();
    for id in 1..=2 {
        h.store.insert(record(id, 10003));
        h.keys.issue_key(ACCOUNT + id, "127.0.0.1".parse().unwrap()).await;
        let mut client = Client::connect(addr).await;
        client
            .send(&h, Payload::new().i32(ACCOUNT + id).i32(id), Opcode::ConnectWorldServer)
            .await;
        for _ in 0..3 {
            client.recv(&h).await;
        }
        clients.push(client);
    }

    let movement = Payload::new()
        .i32(1).i32(0).i32(0)
        .f32(5.0).f32(6.0).f32(7.0)
        .f32(0.5);
    let plain_payload = movement.bytes().to_vec();
    clients[0].send(&h, movement, Opcode::MovementJump).await;

    let relayed = clients[1].recv(&h).await;
    assert_eq!(opcode_of(&relayed), 0x0506);
    assert_eq!(payload_of(&relayed), plain_payload.as_slice());

    shutdown.send(()).await.unwrap();
}

#[tokio::test]
async fn large_outbound_frame_keeps_connection_alive() {
    let npcs = RawPacket::build(0x0410, &vec![0x5A; 20_000]);
    let blobs = PacketBlobs {
        skills: None,
        npcs: Some(bytes::Bytes::copy_from_slice(npcs.frame())),
    };
    let h = harness_with(WorldConfig::default(), blobs).await;
    let config = ServerConfig {
        max_frame_size: 4096,
        ..ServerConfig::default()
    };
    let (addr, shutdown) = start(&h, config).await;
    h.store.insert(record(1, 10003));
    h.keys.issue_key(ACCOUNT + 1, "127.0.0.1".parse().unwrap()).await;

    let mut client = Client::connect_with(addr, WorldCodec::new(64 * 1024)).await;
    client
        .send(&h, Payload::new().i32(ACCOUNT + 1).i32(1), Opcode::ConnectWorldServer)
        .await;
    for _ in 0..3 {
        client.recv(&h).await;
    }

    client.send(&h, Payload::new(), Opcode::PlayersRequest).await;
    let mut got_npcs = false;
    for _ in 0..8 {
        let frame = client.recv(&h).await;
        if frame.len() == npcs.len() {
            got_npcs = true;
            break;
        }
    }
    assert!(got_npcs, "npc frame should arrive whole");

    client.send(&h, Payload::new().i32(77), Opcode::KeepAlive).await;
    let echo = client.recv(&h).await;
    assert_eq!(opcode_of(&echo), server::KEEP_ALIVE);
    assert_eq!(payload_of(&echo), 77i32.to_le_bytes());

    shutdown.send(()).await.unwrap();
}

#[tokio::test]
async fn idle_connection_is_closed() {
    let h = harness().await;
    let config = ServerConfig {
        connection_timeout: Duration::from_millis(200),
        ..ServerConfig::default()
    };
    let (addr, shutdown) = start(&h, config).await;

    let mut client = Client::connect(addr).await;
    tokio::time::sleep(Duration::from_millis(400)).await;

    let next = tokio::time::timeout(Duration::from_secs(5), client.framed.next()).await;
    assert!(matches!(next, Ok(None) | Ok(Some(Err(_)))));
    assert_eq!(h.world.metrics().snapshot().connections_total, 1);

    shutdown.send(()).await.unwrap();
}

#[tokio::test]
async fn garbage_header_closes_connection() {
    let h = harness().await;
    let (addr, shutdown) = start(&h, ServerConfig::default()).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    tokio::io::AsyncWriteExt::write_all(&mut stream, &[0xDE, 0xAD, 0xBE, 0xEF, 0, 0, 0])
        .await
        .unwrap();

    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(
        Duration::from_secs(5),
        tokio::io::AsyncReadExt::read(&mut stream, &mut buf),
    )
    .await
    .expect("server should close");
    assert!(matches!(read, Ok(0) | Err(_)));

    shutdown.send(()).await.unwrap();
}
