//! Shared doubles and helpers for the integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc;

use world_protocol::config::WorldConfig;
use world_protocol::core::packet::{RawPacket, HEADER_LEN};
use world_protocol::error::{ProtocolError, Result};
use world_protocol::protocol::opcodes::{server, Opcode};
use world_protocol::session::{Outbound, Session};
use world_protocol::utils::obfuscation::{Obfuscator, XorObfuscator};
use world_protocol::world::access_key::MemoryAccessKeys;
use world_protocol::world::character::{
    Character, CharacterRecord, Placement, Position, MAX_EMOTE_SLOTS,
};
use world_protocol::world::services::{
    CharacterStore, ChatService, InventorySnapshot, ItemService,
};
use world_protocol::world::{PacketBlobs, World};

pub const ACCOUNT: i32 = 500;

/// Character store backed by a map, recording every save
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<i32, CharacterRecord>>,
    pub saves: Mutex<Vec<CharacterRecord>>,
    pub fail_loads: Mutex<bool>,
    pub fail_saves: Mutex<bool>,
}

impl MemoryStore {
    pub fn insert(&self, record: CharacterRecord) {
        self.records.lock().unwrap().insert(record.id, record);
    }

    pub fn saved(&self) -> Vec<CharacterRecord> {
        self.saves.lock().unwrap().clone()
    }
}

impl CharacterStore for MemoryStore {
    fn load_character(
        &self,
        account_id: i32,
        character_id: i32,
    ) -> BoxFuture<'_, Result<Option<CharacterRecord>>> {
        async move {
            if *self.fail_loads.lock().unwrap() {
                return Err(ProtocolError::Persistence("store offline".to_string()));
            }
            Ok(self
                .records
                .lock()
                .unwrap()
                .get(&character_id)
                .filter(|r| r.account_id == account_id)
                .cloned())
        }
        .boxed()
    }

    fn save<'a>(&'a self, character: &'a Character) -> BoxFuture<'a, Result<()>> {
        async move {
            if *self.fail_saves.lock().unwrap() {
                return Err(ProtocolError::Persistence("store offline".to_string()));
            }
            self.saves.lock().unwrap().push(character.to_record());
            Ok(())
        }
        .boxed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemCall {
    Load(i32),
    Move { from: (i8, i16), to: (i8, i16) },
    Combine { from: (i8, i16), to: (i8, i16), count: i16 },
    Divide { from: (i8, i16), to: (i8, i16), count: i16 },
    Delete { slot_type: i8, slot: i16, count: i16 },
    Use { slot_type: i8, slot: i16 },
    Upgrade { slot_type: i8, slot: i16 },
    IncreaseSlots(i8),
}

/// Item service that records requests and serves a fixed snapshot
#[derive(Default)]
pub struct RecordingItems {
    pub calls: Mutex<Vec<ItemCall>>,
    pub inventory: Mutex<InventorySnapshot>,
    pub fail_loads: Mutex<bool>,
}

impl RecordingItems {
    fn record(&self, call: ItemCall) -> BoxFuture<'_, Result<()>> {
        self.calls.lock().unwrap().push(call);
        async { Ok(()) }.boxed()
    }

    /// Calls other than the connect-time load
    pub fn requests(&self) -> Vec<ItemCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| !matches!(c, ItemCall::Load(_)))
            .cloned()
            .collect()
    }
}

impl ItemService for RecordingItems {
    fn load<'a>(&'a self, character: &'a Character) -> BoxFuture<'a, Result<()>> {
        if *self.fail_loads.lock().unwrap() {
            return async { Err(ProtocolError::Persistence("items offline".to_string())) }.boxed();
        }
        self.record(ItemCall::Load(character.id()))
    }

    fn snapshot<'a>(&'a self, _character: &'a Character) -> BoxFuture<'a, Result<InventorySnapshot>> {
        let inventory = self.inventory.lock().unwrap().clone();
        async move { Ok(inventory) }.boxed()
    }

    fn move_item<'a>(&'a self, _c: &'a Character, from: (i8, i16), to: (i8, i16)) -> BoxFuture<'a, Result<()>> {
        self.record(ItemCall::Move { from, to })
    }

    fn combine<'a>(&'a self, _c: &'a Character, from: (i8, i16), to: (i8, i16), count: i16) -> BoxFuture<'a, Result<()>> {
        self.record(ItemCall::Combine { from, to, count })
    }

    fn divide<'a>(&'a self, _c: &'a Character, from: (i8, i16), to: (i8, i16), count: i16) -> BoxFuture<'a, Result<()>> {
        self.record(ItemCall::Divide { from, to, count })
    }

    fn delete<'a>(&'a self, _c: &'a Character, slot_type: i8, slot: i16, count: i16) -> BoxFuture<'a, Result<()>> {
        self.record(ItemCall::Delete { slot_type, slot, count })
    }

    fn use_item<'a>(&'a self, _c: &'a Character, slot_type: i8, slot: i16) -> BoxFuture<'a, Result<()>> {
        self.record(ItemCall::Use { slot_type, slot })
    }

    fn upgrade<'a>(&'a self, _c: &'a Character, slot_type: i8, slot: i16) -> BoxFuture<'a, Result<()>> {
        self.record(ItemCall::Upgrade { slot_type, slot })
    }

    fn increase_slots<'a>(&'a self, _c: &'a Character, slot_type: i8) -> BoxFuture<'a, Result<()>> {
        self.record(ItemCall::IncreaseSlots(slot_type))
    }
}

#[derive(Default)]
pub struct RecordingChat {
    pub messages: Mutex<Vec<(u64, String)>>,
}

impl ChatService for RecordingChat {
    fn handle_normal_chat<'a>(&'a self, session: &'a Session, message: &'a str) -> BoxFuture<'a, Result<()>> {
        self.messages
            .lock()
            .unwrap()
            .push((session.id(), message.to_string()));
        async { Ok(()) }.boxed()
    }
}

pub struct Harness {
    pub world: Arc<World>,
    pub store: Arc<MemoryStore>,
    pub items: Arc<RecordingItems>,
    pub chat: Arc<RecordingChat>,
    pub keys: Arc<MemoryAccessKeys>,
    pub obfuscator: Arc<XorObfuscator>,
}

impl Harness {
    /// An outbound frame with the transform reversed
    pub fn plain(&self, frame: &[u8]) -> Vec<u8> {
        reveal(self.obfuscator.as_ref(), frame)
    }
}

pub async fn harness() -> Harness {
    harness_with(WorldConfig::default(), PacketBlobs::default()).await
}

pub async fn harness_with(config: WorldConfig, blobs: PacketBlobs) -> Harness {
    let store = Arc::new(MemoryStore::default());
    let items = Arc::new(RecordingItems::default());
    let chat = Arc::new(RecordingChat::default());
    let keys = Arc::new(MemoryAccessKeys::new(64, Duration::from_secs(60)));
    let obfuscator = Arc::new(XorObfuscator::default());

    let world = World::builder(&config)
        .store(store.clone())
        .items(items.clone())
        .chat(chat.clone())
        .access_keys(keys.clone())
        .obfuscator(obfuscator.clone())
        .blobs(blobs)
        .build()
        .await
        .expect("world should build");

    Harness {
        world: Arc::new(world),
        store,
        items,
        chat,
        keys,
        obfuscator,
    }
}

pub fn record(id: i32, map_id: i32) -> CharacterRecord {
    CharacterRecord {
        id,
        account_id: ACCOUNT + id,
        name: format!("Player{id}"),
        level: 10,
        title_id: 0,
        map_id,
        placement: Placement {
            position: Position { x: 1.0, y: 2.0, z: 3.0 },
            angle: 0.5,
        },
        emotes: [0; MAX_EMOTE_SLOTS],
    }
}

pub fn session(port: u16) -> (Session, mpsc::Receiver<Bytes>) {
    let (outbound, rx) = Outbound::channel(1024);
    let peer: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
    (Session::new(peer, outbound), rx)
}

/// Run the connect handshake for `record` and drain its three responses
pub async fn join(h: &Harness, record: CharacterRecord) -> (Session, mpsc::Receiver<Bytes>) {
    let account_id = record.account_id;
    let character_id = record.id;
    h.store.insert(record);

    let (mut session, mut rx) = session(4000 + character_id as u16);
    h.keys.issue_key(account_id, session.peer().ip()).await;

    let packet = Payload::new()
        .i32(account_id)
        .i32(character_id)
        .packet(Opcode::ConnectWorldServer);
    h.world.dispatch(&mut session, &packet).await;

    for expected in [server::SERVER_DATE, server::SERVER_VERSION, server::ENTER_GAME_SERVER] {
        let frame = rx.recv().await.expect("handshake response");
        assert_eq!(opcode_of(&h.plain(&frame)), expected);
    }
    (session, rx)
}

/// Little-endian payload builder
#[derive(Default)]
pub struct Payload(Vec<u8>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn i8(mut self, v: i8) -> Self {
        self.0.push(v as u8);
        self
    }

    pub fn bool(self, v: bool) -> Self {
        self.i8(v as i8)
    }

    pub fn i16(mut self, v: i16) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i32(mut self, v: i32) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn f32(mut self, v: f32) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn string16(mut self, v: &str) -> Self {
        let units: Vec<u8> = v.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        self.0.extend_from_slice(&(units.len() as u16).to_le_bytes());
        self.0.extend_from_slice(&units);
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn packet(self, opcode: Opcode) -> RawPacket {
        RawPacket::build(opcode.as_u16(), &self.0)
    }
}

pub fn opcode_of(frame: &[u8]) -> u16 {
    u16::from_be_bytes([frame[5], frame[6]])
}

/// Reverse the transform on an outbound frame
pub fn reveal(obfuscator: &dyn Obfuscator, frame: &[u8]) -> Vec<u8> {
    let mut plain = frame.to_vec();
    obfuscator.apply(&mut plain, 5).unwrap();
    plain
}

pub fn payload_of(frame: &[u8]) -> &[u8] {
    &frame[HEADER_LEN..]
}
