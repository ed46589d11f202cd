//! # World State
//!
//! Server-wide state shared by every session worker: the district maps, the
//! character registry, and the collaborators handlers call into.
//!
//! A [`World`] is built once at startup with [`WorldBuilder`] and shared
//! behind an `Arc`. Maps and the registry lock internally, so `&World` is
//! all a handler needs.

pub mod access_key;
pub mod character;
pub mod map;
pub mod registry;
pub mod services;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::config::{Endpoint, GameConfig, WorldConfig};
use crate::core::packet::{RawPacket, FRAME_MAGIC, HEADER_LEN, LENGTH_OFFSET, MAX_WIRE_FRAME};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::encoder::{ChannelSnapshot, ResponseEncoder, WireEncoder};
use crate::session::Session;
use crate::utils::metrics::Metrics;
use crate::utils::obfuscation::{Obfuscator, XorObfuscator};

use self::access_key::{AccessKeys, MemoryAccessKeys};
use self::map::GameMap;
use self::registry::CharacterRegistry;
use self::services::{CharacterStore, ChatService, ItemService};

/// File names of the pre-encoded payloads under the packets folder
pub const SKILLS_BLOB: &str = "skills.packet";
pub const NPCS_BLOB: &str = "npcs.packet";

/// Bound on outstanding access keys held in memory
const ACCESS_KEY_CAPACITY: usize = 10_000;

/// Pre-encoded frames sent as-is
#[derive(Debug, Clone, Default)]
pub struct PacketBlobs {
    /// Sent after character info
    pub skills: Option<Bytes>,
    /// Sent on players request in the NPC map
    pub npcs: Option<Bytes>,
}

impl PacketBlobs {
    /// Read blobs from `folder`; a missing file leaves that blob absent
    pub async fn load(folder: &Path) -> Result<Self> {
        Ok(Self {
            skills: read_blob(folder, SKILLS_BLOB).await?,
            npcs: read_blob(folder, NPCS_BLOB).await?,
        })
    }
}

async fn read_blob(folder: &Path, name: &str) -> Result<Option<Bytes>> {
    let path = folder.join(name);
    match tokio::fs::read(&path).await {
        Ok(data) => {
            check_blob(name, &data)?;
            debug!(path = %path.display(), len = data.len(), "Loaded packet blob");
            Ok(Some(Bytes::from(data)))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Packet blob not found, sends will be skipped");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// A blob must be one whole frame the length field can describe
fn check_blob(name: &str, data: &[u8]) -> Result<()> {
    if data.len() < HEADER_LEN || data[..2] != FRAME_MAGIC {
        return Err(ProtocolError::ConfigError(format!(
            "{name}: not a framed packet"
        )));
    }
    if data.len() > MAX_WIRE_FRAME {
        return Err(ProtocolError::ConfigError(format!(
            "{name}: {} bytes exceeds the frame length field",
            data.len()
        )));
    }
    let declared = u16::from_le_bytes([data[LENGTH_OFFSET], data[LENGTH_OFFSET + 1]]) as usize;
    if declared != data.len() {
        return Err(ProtocolError::ConfigError(format!(
            "{name}: header declares {declared} bytes, file holds {}",
            data.len()
        )));
    }
    Ok(())
}

pub struct World {
    settings: GameConfig,
    max_connections: usize,
    game_endpoint: Endpoint,
    auth_endpoint: Endpoint,
    districts: HashMap<i32, Arc<GameMap>>,
    default_district: Arc<GameMap>,
    registry: CharacterRegistry,
    store: Arc<dyn CharacterStore>,
    access_keys: Arc<dyn AccessKeys>,
    items: Arc<dyn ItemService>,
    chat: Arc<dyn ChatService>,
    encoder: Arc<dyn ResponseEncoder>,
    obfuscator: Arc<dyn Obfuscator>,
    blobs: PacketBlobs,
    metrics: Arc<Metrics>,
}

impl World {
    pub fn builder(config: &WorldConfig) -> WorldBuilder {
        WorldBuilder::new(config)
    }

    pub fn settings(&self) -> &GameConfig {
        &self.settings
    }

    pub fn district(&self, map_id: i32) -> Option<&Arc<GameMap>> {
        self.districts.get(&map_id)
    }

    pub fn default_district(&self) -> &Arc<GameMap> {
        &self.default_district
    }

    pub fn registry(&self) -> &CharacterRegistry {
        &self.registry
    }

    pub fn store(&self) -> &dyn CharacterStore {
        self.store.as_ref()
    }

    pub fn access_keys(&self) -> &dyn AccessKeys {
        self.access_keys.as_ref()
    }

    pub fn items(&self) -> &dyn ItemService {
        self.items.as_ref()
    }

    pub fn chat(&self) -> &dyn ChatService {
        self.chat.as_ref()
    }

    pub fn encoder(&self) -> &dyn ResponseEncoder {
        self.encoder.as_ref()
    }

    pub fn obfuscator(&self) -> &dyn Obfuscator {
        self.obfuscator.as_ref()
    }

    pub fn blobs(&self) -> &PacketBlobs {
        &self.blobs
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn game_endpoint(&self) -> &Endpoint {
        &self.game_endpoint
    }

    pub fn auth_endpoint(&self) -> &Endpoint {
        &self.auth_endpoint
    }

    pub async fn channel_snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            channel_id: self.settings.channel_id,
            online: self.registry.count().await as u32,
            capacity: self.max_connections as u32,
        }
    }

    /// Run one inbound message through the gate and its handler
    pub async fn dispatch(&self, session: &mut Session, packet: &RawPacket) {
        crate::protocol::dispatcher::dispatch(self, session, packet).await;
    }

    /// Tear down a session's world presence
    ///
    /// Leaves the map, deregisters and persists the character. A session that
    /// never finished the handshake has nothing to undo.
    pub async fn disconnect(&self, session: &mut Session) -> Result<()> {
        let Some(character) = session.take_character() else {
            return Ok(());
        };

        if let Some(map) = character.map() {
            map.remove_character(&character).await;
        }
        self.registry.remove(&character).await;

        self.store.save(&character).await.map_err(|e| {
            warn!(character_id = character.id(), error = %e, "{}", constants::ERR_CHARACTER_SAVE);
            e
        })?;
        info!(
            session_id = session.id(),
            character_id = character.id(),
            "Character left the world"
        );
        Ok(())
    }
}

/// Assembles a [`World`] from configuration plus the collaborators the
/// deployment supplies
pub struct WorldBuilder {
    config: WorldConfig,
    store: Option<Arc<dyn CharacterStore>>,
    access_keys: Option<Arc<dyn AccessKeys>>,
    items: Option<Arc<dyn ItemService>>,
    chat: Option<Arc<dyn ChatService>>,
    encoder: Option<Arc<dyn ResponseEncoder>>,
    obfuscator: Option<Arc<dyn Obfuscator>>,
    blobs: Option<PacketBlobs>,
    metrics: Option<Arc<Metrics>>,
}

impl WorldBuilder {
    pub fn new(config: &WorldConfig) -> Self {
        Self {
            config: config.clone(),
            store: None,
            access_keys: None,
            items: None,
            chat: None,
            encoder: None,
            obfuscator: None,
            blobs: None,
            metrics: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn CharacterStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn access_keys(mut self, access_keys: Arc<dyn AccessKeys>) -> Self {
        self.access_keys = Some(access_keys);
        self
    }

    pub fn items(mut self, items: Arc<dyn ItemService>) -> Self {
        self.items = Some(items);
        self
    }

    pub fn chat(mut self, chat: Arc<dyn ChatService>) -> Self {
        self.chat = Some(chat);
        self
    }

    pub fn encoder(mut self, encoder: Arc<dyn ResponseEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    pub fn obfuscator(mut self, obfuscator: Arc<dyn Obfuscator>) -> Self {
        self.obfuscator = Some(obfuscator);
        self
    }

    /// Use these blobs instead of reading the packets folder
    pub fn blobs(mut self, blobs: PacketBlobs) -> Self {
        self.blobs = Some(blobs);
        self
    }

    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn build(self) -> Result<World> {
        self.config.validate_strict()?;

        let store = self.store.ok_or_else(|| missing("character store"))?;
        let items = self.items.ok_or_else(|| missing("item service"))?;
        let chat = self.chat.ok_or_else(|| missing("chat service"))?;

        let obfuscator = self
            .obfuscator
            .unwrap_or_else(|| Arc::new(XorObfuscator::default()));
        let encoder = self
            .encoder
            .unwrap_or_else(|| Arc::new(WireEncoder::new(Arc::clone(&obfuscator))));
        let access_keys = self.access_keys.unwrap_or_else(|| {
            Arc::new(MemoryAccessKeys::new(
                ACCESS_KEY_CAPACITY,
                self.config.cluster.access_key_ttl,
            ))
        });

        let settings = self.config.world;
        let districts: HashMap<i32, Arc<GameMap>> = settings
            .districts
            .iter()
            .map(|d| (d.id, GameMap::new(d.id, d.name.clone())))
            .collect();
        let default_district = districts
            .get(&settings.default_district)
            .cloned()
            .ok_or_else(|| {
                ProtocolError::ConfigError(format!(
                    "Default district {} is not configured",
                    settings.default_district
                ))
            })?;

        let blobs = match self.blobs {
            Some(blobs) => blobs,
            None => PacketBlobs::load(&settings.packets_folder).await?,
        };

        info!(
            districts = districts.len(),
            default_district = default_district.id(),
            channel_id = settings.channel_id,
            "World constructed"
        );

        Ok(World {
            max_connections: self.config.server.max_connections,
            game_endpoint: self.config.cluster.game_endpoint()?,
            auth_endpoint: self.config.cluster.auth_endpoint()?,
            districts,
            default_district,
            registry: CharacterRegistry::new(),
            store,
            access_keys,
            items,
            chat,
            encoder,
            obfuscator,
            blobs,
            metrics: self.metrics.unwrap_or_default(),
            settings,
        })
    }
}

fn missing(what: &str) -> ProtocolError {
    ProtocolError::ConfigError(format!("World requires a {what}"))
}
