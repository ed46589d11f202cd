//! Outbound message construction.
//!
//! [`ResponseEncoder`] turns semantic arguments into wire-ready frames. The
//! dispatcher treats it as a pure function of its inputs. [`WireEncoder`] is
//! the stock implementation built on [`PacketWriter`].
//!
//! Movement relay does not go through here; see
//! [`RawPacket::relay`](crate::core::packet::RawPacket::relay).

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::config::Endpoint;
use crate::core::cursor::PacketWriter;
use crate::error::Result;
use crate::protocol::opcodes::server;
use crate::utils::obfuscation::Obfuscator;
use crate::world::character::Character;
use crate::world::services::{ItemContainer, ItemSlot};

/// Server build reported to clients after connect
pub const SERVER_VERSION: &str = "1.8.2.4";

/// What the channel-info response reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSnapshot {
    pub channel_id: u16,
    pub online: u32,
    pub capacity: u32,
}

pub trait ResponseEncoder: Send + Sync {
    fn server_date(&self) -> Result<Bytes>;
    fn server_version(&self) -> Result<Bytes>;
    fn enter_game_server(&self, character: &Character) -> Result<Bytes>;
    fn keep_alive(&self, key: i32) -> Result<Bytes>;
    fn login_server_redirect(&self, account_id: i32, endpoint: &Endpoint) -> Result<Bytes>;

    fn character_info(&self, character: &Character) -> Result<Bytes>;
    fn special_option_list(&self, character: &Character) -> Result<Bytes>;
    fn player_info(&self, character: &Character) -> Result<Bytes>;
    fn channel_info(&self, channel: &ChannelSnapshot) -> Result<Bytes>;
    fn load_title(&self, character: &Character) -> Result<Bytes>;
    fn update_title(&self, character: &Character) -> Result<Bytes>;

    fn cancel_gesture(&self, character: &Character) -> Result<Bytes>;
    fn do_gesture(&self, character: &Character, gesture_id: i32) -> Result<Bytes>;
    fn gesture_slots(&self, character: &Character) -> Result<Bytes>;

    fn item_inventory(&self, container: &ItemContainer) -> Result<Bytes>;
    fn item_open_slot_info(&self, slot_type: i8, capacity: u16, upgrades: u16) -> Result<Bytes>;
    fn item_bank_info(&self, container: &ItemContainer) -> Result<Bytes>;
}

/// Frames responses with [`PacketWriter`] and the configured transform
pub struct WireEncoder {
    obfuscator: Arc<dyn Obfuscator>,
}

impl WireEncoder {
    pub fn new(obfuscator: Arc<dyn Obfuscator>) -> Self {
        Self { obfuscator }
    }

    fn finish(&self, writer: PacketWriter) -> Result<Bytes> {
        writer.finish(self.obfuscator.as_ref())
    }

    fn put_placement(writer: &mut PacketWriter, character: &Character) {
        let placement = character.placement();
        writer
            .put_f32(placement.position.x)
            .put_f32(placement.position.z)
            .put_f32(placement.position.y)
            .put_f32(placement.angle);
    }

    fn put_items(writer: &mut PacketWriter, items: &[ItemSlot]) {
        writer.put_len16(items.len());
        for item in items {
            writer
                .put_i16(item.slot)
                .put_i32(item.item_id)
                .put_i16(item.count)
                .put_i8(item.upgrade as i8);
        }
    }
}

impl ResponseEncoder for WireEncoder {
    fn server_date(&self) -> Result<Bytes> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        let mut writer = PacketWriter::new(server::SERVER_DATE);
        writer.put_i64(now);
        self.finish(writer)
    }

    fn server_version(&self) -> Result<Bytes> {
        let mut writer = PacketWriter::new(server::SERVER_VERSION);
        writer.put_string16(SERVER_VERSION);
        self.finish(writer)
    }

    fn enter_game_server(&self, character: &Character) -> Result<Bytes> {
        let mut writer = PacketWriter::new(server::ENTER_GAME_SERVER);
        writer
            .put_i32(character.id())
            .put_i32(character.map_id());
        Self::put_placement(&mut writer, character);
        self.finish(writer)
    }

    fn keep_alive(&self, key: i32) -> Result<Bytes> {
        let mut writer = PacketWriter::new(server::KEEP_ALIVE);
        writer.put_i32(key);
        self.finish(writer)
    }

    fn login_server_redirect(&self, account_id: i32, endpoint: &Endpoint) -> Result<Bytes> {
        let mut writer = PacketWriter::new(server::LOGIN_SERVER_REDIRECT);
        writer
            .put_i32(account_id)
            .put_string16(&endpoint.host)
            .put_u16(endpoint.port);
        self.finish(writer)
    }

    fn character_info(&self, character: &Character) -> Result<Bytes> {
        let mut writer = PacketWriter::new(server::CHARACTER_INFO);
        writer
            .put_i32(character.id())
            .put_string16(character.name())
            .put_i16(character.level())
            .put_i32(character.map_id());
        Self::put_placement(&mut writer, character);
        self.finish(writer)
    }

    fn special_option_list(&self, character: &Character) -> Result<Bytes> {
        // no computed options yet: empty list
        let mut writer = PacketWriter::new(server::SPECIAL_OPTION_LIST);
        writer.put_i32(character.id()).put_u16(0);
        self.finish(writer)
    }

    fn player_info(&self, character: &Character) -> Result<Bytes> {
        let mut writer = PacketWriter::new(server::PLAYER_INFO);
        writer
            .put_i32(character.id())
            .put_string16(character.name())
            .put_i16(character.level())
            .put_i32(character.title_id());
        Self::put_placement(&mut writer, character);
        self.finish(writer)
    }

    fn channel_info(&self, channel: &ChannelSnapshot) -> Result<Bytes> {
        let mut writer = PacketWriter::new(server::CHANNEL_INFO);
        writer
            .put_u16(channel.channel_id)
            .put_i32(channel.online as i32)
            .put_i32(channel.capacity as i32);
        self.finish(writer)
    }

    fn load_title(&self, character: &Character) -> Result<Bytes> {
        let mut writer = PacketWriter::new(server::LOAD_TITLE);
        writer
            .put_i32(character.id())
            .put_string16(character.name());
        self.finish(writer)
    }

    fn update_title(&self, character: &Character) -> Result<Bytes> {
        let mut writer = PacketWriter::new(server::UPDATE_TITLE);
        writer
            .put_i32(character.id())
            .put_i32(character.title_id());
        self.finish(writer)
    }

    fn cancel_gesture(&self, character: &Character) -> Result<Bytes> {
        let mut writer = PacketWriter::new(server::CANCEL_GESTURE);
        writer.put_i32(character.id());
        self.finish(writer)
    }

    fn do_gesture(&self, character: &Character, gesture_id: i32) -> Result<Bytes> {
        let mut writer = PacketWriter::new(server::DO_GESTURE);
        writer.put_i32(character.id()).put_i32(gesture_id);
        Self::put_placement(&mut writer, character);
        self.finish(writer)
    }

    fn gesture_slots(&self, character: &Character) -> Result<Bytes> {
        let mut writer = PacketWriter::new(server::GESTURE_SLOTS);
        for emote in character.emotes() {
            writer.put_i32(emote);
        }
        self.finish(writer)
    }

    fn item_inventory(&self, container: &ItemContainer) -> Result<Bytes> {
        let mut writer = PacketWriter::new(server::ITEM_INVENTORY);
        writer.put_i8(container.slot_type);
        Self::put_items(&mut writer, &container.items);
        self.finish(writer)
    }

    fn item_open_slot_info(&self, slot_type: i8, capacity: u16, upgrades: u16) -> Result<Bytes> {
        let mut writer = PacketWriter::new(server::ITEM_OPEN_SLOT_INFO);
        writer
            .put_i8(slot_type)
            .put_u16(capacity)
            .put_u16(upgrades);
        self.finish(writer)
    }

    fn item_bank_info(&self, container: &ItemContainer) -> Result<Bytes> {
        // storage flag precedes the slot list on bank tabs
        let mut writer = PacketWriter::new(server::ITEM_BANK_INFO);
        writer
            .put_i8(container.slot_type)
            .put_bool(true);
        Self::put_items(&mut writer, &container.items);
        self.finish(writer)
    }
}
