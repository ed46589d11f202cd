//! Collaborator seams the protocol core calls into.
//!
//! Persistence, item rules and chat formatting live outside this crate. Each
//! is a trait object held by the [`World`](crate::world::World); anything that
//! may block returns a boxed future so the session worker can await it
//! without holding a cross-session lock.

use futures::future::BoxFuture;

use crate::error::Result;
use crate::session::Session;
use crate::world::character::{Character, CharacterRecord};

/// Character persistence
pub trait CharacterStore: Send + Sync {
    /// Load `character_id` if it exists and belongs to `account_id`
    fn load_character(
        &self,
        account_id: i32,
        character_id: i32,
    ) -> BoxFuture<'_, Result<Option<CharacterRecord>>>;

    fn save<'a>(&'a self, character: &'a Character) -> BoxFuture<'a, Result<()>>;
}

/// One occupied inventory slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemSlot {
    pub slot: i16,
    pub item_id: i32,
    pub count: i16,
    pub upgrade: u8,
}

/// Items of a single slot type
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemContainer {
    pub slot_type: i8,
    pub items: Vec<ItemSlot>,
}

/// A tab the client can open, with its capacity header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryTab {
    pub contents: ItemContainer,
    pub capacity: u16,
    pub upgrades: u16,
    pub bank: bool,
}

/// Everything the inventory-info opcode sends back, in send order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InventorySnapshot {
    pub cosmetic: ItemContainer,
    pub equipped: ItemContainer,
    pub tabs: Vec<InventoryTab>,
}

/// Inventory and item rules
///
/// Slot-level rules (stacking, capacity, upgrade odds) belong to the
/// implementation; the core only decodes the request and forwards it.
pub trait ItemService: Send + Sync {
    /// Load the character's items during connect
    fn load<'a>(&'a self, character: &'a Character) -> BoxFuture<'a, Result<()>>;

    fn snapshot<'a>(&'a self, character: &'a Character) -> BoxFuture<'a, Result<InventorySnapshot>>;

    fn move_item<'a>(
        &'a self,
        character: &'a Character,
        from: (i8, i16),
        to: (i8, i16),
    ) -> BoxFuture<'a, Result<()>>;

    fn combine<'a>(
        &'a self,
        character: &'a Character,
        from: (i8, i16),
        to: (i8, i16),
        count: i16,
    ) -> BoxFuture<'a, Result<()>>;

    fn divide<'a>(
        &'a self,
        character: &'a Character,
        from: (i8, i16),
        to: (i8, i16),
        count: i16,
    ) -> BoxFuture<'a, Result<()>>;

    fn delete<'a>(
        &'a self,
        character: &'a Character,
        slot_type: i8,
        slot: i16,
        count: i16,
    ) -> BoxFuture<'a, Result<()>>;

    fn use_item<'a>(
        &'a self,
        character: &'a Character,
        slot_type: i8,
        slot: i16,
    ) -> BoxFuture<'a, Result<()>>;

    fn upgrade<'a>(
        &'a self,
        character: &'a Character,
        slot_type: i8,
        slot: i16,
    ) -> BoxFuture<'a, Result<()>>;

    fn increase_slots<'a>(
        &'a self,
        character: &'a Character,
        slot_type: i8,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Chat formatting, moderation and fan-out
pub trait ChatService: Send + Sync {
    fn handle_normal_chat<'a>(
        &'a self,
        session: &'a Session,
        message: &'a str,
    ) -> BoxFuture<'a, Result<()>>;
}
