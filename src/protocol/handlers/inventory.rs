//! Inventory snapshot and item requests.
//!
//! Item rules live in the [`ItemService`](crate::world::services::ItemService);
//! these handlers only decode and forward. Some layouts repeat item ids next
//! to the slot they occupy; those are read to keep offsets right and ignored.

use tracing::trace;

use crate::core::packet::RawPacket;
use crate::error::Result;
use crate::session::Session;
use crate::world::World;

/// Quantity removed by a break request
const BREAK_COUNT: i16 = 1;

/// Send cosmetic, equipped, then each tab, then the title pair
pub async fn snapshot(world: &World, session: &mut Session, _packet: &RawPacket) -> Result<()> {
    let Some(character) = session.character().cloned() else {
        return Ok(());
    };
    let encoder = world.encoder();
    let inventory = world.items().snapshot(&character).await?;

    session.send(encoder.item_inventory(&inventory.cosmetic)?).await?;
    session.send(encoder.item_inventory(&inventory.equipped)?).await?;
    for tab in &inventory.tabs {
        session
            .send(encoder.item_open_slot_info(tab.contents.slot_type, tab.capacity, tab.upgrades)?)
            .await?;
        let contents = if tab.bank {
            encoder.item_bank_info(&tab.contents)?
        } else {
            encoder.item_inventory(&tab.contents)?
        };
        session.send(contents).await?;
    }

    // name display needs both title frames even when nothing changed
    session.send(encoder.load_title(&character)?).await?;
    session.send(encoder.update_title(&character)?).await
}

pub async fn move_item(world: &World, session: &mut Session, packet: &RawPacket) -> Result<()> {
    let mut reader = packet.reader();
    let slot_type = reader.read_i8()?;
    let _item_id = reader.read_i32()?;
    let slot = reader.read_i16()?;
    let slot_type2 = reader.read_i8()?;
    let _item_id2 = reader.read_i32()?;
    let slot2 = reader.read_i16()?;

    let Some(character) = session.character() else {
        return Ok(());
    };
    world
        .items()
        .move_item(character, (slot_type, slot), (slot_type2, slot2))
        .await
}

pub async fn combine(world: &World, session: &mut Session, packet: &RawPacket) -> Result<()> {
    let mut reader = packet.reader();
    let tab1 = reader.read_i8()?;
    let _item1 = reader.read_i32()?;
    let slot1 = reader.read_i16()?;
    let tab2 = reader.read_i8()?;
    let _item2 = reader.read_i32()?;
    let slot2 = reader.read_i16()?;
    let count = reader.read_i16()?;

    if count <= 0 {
        trace!(session_id = session.id(), count, "Combine with non-positive count dropped");
        return Ok(());
    }
    let Some(character) = session.character() else {
        return Ok(());
    };
    world
        .items()
        .combine(character, (tab1, slot1), (tab2, slot2), count)
        .await
}

pub async fn divide(world: &World, session: &mut Session, packet: &RawPacket) -> Result<()> {
    let mut reader = packet.reader();
    let tab1 = reader.read_i8()?;
    let _item_id = reader.read_i32()?;
    let slot1 = reader.read_i16()?;
    let tab2 = reader.read_i8()?;
    let slot2 = reader.read_i16()?;
    let count = reader.read_i16()?;

    if count <= 0 {
        trace!(session_id = session.id(), count, "Divide with non-positive count dropped");
        return Ok(());
    }
    let Some(character) = session.character() else {
        return Ok(());
    };
    world
        .items()
        .divide(character, (tab1, slot1), (tab2, slot2), count)
        .await
}

pub async fn break_item(world: &World, session: &mut Session, packet: &RawPacket) -> Result<()> {
    let mut reader = packet.reader();
    let slot_type = reader.read_i8()?;
    let slot = reader.read_i16()?;

    let Some(character) = session.character() else {
        return Ok(());
    };
    world
        .items()
        .delete(character, slot_type, slot, BREAK_COUNT)
        .await
}

pub async fn use_item(world: &World, session: &mut Session, packet: &RawPacket) -> Result<()> {
    let mut reader = packet.reader();
    let slot_type = reader.read_i8()?;
    let slot = reader.read_i16()?;
    reader.skip(4)?;
    let item_id = reader.read_i32()?;
    let count = reader.read_i8()?;

    let Some(character) = session.character() else {
        return Ok(());
    };
    trace!(character_id = character.id(), item_id, count, "Use item");
    world.items().use_item(character, slot_type, slot).await
}

pub async fn upgrade(world: &World, session: &mut Session, packet: &RawPacket) -> Result<()> {
    let mut reader = packet.reader();
    reader.skip(4)?;
    let use_anti = reader.read_bool()?;
    let anti_slot_type = reader.read_i8()?;
    let anti_slot = reader.read_i16()?;
    let slot_type = reader.read_i8()?;
    let slot = reader.read_i16()?;

    let Some(character) = session.character() else {
        return Ok(());
    };
    trace!(
        character_id = character.id(),
        use_anti,
        anti_slot_type,
        anti_slot,
        "Upgrade item"
    );
    world.items().upgrade(character, slot_type, slot).await
}

pub async fn increase_slots(
    world: &World,
    session: &mut Session,
    packet: &RawPacket,
) -> Result<()> {
    let slot_type = packet.reader().read_i8()?;

    let Some(character) = session.character() else {
        return Ok(());
    };
    world.items().increase_slots(character, slot_type).await
}
