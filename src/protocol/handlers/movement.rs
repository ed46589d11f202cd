//! Movement relay.
//!
//! The owning session's move, stop and jump frames update the character and
//! are then forwarded to the rest of the map as the received bytes, with the
//! sub-type byte patched to a relay marker and the transform re-applied. The
//! outbound frame is never rebuilt from decoded fields.

use std::sync::Arc;

use tracing::trace;

use crate::core::packet::{RawPacket, SUBTYPE_OFFSET};
use crate::error::Result;
use crate::protocol::handlers::in_map;
use crate::protocol::opcodes::markers;
use crate::session::Session;
use crate::world::character::{Character, Position};
use crate::world::map::GameMap;
use crate::world::World;

pub async fn move_to(world: &World, session: &mut Session, packet: &RawPacket) -> Result<()> {
    let mut reader = packet.reader();
    let character_id = reader.read_i32()?;
    reader.skip(4)?;
    let map_id = reader.read_i16()?;
    reader.skip(2)?;
    let x = reader.read_f32()?;
    let z = reader.read_f32()?;
    let y = reader.read_f32()?;
    let angle = reader.read_f32()?;
    let new_x = reader.read_f32()?;
    let new_z = reader.read_f32()?;
    reader.skip(8)?;

    let Some((character, map)) = owned(session, character_id) else {
        return Ok(());
    };

    let old = character.position();
    character.set_placement(Position::from_wire(new_x, new_z, y), angle);
    trace!(
        character_id,
        map_id,
        from = ?(old.x, old.z),
        start = ?(x, z),
        to = ?(new_x, new_z),
        "Move"
    );

    relay(world, &map, &character, packet, markers::MOVE).await
}

pub async fn stop(world: &World, session: &mut Session, packet: &RawPacket) -> Result<()> {
    let mut reader = packet.reader();
    let character_id = reader.read_i32()?;
    reader.skip(8)?;
    let x = reader.read_f32()?;
    let z = reader.read_f32()?;
    let y = reader.read_f32()?;
    let angle = reader.read_f32()?;
    reader.skip(4)?;

    let Some((character, map)) = owned(session, character_id) else {
        return Ok(());
    };
    character.set_placement(Position::from_wire(x, z, y), angle);

    relay(world, &map, &character, packet, markers::STOP).await
}

pub async fn jump(world: &World, session: &mut Session, packet: &RawPacket) -> Result<()> {
    let mut reader = packet.reader();
    let character_id = reader.read_i32()?;
    reader.skip(8)?;
    let x = reader.read_f32()?;
    let z = reader.read_f32()?;
    let y = reader.read_f32()?;
    let angle = reader.read_f32()?;

    let Some((character, map)) = owned(session, character_id) else {
        return Ok(());
    };
    character.set_placement(Position::from_wire(x, z, y), angle);

    relay(world, &map, &character, packet, markers::JUMP).await
}

/// The session's character and map, if `character_id` names that character
fn owned(session: &Session, character_id: i32) -> Option<(Arc<Character>, Arc<GameMap>)> {
    let (character, map) = in_map(session)?;
    if character.id() != character_id {
        trace!(
            session_id = session.id(),
            claimed = character_id,
            actual = character.id(),
            "Movement for foreign character dropped"
        );
        return None;
    }
    Some((character, map))
}

async fn relay(
    world: &World,
    map: &GameMap,
    character: &Character,
    packet: &RawPacket,
    marker: u8,
) -> Result<()> {
    let frame = packet.relay(SUBTYPE_OFFSET, marker, world.obfuscator())?;
    let delivered = map.broadcast_from(character.id(), frame).await;
    world.metrics().relayed();
    trace!(character_id = character.id(), map_id = map.id(), marker, delivered, "Relayed movement");
    Ok(())
}
