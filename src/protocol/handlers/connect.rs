//! Connect handshake and keep-alive.

use std::sync::Arc;

use tracing::{debug, info, trace};

use crate::core::packet::RawPacket;
use crate::error::{constants, Result};
use crate::session::Session;
use crate::world::character::{Character, Position};
use crate::world::World;

/// Wire-order coordinates a character lands on when its saved map is gone
pub const FALLBACK_WIRE_POSITION: (f32, f32, f32) = (10000.0, 10000.0, 100.0);

pub fn fallback_position() -> Position {
    let (x, z, y) = FALLBACK_WIRE_POSITION;
    Position::from_wire(x, z, y)
}

pub async fn connect(world: &World, session: &mut Session, packet: &RawPacket) -> Result<()> {
    let mut reader = packet.reader();
    let account_id = reader.read_i32()?;
    let character_id = reader.read_i32()?;

    let peer = session.peer().ip();
    if !world.access_keys().validate(account_id, peer).await? {
        debug!(account_id, %peer, "Access key rejected");
        return Ok(());
    }

    let Some(record) = world.store().load_character(account_id, character_id).await? else {
        debug!(account_id, character_id, "{}", constants::ERR_CHARACTER_LOAD);
        return Ok(());
    };
    if record.account_id != account_id {
        debug!(account_id, character_id, "Character belongs to another account");
        return Ok(());
    }

    // Collaborator calls precede any session or registry change.
    let character = Character::from_record(record);
    world.items().load(&character).await?;

    let map = match world.district(character.map_id()) {
        Some(map) => Arc::clone(map),
        None => {
            let map = Arc::clone(world.default_district());
            debug!(
                character_id,
                saved_map = character.map_id(),
                fallback = map.id(),
                "Saved map missing, placing in default district"
            );
            character.set_map_id(map.id());
            character.set_position(fallback_position());
            world.store().save(&character).await?;
            map
        }
    };

    if !session.authenticate(account_id, Arc::clone(&character)) {
        return Ok(());
    }
    world.registry().add(Arc::clone(&character)).await;
    map.add_character(Arc::clone(&character), session.outbound().clone())
        .await;

    let encoder = world.encoder();
    session.send(encoder.server_date()?).await?;
    session.send(encoder.server_version()?).await?;
    session.send(encoder.enter_game_server(&character)?).await?;

    info!(
        session_id = session.id(),
        account_id,
        character_id,
        map_id = map.id(),
        "Character entered world"
    );
    Ok(())
}

pub async fn keep_alive(world: &World, session: &mut Session, packet: &RawPacket) -> Result<()> {
    let key = packet.reader().read_i32()?;
    trace!(session_id = session.id(), key, "Keep-alive");
    session.send(world.encoder().keep_alive(key)?).await
}
