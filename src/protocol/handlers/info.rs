//! Character, player and channel information requests.

use tracing::trace;

use crate::core::packet::RawPacket;
use crate::error::Result;
use crate::protocol::handlers::in_map;
use crate::session::Session;
use crate::world::World;

pub async fn character_info(
    world: &World,
    session: &mut Session,
    _packet: &RawPacket,
) -> Result<()> {
    let Some(character) = session.character().cloned() else {
        return Ok(());
    };
    let encoder = world.encoder();

    session.send(encoder.character_info(&character)?).await?;
    if let Some(skills) = &world.blobs().skills {
        session.try_send(skills.clone());
    }
    session.send(encoder.gesture_slots(&character)?).await
}

pub async fn special_options(
    world: &World,
    session: &mut Session,
    _packet: &RawPacket,
) -> Result<()> {
    let Some(character) = session.character() else {
        return Ok(());
    };
    let frame = world.encoder().special_option_list(character)?;
    session.send(frame).await
}

pub async fn players(world: &World, session: &mut Session, _packet: &RawPacket) -> Result<()> {
    let Some((character, map)) = in_map(session) else {
        return Ok(());
    };
    map.players_info(&character, world.encoder()).await?;

    if map.id() == world.settings().npc_map_id {
        if let Some(npcs) = &world.blobs().npcs {
            session.try_send(npcs.clone());
            trace!(map_id = map.id(), "Sent NPC list");
        }
    }
    Ok(())
}

pub async fn channel_info(
    world: &World,
    session: &mut Session,
    _packet: &RawPacket,
) -> Result<()> {
    let snapshot = world.channel_snapshot().await;
    session.send(world.encoder().channel_info(&snapshot)?).await
}
