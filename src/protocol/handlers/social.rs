//! Chat and gestures.

use tracing::trace;

use crate::core::packet::RawPacket;
use crate::error::Result;
use crate::protocol::handlers::in_map;
use crate::session::Session;
use crate::world::character::MAX_EMOTE_SLOTS;
use crate::world::World;

pub async fn normal_chat(world: &World, session: &mut Session, packet: &RawPacket) -> Result<()> {
    let mut reader = packet.reader();
    let chat_type = reader.read_i8()?;
    let message = reader.read_string16()?;

    if message.is_empty() {
        return Ok(());
    }
    trace!(session_id = session.id(), chat_type, len = message.len(), "Normal chat");
    world.chat().handle_normal_chat(session, &message).await
}

/// Broadcast to the whole map, the sender included
pub async fn do_gesture(world: &World, session: &mut Session, packet: &RawPacket) -> Result<()> {
    let gesture_id = packet.reader().read_i32()?;

    let Some((character, map)) = in_map(session) else {
        return Ok(());
    };
    let frame = world.encoder().do_gesture(&character, gesture_id)?;
    map.broadcast(frame).await;
    Ok(())
}

pub async fn cancel_gesture(
    world: &World,
    session: &mut Session,
    _packet: &RawPacket,
) -> Result<()> {
    let Some((character, map)) = in_map(session) else {
        return Ok(());
    };
    let frame = world.encoder().cancel_gesture(&character)?;
    map.broadcast_from(character.id(), frame).await;
    Ok(())
}

/// Replace every gesture shortcut and echo the new layout back
pub async fn update_gesture_slots(
    world: &World,
    session: &mut Session,
    packet: &RawPacket,
) -> Result<()> {
    let mut reader = packet.reader();
    let mut emotes = [0i32; MAX_EMOTE_SLOTS];
    for slot in emotes.iter_mut() {
        *slot = reader.read_i32()?;
    }

    let Some(character) = session.character() else {
        return Ok(());
    };
    character.set_emotes(emotes);
    let frame = world.encoder().gesture_slots(character)?;
    session.send(frame).await
}
