//! Per-opcode decode and act routines.
//!
//! Each handler reads its payload in full before touching any state, so a
//! short frame fails as one decode error with nothing mutated. Precondition
//! failures (no map, mismatched character id) return `Ok(())` without effect.

pub mod connect;
pub mod info;
pub mod inventory;
pub mod logout;
pub mod movement;
pub mod social;

use std::sync::Arc;

use crate::session::Session;
use crate::world::character::Character;
use crate::world::map::GameMap;

/// The session's character and the map it is standing in
pub(crate) fn in_map(session: &Session) -> Option<(Arc<Character>, Arc<GameMap>)> {
    let character = session.character()?;
    let map = character.map()?;
    Some((Arc::clone(character), map))
}
