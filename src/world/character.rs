//! In-world characters.
//!
//! A [`Character`] is shared between its owning session, the registry and its
//! map. Only the owning session writes placement and emotes; everyone else
//! reads. Position and angle sit behind one lock so a reader never sees a
//! half-applied movement.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use crate::world::map::GameMap;

/// Number of gesture shortcut slots on a character
pub const MAX_EMOTE_SLOTS: usize = 8;

/// Map id meaning "not assigned"
pub const NO_MAP: i32 = 0;

/// World-space position
///
/// The wire carries axes in `x, z, y` order; use [`Position::from_wire`] when
/// building one from decoded fields.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn from_wire(x: f32, z: f32, y: f32) -> Self {
        Self { x, y, z }
    }
}

/// Position plus facing, always read and written together
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Placement {
    pub position: Position,
    pub angle: f32,
}

/// Persistent form of a character as the store hands it over
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterRecord {
    pub id: i32,
    pub account_id: i32,
    pub name: String,
    pub level: i16,
    pub title_id: i32,
    pub map_id: i32,
    pub placement: Placement,
    pub emotes: [i32; MAX_EMOTE_SLOTS],
}

#[derive(Debug)]
pub struct Character {
    id: i32,
    account_id: i32,
    name: String,
    level: i16,
    title_id: i32,
    map_id: AtomicI32,
    placement: RwLock<Placement>,
    emotes: RwLock<[i32; MAX_EMOTE_SLOTS]>,
    map: RwLock<Weak<GameMap>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Character {
    pub fn from_record(record: CharacterRecord) -> Arc<Self> {
        Arc::new(Self {
            id: record.id,
            account_id: record.account_id,
            name: record.name,
            level: record.level,
            title_id: record.title_id,
            map_id: AtomicI32::new(record.map_id),
            placement: RwLock::new(record.placement),
            emotes: RwLock::new(record.emotes),
            map: RwLock::new(Weak::new()),
        })
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn account_id(&self) -> i32 {
        self.account_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> i16 {
        self.level
    }

    pub fn title_id(&self) -> i32 {
        self.title_id
    }

    /// Map id as persisted; may name a district that no longer exists
    pub fn map_id(&self) -> i32 {
        self.map_id.load(Ordering::Acquire)
    }

    pub fn placement(&self) -> Placement {
        *read(&self.placement)
    }

    pub fn position(&self) -> Position {
        read(&self.placement).position
    }

    pub fn set_placement(&self, position: Position, angle: f32) {
        *write(&self.placement) = Placement { position, angle };
    }

    pub fn set_position(&self, position: Position) {
        write(&self.placement).position = position;
    }

    pub fn emotes(&self) -> [i32; MAX_EMOTE_SLOTS] {
        *read(&self.emotes)
    }

    pub fn set_emotes(&self, emotes: [i32; MAX_EMOTE_SLOTS]) {
        *write(&self.emotes) = emotes;
    }

    /// The map this character is currently a member of
    pub fn map(&self) -> Option<Arc<GameMap>> {
        read(&self.map).upgrade()
    }

    pub(crate) fn attach_map(&self, map: &Arc<GameMap>) {
        *write(&self.map) = Arc::downgrade(map);
        self.map_id.store(map.id(), Ordering::Release);
    }

    /// Drop the map link if it still points at `map_id`
    pub(crate) fn detach_map(&self, map_id: i32) {
        let mut link = write(&self.map);
        if link.upgrade().is_some_and(|map| map.id() == map_id) {
            *link = Weak::new();
        }
    }

    /// Assign a map id without joining it (fallback path before persisting)
    pub fn set_map_id(&self, map_id: i32) {
        self.map_id.store(map_id, Ordering::Release);
    }

    /// Snapshot for persistence
    pub fn to_record(&self) -> CharacterRecord {
        CharacterRecord {
            id: self.id,
            account_id: self.account_id,
            name: self.name.clone(),
            level: self.level,
            title_id: self.title_id,
            map_id: self.map_id(),
            placement: self.placement(),
            emotes: self.emotes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> CharacterRecord {
        CharacterRecord {
            id: 7,
            account_id: 70,
            name: "Haru".to_string(),
            level: 12,
            title_id: 0,
            map_id: 10003,
            placement: Placement::default(),
            emotes: [0; MAX_EMOTE_SLOTS],
        }
    }

    #[test]
    fn wire_order_maps_to_axes() {
        let pos = Position::from_wire(1.0, 2.0, 3.0);
        assert_eq!(pos.x, 1.0);
        assert_eq!(pos.z, 2.0);
        assert_eq!(pos.y, 3.0);
    }

    #[test]
    fn record_round_trips_mutations() {
        let character = Character::from_record(record());
        character.set_placement(Position::from_wire(5.0, 6.0, 7.0), 90.0);
        character.set_emotes([1, 2, 3, 4, 5, 6, 7, 8]);

        let saved = character.to_record();
        assert_eq!(saved.placement.position, Position::from_wire(5.0, 6.0, 7.0));
        assert_eq!(saved.placement.angle, 90.0);
        assert_eq!(saved.emotes, [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn starts_without_map_link() {
        let character = Character::from_record(record());
        assert!(character.map().is_none());
        assert_eq!(character.map_id(), 10003);
    }
}
