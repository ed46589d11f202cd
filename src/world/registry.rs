//! Server-wide index of connected characters.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::world::character::Character;

#[derive(Debug, Default)]
pub struct CharacterRegistry {
    characters: Mutex<HashMap<i32, Arc<Character>>>,
}

impl CharacterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a character, returning any stale entry it replaced
    pub async fn add(&self, character: Arc<Character>) -> Option<Arc<Character>> {
        let mut characters = self.characters.lock().await;
        let previous = characters.insert(character.id(), Arc::clone(&character));
        if previous.is_some() {
            warn!(character_id = character.id(), "Replaced stale registry entry");
        }
        debug!(character_id = character.id(), online = characters.len(), "Character registered");
        previous
    }

    /// Remove `character` only if the registered entry is that same instance
    pub async fn remove(&self, character: &Arc<Character>) -> bool {
        let mut characters = self.characters.lock().await;
        match characters.get(&character.id()) {
            Some(current) if Arc::ptr_eq(current, character) => {
                characters.remove(&character.id());
                debug!(character_id = character.id(), online = characters.len(), "Character deregistered");
                true
            }
            _ => false,
        }
    }

    pub async fn get(&self, character_id: i32) -> Option<Arc<Character>> {
        self.characters.lock().await.get(&character_id).cloned()
    }

    pub async fn count(&self) -> usize {
        self.characters.lock().await.len()
    }
}
