//! Maps (districts): the broadcast domains of the world.
//!
//! Membership changes and fan-out take the same per-map lock, so a broadcast
//! always walks a consistent member set. Sends during fan-out never wait: a
//! full or closed peer queue just loses that one frame.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::error::Result;
use crate::protocol::encoder::ResponseEncoder;
use crate::session::Outbound;
use crate::world::character::Character;

#[derive(Debug, Clone)]
struct Member {
    character: Arc<Character>,
    outbound: Outbound,
}

#[derive(Debug)]
pub struct GameMap {
    id: i32,
    name: String,
    members: Mutex<HashMap<i32, Member>>,
}

impl GameMap {
    pub fn new(id: i32, name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id,
            name: name.into(),
            members: Mutex::new(HashMap::new()),
        })
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Join a character, leaving whatever map it was in before
    pub async fn add_character(self: &Arc<Self>, character: Arc<Character>, outbound: Outbound) {
        if let Some(previous) = character.map() {
            if previous.id != self.id {
                previous.remove_character(&character).await;
            }
        }

        let mut members = self.members.lock().await;
        character.attach_map(self);
        let displaced = members.insert(
            character.id(),
            Member {
                character: Arc::clone(&character),
                outbound,
            },
        );
        if let Some(stale) = displaced.filter(|m| !Arc::ptr_eq(&m.character, &character)) {
            stale.character.detach_map(self.id);
            debug!(map_id = self.id, character_id = character.id(), "Displaced older session of character");
        }
        debug!(map_id = self.id, character_id = character.id(), members = members.len(), "Character joined map");
    }

    /// Remove this exact character instance. Returns whether it was a member.
    ///
    /// A newer session holding the same character id is left in place.
    pub async fn remove_character(&self, character: &Arc<Character>) -> bool {
        let mut members = self.members.lock().await;
        let removed = match members.get(&character.id()) {
            Some(member) if Arc::ptr_eq(&member.character, character) => {
                members.remove(&character.id());
                true
            }
            _ => false,
        };
        if removed {
            character.detach_map(self.id);
            debug!(map_id = self.id, character_id = character.id(), members = members.len(), "Character left map");
        }
        removed
    }

    pub async fn contains(&self, character_id: i32) -> bool {
        self.members.lock().await.contains_key(&character_id)
    }

    pub async fn len(&self) -> usize {
        self.members.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.lock().await.is_empty()
    }

    /// Send to every member, the originator included. Returns frames queued.
    pub async fn broadcast(&self, frame: Bytes) -> usize {
        let members = self.members.lock().await;
        let delivered = members
            .values()
            .filter(|member| member.outbound.try_send(frame.clone()))
            .count();
        trace!(map_id = self.id, delivered, "Broadcast to map");
        delivered
    }

    /// Send to every member except `origin_id`. Returns frames queued.
    pub async fn broadcast_from(&self, origin_id: i32, frame: Bytes) -> usize {
        let members = self.members.lock().await;
        let delivered = members
            .iter()
            .filter(|(id, _)| **id != origin_id)
            .filter(|(_, member)| member.outbound.try_send(frame.clone()))
            .count();
        trace!(map_id = self.id, origin_id, delivered, "Broadcast from member");
        delivered
    }

    /// Exchange player info between `requester` and everyone else here
    ///
    /// The requester gets one frame per peer and every peer gets the
    /// requester's frame.
    pub async fn players_info(
        &self,
        requester: &Character,
        encoder: &dyn ResponseEncoder,
    ) -> Result<()> {
        let members = self.members.lock().await;
        let Some(own) = members.get(&requester.id()) else {
            return Ok(());
        };

        let requester_info = encoder.player_info(requester)?;
        for (id, member) in members.iter() {
            if *id == requester.id() {
                continue;
            }
            own.outbound.try_send(encoder.player_info(&member.character)?);
            member.outbound.try_send(requester_info.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::character::{CharacterRecord, Placement, MAX_EMOTE_SLOTS};
    use tokio::sync::mpsc;

    fn character(id: i32) -> Arc<Character> {
        Character::from_record(CharacterRecord {
            id,
            account_id: id * 10,
            name: format!("c{id}"),
            level: 1,
            title_id: 0,
            map_id: 1,
            placement: Placement::default(),
            emotes: [0; MAX_EMOTE_SLOTS],
        })
    }

    async fn join(map: &Arc<GameMap>, id: i32) -> (Arc<Character>, mpsc::Receiver<Bytes>) {
        let (outbound, rx) = Outbound::channel(8);
        let c = character(id);
        map.add_character(Arc::clone(&c), outbound).await;
        (c, rx)
    }

    #[tokio::test]
    async fn broadcast_from_skips_origin() {
        let map = GameMap::new(1, "Candus");
        let (a, mut rx_a) = join(&map, 1).await;
        let (_b, mut rx_b) = join(&map, 2).await;
        let (_c, mut rx_c) = join(&map, 3).await;

        let frame = Bytes::from_static(b"step");
        assert_eq!(map.broadcast_from(a.id(), frame.clone()).await, 2);

        assert_eq!(rx_b.recv().await.unwrap(), frame);
        assert_eq!(rx_c.recv().await.unwrap(), frame);
        assert!(rx_b.try_recv().is_err());
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_includes_origin() {
        let map = GameMap::new(1, "Candus");
        let (_a, mut rx_a) = join(&map, 1).await;
        let (_b, mut rx_b) = join(&map, 2).await;

        assert_eq!(map.broadcast(Bytes::from_static(b"wave")).await, 2);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn removed_member_receives_nothing() {
        let map = GameMap::new(1, "Candus");
        let (a, _rx_a) = join(&map, 1).await;
        let (b, mut rx_b) = join(&map, 2).await;

        assert!(map.remove_character(&b).await);
        assert!(b.map().is_none());
        assert!(!map.remove_character(&b).await);

        map.broadcast_from(a.id(), Bytes::from_static(b"late")).await;
        map.broadcast(Bytes::from_static(b"later")).await;
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_peer_does_not_break_fan_out() {
        let map = GameMap::new(1, "Candus");
        let (a, _rx_a) = join(&map, 1).await;
        let (_b, rx_b) = join(&map, 2).await;
        let (_c, mut rx_c) = join(&map, 3).await;
        drop(rx_b);

        assert_eq!(map.broadcast_from(a.id(), Bytes::from_static(b"x")).await, 1);
        assert!(rx_c.try_recv().is_ok());
    }

    #[tokio::test]
    async fn stale_instance_does_not_remove_newer_session() {
        let map = GameMap::new(1, "Candus");
        let (old, mut old_rx) = join(&map, 1).await;
        let (new, mut new_rx) = join(&map, 1).await;
        let (peer, _peer_rx) = join(&map, 2).await;

        assert!(old.map().is_none());
        assert!(!map.remove_character(&old).await);
        assert!(map.contains(1).await);
        assert_eq!(new.map().map(|m| m.id()), Some(1));

        map.broadcast_from(peer.id(), Bytes::from_static(b"step")).await;
        assert!(new_rx.try_recv().is_ok());
        assert!(old_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn joining_second_map_leaves_first() {
        let first = GameMap::new(1, "Candus");
        let second = GameMap::new(2, "Rocco Town");
        let (a, _rx) = join(&first, 1).await;

        let (outbound, _rx2) = Outbound::channel(4);
        second.add_character(Arc::clone(&a), outbound).await;

        assert!(!first.contains(a.id()).await);
        assert!(second.contains(a.id()).await);
        assert_eq!(a.map().map(|m| m.id()), Some(2));
        assert_eq!(a.map_id(), 2);
    }
}
