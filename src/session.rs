//! Per-connection session state.
//!
//! A [`Session`] is owned by exactly one connection worker, so handlers get it
//! by `&mut` and need no locking. Other sessions reach this connection only
//! through its [`Outbound`] handle, which maps hold for broadcast.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{ProtocolError, Result};
use crate::protocol::gate::SessionState;
use crate::world::character::Character;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Sending half of a session's outbound queue of wire-ready frames
#[derive(Debug, Clone)]
pub struct Outbound {
    session_id: u64,
    tx: mpsc::Sender<Bytes>,
}

impl Outbound {
    /// Create a queue holding up to `capacity` frames
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let session_id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        (Self { session_id, tx }, rx)
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Queue a frame, waiting for room
    pub async fn send(&self, frame: Bytes) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    /// Queue a frame if there is room; drops it silently otherwise
    pub fn try_send(&self, frame: Bytes) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(e) => {
                trace!(session_id = self.session_id, error = %e, "Dropped outbound frame");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Server-side state for one live client connection
#[derive(Debug)]
pub struct Session {
    peer: SocketAddr,
    authenticated: bool,
    account_id: Option<i32>,
    character: Option<Arc<Character>>,
    outbound: Outbound,
}

impl Session {
    pub fn new(peer: SocketAddr, outbound: Outbound) -> Self {
        Self {
            peer,
            authenticated: false,
            account_id: None,
            character: None,
            outbound,
        }
    }

    pub fn id(&self) -> u64 {
        self.outbound.session_id()
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn account_id(&self) -> Option<i32> {
        self.account_id
    }

    pub fn character(&self) -> Option<&Arc<Character>> {
        self.character.as_ref()
    }

    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    /// Where this session sits in the gate state machine
    pub fn state(&self) -> SessionState {
        if !self.authenticated {
            return SessionState::Unauthenticated;
        }
        match self.character.as_ref().and_then(|c| c.map()) {
            Some(_) => SessionState::InMap,
            None => SessionState::NoMap,
        }
    }

    /// Complete the connect handshake
    ///
    /// The account id is bound once; a later call for another account leaves
    /// the session untouched and returns `false`.
    pub(crate) fn authenticate(&mut self, account_id: i32, character: Arc<Character>) -> bool {
        if self.authenticated || self.account_id.is_some_and(|id| id != account_id) {
            return false;
        }
        self.account_id = Some(account_id);
        self.character = Some(character);
        self.authenticated = true;
        true
    }

    /// Detach the character for teardown
    pub(crate) fn take_character(&mut self) -> Option<Arc<Character>> {
        self.character.take()
    }

    pub async fn send(&self, frame: Bytes) -> Result<()> {
        self.outbound.send(frame).await
    }

    pub fn try_send(&self, frame: Bytes) -> bool {
        self.outbound.try_send(frame)
    }
}
