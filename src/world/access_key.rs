//! # Access Keys
//!
//! Short-lived, single-use credentials that carry an account across a server
//! hop. The world server issues one when a client logs out toward another
//! server; the next server's connect handshake consumes it.
//!
//! ## Contract
//! - A key binds an account id to the address the client will reconnect from
//! - Validation consumes the key, so a second attempt fails
//! - Missing, expired or consumed keys all validate as `false`
//!
//! ## Usage
//! ```ignore
//! use world_protocol::world::access_key::{AccessKeys, MemoryAccessKeys};
//! use std::time::Duration;
//!
//! let keys = MemoryAccessKeys::new(1000, Duration::from_secs(60));
//! let issued = keys.issue(42, peer_ip).await?;
//! assert!(keys.validate(42, peer_ip).await?);
//! assert!(!keys.validate(42, peer_ip).await?);
//! ```

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::error::Result;

/// A credential handed to the next server in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessKey {
    pub account_id: i32,
    pub peer: IpAddr,
    pub key: u64,
}

/// Credential issuance and validation, possibly backed by a shared store
pub trait AccessKeys: Send + Sync {
    /// Issue a fresh key for `account_id`, replacing any outstanding one
    fn issue(&self, account_id: i32, peer: IpAddr) -> BoxFuture<'_, Result<AccessKey>>;

    /// Consume the key for `account_id` if it was issued to `peer`
    fn validate(&self, account_id: i32, peer: IpAddr) -> BoxFuture<'_, Result<bool>>;
}

#[derive(Clone, Debug)]
struct KeyEntry {
    key: AccessKey,
    created_at: SystemTime,
    ttl: Duration,
}

impl KeyEntry {
    fn is_expired(&self) -> bool {
        match self.created_at.elapsed() {
            Ok(elapsed) => elapsed > self.ttl,
            Err(_) => true, // clock went backward
        }
    }
}

struct KeyTable {
    entries: HashMap<i32, KeyEntry>,
    total_issued: u64,
}

/// In-process key store for a cluster sharing one address space
#[derive(Clone)]
pub struct MemoryAccessKeys {
    max_entries: usize,
    ttl: Duration,
    inner: Arc<Mutex<KeyTable>>,
}

impl MemoryAccessKeys {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            max_entries,
            ttl,
            inner: Arc::new(Mutex::new(KeyTable {
                entries: HashMap::with_capacity(max_entries.min(1024)),
                total_issued: 0,
            })),
        }
    }

    pub async fn issue_key(&self, account_id: i32, peer: IpAddr) -> AccessKey {
        let key = AccessKey {
            account_id,
            peer,
            key: rand::random::<u64>(),
        };

        let mut inner = self.inner.lock().await;
        self.evict_expired(&mut inner);

        inner.entries.insert(
            account_id,
            KeyEntry {
                key,
                created_at: SystemTime::now(),
                ttl: self.ttl,
            },
        );
        inner.total_issued += 1;

        if inner.entries.len() > self.max_entries {
            self.evict_oldest(&mut inner);
        }

        trace!(account_id, outstanding = inner.entries.len(), "Access key issued");
        key
    }

    /// Fails closed: only a live key for this account and address passes
    pub async fn consume(&self, account_id: i32, peer: IpAddr) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(entry) = inner.entries.remove(&account_id) else {
            trace!(account_id, "No access key outstanding");
            return false;
        };

        if entry.is_expired() {
            debug!(account_id, "Access key expired");
            return false;
        }

        if entry.key.peer != peer {
            debug!(account_id, %peer, "Access key presented from another address");
            return false;
        }

        true
    }

    pub async fn stats(&self) -> AccessKeyStats {
        let inner = self.inner.lock().await;
        AccessKeyStats {
            outstanding: inner.entries.len(),
            expired: inner.entries.values().filter(|e| e.is_expired()).count(),
            total_issued: inner.total_issued,
            max_entries: self.max_entries,
        }
    }

    fn evict_expired(&self, inner: &mut KeyTable) {
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !entry.is_expired());
        let after = inner.entries.len();

        if before != after {
            debug!(removed_count = before - after, remaining_count = after, "Expired access keys evicted");
        }
    }

    fn evict_oldest(&self, inner: &mut KeyTable) {
        if let Some(oldest) = inner
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.created_at)
            .map(|(account, _)| *account)
        {
            inner.entries.remove(&oldest);
            debug!(account_id = oldest, "Oldest access key evicted to make room");
        }
    }
}

impl AccessKeys for MemoryAccessKeys {
    fn issue(&self, account_id: i32, peer: IpAddr) -> BoxFuture<'_, Result<AccessKey>> {
        async move { Ok(self.issue_key(account_id, peer).await) }.boxed()
    }

    fn validate(&self, account_id: i32, peer: IpAddr) -> BoxFuture<'_, Result<bool>> {
        async move { Ok(self.consume(account_id, peer).await) }.boxed()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AccessKeyStats {
    pub outstanding: usize,
    pub expired: usize,
    pub total_issued: u64,
    pub max_entries: usize,
}
