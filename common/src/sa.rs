// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Security association registry.
//!
//! Maps an opaque SA id to the symmetric key shared with one client. A single
//! mutex guards the whole map; every critical section is one map operation.
//! Re-registering an id replaces (and thereby revokes) the previous key.
//!
//! Entries live for the process lifetime unless the store was built with a
//! lifetime, in which case lookups past expiry miss and
//! [`SaStore::purge_expired`] drops them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::RngCore;
use tokio::sync::Mutex;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::aead::{self, KEY_LEN};
use crate::error::{Error, Result};

/// AES-256 key shared between the proxy and one client.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; KEY_LEN]);

impl SessionKey {
    /// Draw a random key from the OS RNG.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut key);
        Self(key)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| Error::InvalidKeyLength {
            expected: KEY_LEN,
            got: bytes.len(),
        })?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// A registered security association.
#[derive(Debug)]
pub struct SecurityAssociation {
    id: String,
    key: SessionKey,
    expires_at: Option<Instant>,
}

impl SecurityAssociation {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|t| now >= t)
    }

    /// Seal `plaintext` under this association's key.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        aead::encrypt(self.key.as_bytes(), plaintext)
    }

    /// Open a frame sealed under this association's key.
    pub fn decrypt(&self, frame: &[u8]) -> Result<Vec<u8>> {
        aead::decrypt(self.key.as_bytes(), frame)
    }
}

/// Thread-safe SA registry.
pub struct SaStore {
    /// Lifetime of new entries; `None` keeps them until overwritten
    lifetime: Option<Duration>,
    entries: Mutex<HashMap<String, Arc<SecurityAssociation>>>,
}

impl SaStore {
    pub fn new(lifetime: Option<Duration>) -> Self {
        Self {
            lifetime,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn lifetime(&self) -> Option<Duration> {
        self.lifetime
    }

    /// Insert or overwrite the association for `id`.
    pub async fn put(&self, id: impl Into<String>, key: SessionKey) -> Arc<SecurityAssociation> {
        self.put_at(id.into(), key, Instant::now()).await
    }

    async fn put_at(&self, id: String, key: SessionKey, now: Instant) -> Arc<SecurityAssociation> {
        let sa = Arc::new(SecurityAssociation {
            expires_at: self.lifetime.map(|lifetime| now + lifetime),
            id,
            key,
        });

        let replaced = {
            let mut entries = self.entries.lock().await;
            entries.insert(sa.id.clone(), Arc::clone(&sa)).is_some()
        };
        debug!(sa = %sa.id, replaced, "registered security association");
        sa
    }

    /// Look up the association for `id`.
    pub async fn get(&self, id: &str) -> Option<Arc<SecurityAssociation>> {
        self.get_at(id, Instant::now()).await
    }

    async fn get_at(&self, id: &str, now: Instant) -> Option<Arc<SecurityAssociation>> {
        let mut entries = self.entries.lock().await;
        match entries.get(id) {
            Some(sa) if sa.is_expired_at(now) => {
                entries.remove(id);
                None
            }
            Some(sa) => Some(Arc::clone(sa)),
            None => None,
        }
    }

    /// Drop the association for `id`. Returns whether one existed.
    pub async fn remove(&self, id: &str) -> bool {
        self.entries.lock().await.remove(id).is_some()
    }

    /// Drop expired associations (should be called periodically when a
    /// lifetime is configured). Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now()).await
    }

    async fn purge_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, sa| !sa.is_expired_at(now));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl Default for SaStore {
    fn default() -> Self {
        Self::new(None)
    }
}
