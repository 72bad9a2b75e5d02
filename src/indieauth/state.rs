//! Bounded store of in-flight login attempts keyed by their `state` token.

use std::{fmt::Write, num::NonZeroUsize};

use lru::LruCache;
use rand::{rngs::OsRng, RngCore};
use tokio::sync::Mutex;

use super::error::ConfigError;

const STATE_BYTES: usize = 12;

/// Maps one-time `state` tokens to the path the visitor originally asked for.
///
/// Capacity is fixed; inserting past it evicts the least recently used entry.
/// There is no time-based expiry.
pub struct StateCache {
    entries: Mutex<LruCache<String, String>>,
    capacity: NonZeroUsize,
}

impl StateCache {
    /// # Errors
    /// Returns an error if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        let capacity = NonZeroUsize::new(capacity).ok_or(ConfigError::ZeroStateCapacity)?;
        Ok(Self {
            entries: Mutex::new(LruCache::new(capacity)),
            capacity,
        })
    }

    pub async fn put(&self, token: String, path: String) {
        self.entries.lock().await.put(token, path);
    }

    /// Look up a token without consuming it.
    pub async fn get(&self, token: &str) -> Option<String> {
        self.entries.lock().await.get(token).cloned()
    }

    /// Look up and remove a token so it cannot be replayed.
    pub async fn take(&self, token: &str) -> Option<String> {
        self.entries.lock().await.pop(token)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }
}

/// 12 random bytes from the OS, hex encoded.
///
/// # Errors
/// Returns an error if the OS random source fails.
pub fn generate_state() -> Result<String, rand::Error> {
    let mut bytes = [0u8; STATE_BYTES];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(bytes
        .iter()
        .fold(String::with_capacity(STATE_BYTES * 2), |mut acc, byte| {
            let _ = write!(acc, "{byte:02x}");
            acc
        }))
}
