//! Round-robin API key pool.

use super::provider::UpstreamError;
use std::fmt;

/// API keys handed out one per request, in order, wrapping around.
///
/// The rotation index is plain owned state: the scraper is single-threaded.
/// Sharing a pool across threads would need an atomic index instead.
pub struct KeyPool {
    keys: Vec<String>,
    next: usize,
}

impl KeyPool {
    /// Blank keys are dropped. An empty pool is an error.
    pub fn new(keys: Vec<String>) -> Result<Self, UpstreamError> {
        let keys: Vec<String> = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if keys.is_empty() {
            return Err(UpstreamError::NoApiKeys);
        }
        Ok(Self { keys, next: 0 })
    }

    /// Key for the next request; advances the rotation.
    pub fn next_key(&mut self) -> &str {
        let index = self.next;
        self.next = (self.next + 1) % self.keys.len();
        &self.keys[index]
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl fmt::Debug for KeyPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prints: Vec<String> = self.keys.iter().map(|k| key_fingerprint(k)).collect();
        f.debug_struct("KeyPool")
            .field("keys", &prints)
            .field("next", &self.next)
            .finish()
    }
}

/// Short BLAKE3 fingerprint of a key, safe to log.
pub fn key_fingerprint(key: &str) -> String {
    blake3::hash(key.as_bytes()).to_hex().as_str()[..8].to_string()
}
