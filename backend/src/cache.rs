//! Verified-proof cache.
//!
//! Keyed by `SHA-256(circuit id ‖ proof ‖ public inputs)`. An entry remembers the outcome of one pairing
//! check for `ttl` seconds. A lookup against an expired entry is a miss, never a cached
//! negative, and an entry's value is only ever replaced by a fresh verification after it
//! has expired.

use crate::errors::EngineError;
use ark_bn254::Fr;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use zk_circuits::types::fr_to_bytes;

pub const MIN_CACHE_TTL_SECS: u64 = 60 * 60;
pub const MAX_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

pub type CacheKey = [u8; 32];

/// Hash of the circuit id, the proof bytes and each public input's canonical encoding.
/// A result is only ever reused for the verifying key it was checked against.
pub fn cache_key(circuit_id: &str, proof: &[u8], public_inputs: &[Fr]) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update((circuit_id.len() as u64).to_le_bytes());
    hasher.update(circuit_id.as_bytes());
    hasher.update((proof.len() as u64).to_le_bytes());
    hasher.update(proof);
    for input in public_inputs {
        hasher.update(fr_to_bytes(input));
    }
    hasher.finalize().into()
}

pub fn validate_ttl(secs: u64) -> Result<u64, EngineError> {
    if !(MIN_CACHE_TTL_SECS..=MAX_CACHE_TTL_SECS).contains(&secs) {
        return Err(EngineError::CacheTtlOutOfRange {
            got: secs,
            min: MIN_CACHE_TTL_SECS,
            max: MAX_CACHE_TTL_SECS,
        });
    }
    Ok(secs)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    pub verified: bool,
    pub timestamp: u64,
}

#[derive(Debug)]
pub struct ProofCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    ttl: RwLock<u64>,
}

impl ProofCache {
    pub fn new(ttl_secs: u64) -> Result<Self, EngineError> {
        Ok(Self {
            entries: RwLock::new(HashMap::new()),
            ttl: RwLock::new(validate_ttl(ttl_secs)?),
        })
    }

    pub fn ttl(&self) -> u64 {
        *self.ttl.read()
    }

    pub fn set_ttl(&self, secs: u64) -> Result<(), EngineError> {
        *self.ttl.write() = validate_ttl(secs)?;
        Ok(())
    }

    fn is_live(&self, entry: &CacheEntry, now: u64) -> bool {
        now <= entry.timestamp.saturating_add(self.ttl())
    }

    /// Live entry for `key`, if any.
    pub fn get(&self, key: &CacheKey, now: u64) -> Option<CacheEntry> {
        let entry = self.entries.read().get(key).copied()?;
        self.is_live(&entry, now).then_some(entry)
    }

    /// Store a fresh result. A live entry is left untouched and returned instead, so two
    /// racing writers converge on the first value.
    pub fn insert(&self, key: CacheKey, verified: bool, now: u64) -> CacheEntry {
        let ttl = self.ttl();
        let mut entries = self.entries.write();
        match entries.get(&key) {
            Some(existing) if now <= existing.timestamp.saturating_add(ttl) => *existing,
            _ => {
                let entry = CacheEntry { verified, timestamp: now };
                entries.insert(key, entry);
                entry
            }
        }
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self, now: u64) -> usize {
        let ttl = self.ttl();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| now <= e.timestamp.saturating_add(ttl));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
