//! Single-use nullifier registry.

use ark_bn254::Fr;
use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::warn;
use zk_circuits::types::fr_to_bytes;

pub type NullifierKey = [u8; 32];

pub fn nullifier_key(nullifier: &Fr) -> NullifierKey {
    let mut key = [0u8; 32];
    let bytes = fr_to_bytes(nullifier);
    key[..bytes.len()].copy_from_slice(&bytes);
    key
}

/// Used nullifiers. Entries are never removed.
#[derive(Debug, Default)]
pub struct NullifierRegistry {
    used: Mutex<HashSet<NullifierKey>>,
}

impl NullifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `nullifier` used. Returns `false` if it already was; of two racing claims of
    /// the same nullifier exactly one returns `true`.
    pub fn claim(&self, nullifier: &Fr) -> bool {
        let fresh = self.used.lock().insert(nullifier_key(nullifier));
        if !fresh {
            warn!(nullifier = %hex::encode(nullifier_key(nullifier)), "nullifier replay rejected");
        }
        fresh
    }

    pub fn is_used(&self, nullifier: &Fr) -> bool {
        self.used.lock().contains(&nullifier_key(nullifier))
    }

    /// Restore previously persisted nullifiers.
    pub fn hydrate(&self, keys: impl IntoIterator<Item = NullifierKey>) {
        self.used.lock().extend(keys);
    }

    pub fn len(&self) -> usize {
        self.used.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn claim_succeeds_once() {
        let registry = NullifierRegistry::new();
        let n = Fr::from(42u64);
        assert!(!registry.is_used(&n));
        assert!(registry.claim(&n));
        assert!(registry.is_used(&n));
        for _ in 0..3 {
            assert!(!registry.claim(&n));
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn hydrated_nullifiers_stay_used() {
        let registry = NullifierRegistry::new();
        registry.hydrate([nullifier_key(&Fr::from(7u64))]);
        assert!(!registry.claim(&Fr::from(7u64)));
        assert!(registry.claim(&Fr::from(8u64)));
    }

    #[test]
    fn racing_claims_have_one_winner() {
        let registry = Arc::new(NullifierRegistry::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.claim(&Fr::from(99u64)))
            })
            .collect();
        let winners = handles.into_iter().map(|h| h.join().unwrap()).filter(|won| *won).count();
        assert_eq!(winners, 1);
    }
}
