//! Append-only registry of circuit descriptors.

use crate::errors::EngineError;
use ark_bn254::Bn254;
use ark_groth16::{prepare_verifying_key, PreparedVerifyingKey, VerifyingKey};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use zk_circuits::groth16::vk_arity;

/// Immutable description of a verifiable circuit.
pub struct CircuitDescriptor {
    pub id: String,
    pub arity: usize,
    pub vk: VerifyingKey<Bn254>,
    pub pvk: PreparedVerifyingKey<Bn254>,
}

impl CircuitDescriptor {
    /// Descriptor whose arity is read off the verifying key.
    pub fn from_verifying_key(id: impl Into<String>, vk: VerifyingKey<Bn254>) -> Self {
        let arity = vk_arity(&vk);
        Self::with_arity(id, arity, vk)
    }

    /// Descriptor with an explicitly declared arity.
    pub fn with_arity(id: impl Into<String>, arity: usize, vk: VerifyingKey<Bn254>) -> Self {
        let pvk = prepare_verifying_key(&vk);
        Self { id: id.into(), arity, vk, pvk }
    }
}

impl std::fmt::Debug for CircuitDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitDescriptor")
            .field("id", &self.id)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct CircuitRegistry {
    circuits: RwLock<HashMap<String, Arc<CircuitDescriptor>>>,
}

impl CircuitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor. Ids are never replaced.
    pub fn register(&self, descriptor: CircuitDescriptor) -> Result<Arc<CircuitDescriptor>, EngineError> {
        let mut circuits = self.circuits.write();
        if circuits.contains_key(&descriptor.id) {
            return Err(EngineError::CircuitAlreadyRegistered(descriptor.id));
        }
        info!(circuit = %descriptor.id, arity = descriptor.arity, "circuit registered");
        let descriptor = Arc::new(descriptor);
        circuits.insert(descriptor.id.clone(), descriptor.clone());
        Ok(descriptor)
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.circuits.read().contains_key(id)
    }

    /// Look up a descriptor, failing closed for unknown ids.
    pub fn get(&self, id: &str) -> Result<Arc<CircuitDescriptor>, EngineError> {
        self.circuits
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownCircuit(id.to_string()))
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.circuits.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_append_only() {
        let registry = CircuitRegistry::new();
        assert!(!registry.is_registered("c"));
        registry
            .register(CircuitDescriptor::with_arity("c", 2, VerifyingKey::default()))
            .unwrap();
        assert!(registry.is_registered("c"));

        let again = registry.register(CircuitDescriptor::with_arity("c", 3, VerifyingKey::default()));
        assert_eq!(again.unwrap_err(), EngineError::CircuitAlreadyRegistered("c".into()));
        assert_eq!(registry.get("c").unwrap().arity, 2);
    }

    #[test]
    fn unknown_ids_fail_closed() {
        let registry = CircuitRegistry::new();
        assert_eq!(registry.get("nope").unwrap_err(), EngineError::UnknownCircuit("nope".into()));
    }
}
