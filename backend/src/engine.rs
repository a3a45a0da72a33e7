//! Verification engine: registry lookup, arity check, cache, pairing check, statistics.
//!
//! `verify` is linearizable per cache key. Concurrent verifications of the same
//! `(circuit, proof, public inputs)` triple serialize on a per-key slot, so only the first performs the
//! pairing check and the rest read its cached result.

use crate::cache::{cache_key, CacheKey, ProofCache};
use crate::clock::Clock;
use crate::errors::EngineError;
use crate::registry::{CircuitDescriptor, CircuitRegistry};
use ark_bn254::{Bn254, Fr};
use ark_groth16::Proof;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use zk_circuits::groth16::{deserialize_proof, verify_prepared};

pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;

/// The pairing-check primitive the engine calls into.
pub trait PairingCheck: Send + Sync {
    fn check(&self, descriptor: &CircuitDescriptor, proof: &Proof<Bn254>, public_inputs: &[Fr]) -> bool;
}

/// Groth16 over BN254.
#[derive(Debug, Default, Clone, Copy)]
pub struct Groth16Check;

impl PairingCheck for Groth16Check {
    fn check(&self, descriptor: &CircuitDescriptor, proof: &Proof<Bn254>, public_inputs: &[Fr]) -> bool {
        match verify_prepared(&descriptor.pvk, proof, public_inputs) {
            Ok(ok) => ok,
            Err(e) => {
                warn!(circuit = %descriptor.id, error = %e, "pairing check errored");
                false
            }
        }
    }
}

/// One element of a batch.
#[derive(Clone, Debug)]
pub struct BatchItem {
    pub circuit_id: String,
    pub proof: Vec<u8>,
    pub public_inputs: Vec<Fr>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub results: Vec<bool>,
    pub success_count: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationStats {
    pub total: u64,
    pub valid: u64,
    pub success_rate_percent: u64,
}

#[derive(Clone, Copy, Debug, Default)]
struct Counter {
    total: u64,
    valid: u64,
}

impl Counter {
    fn record(&mut self, ok: bool) {
        self.total += 1;
        if ok {
            self.valid += 1;
        }
    }

    fn stats(self) -> VerificationStats {
        let success_rate_percent = if self.total == 0 { 0 } else { self.valid * 100 / self.total };
        VerificationStats { total: self.total, valid: self.valid, success_rate_percent }
    }
}

pub struct VerificationEngine {
    registry: CircuitRegistry,
    cache: ProofCache,
    pairing: Arc<dyn PairingCheck>,
    clock: Arc<dyn Clock>,
    inflight: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
    circuit_stats: Mutex<HashMap<String, Counter>>,
    caller_stats: Mutex<HashMap<String, Counter>>,
    max_batch_size: usize,
}

impl VerificationEngine {
    pub fn new(
        cache: ProofCache,
        pairing: Arc<dyn PairingCheck>,
        clock: Arc<dyn Clock>,
        max_batch_size: usize,
    ) -> Self {
        Self {
            registry: CircuitRegistry::new(),
            cache,
            pairing,
            clock,
            inflight: Mutex::new(HashMap::new()),
            circuit_stats: Mutex::new(HashMap::new()),
            caller_stats: Mutex::new(HashMap::new()),
            max_batch_size,
        }
    }

    pub fn registry(&self) -> &CircuitRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &ProofCache {
        &self.cache
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    pub fn register(&self, descriptor: CircuitDescriptor) -> Result<(), EngineError> {
        self.registry.register(descriptor).map(|_| ())
    }

    pub fn is_circuit_registered(&self, id: &str) -> bool {
        self.registry.is_registered(id)
    }

    /// Verify a proof for `circuit_id` on behalf of an anonymous caller.
    pub fn verify(&self, circuit_id: &str, proof: &[u8], public_inputs: &[Fr]) -> Result<bool, EngineError> {
        self.verify_at(circuit_id, proof, public_inputs, None, self.clock.now())
    }

    /// Verify and attribute the pairing check to `caller` in the per-caller counters.
    pub fn verify_as(
        &self,
        caller: &str,
        circuit_id: &str,
        proof: &[u8],
        public_inputs: &[Fr],
    ) -> Result<bool, EngineError> {
        self.verify_at(circuit_id, proof, public_inputs, Some(caller), self.clock.now())
    }

    /// Core of `verify`, evaluated against an explicit `now` read from the engine clock.
    pub(crate) fn verify_at(
        &self,
        circuit_id: &str,
        proof: &[u8],
        public_inputs: &[Fr],
        caller: Option<&str>,
        now: u64,
    ) -> Result<bool, EngineError> {
        let descriptor = self.registry.get(circuit_id)?;
        if public_inputs.len() != descriptor.arity {
            return Err(EngineError::ArityMismatch { expected: descriptor.arity, got: public_inputs.len() });
        }

        let key = cache_key(circuit_id, proof, public_inputs);
        if let Some(hit) = self.cache.get(&key, now) {
            debug!(circuit = circuit_id, "proof cache hit");
            return Ok(hit.verified);
        }

        let slot = self.inflight.lock().entry(key).or_default().clone();
        let result = {
            let _guard = slot.lock();
            self.verify_miss(&descriptor, &key, proof, public_inputs, caller, now)
        };

        let mut inflight = self.inflight.lock();
        // Only the map and this call still hold the slot: nobody else is waiting on it.
        if Arc::strong_count(&slot) == 2 {
            inflight.remove(&key);
        }
        result
    }

    fn verify_miss(
        &self,
        descriptor: &CircuitDescriptor,
        key: &CacheKey,
        proof: &[u8],
        public_inputs: &[Fr],
        caller: Option<&str>,
        now: u64,
    ) -> Result<bool, EngineError> {
        // Another caller may have finished the same check while we waited for the slot.
        if let Some(hit) = self.cache.get(key, now) {
            debug!(circuit = %descriptor.id, "proof cache hit after wait");
            return Ok(hit.verified);
        }

        let parsed = deserialize_proof(proof).map_err(|e| EngineError::MalformedProof(e.to_string()))?;

        debug!(circuit = %descriptor.id, "proof cache miss, running pairing check");
        let ok = self.pairing.check(descriptor, &parsed, public_inputs);
        let entry = self.cache.insert(*key, ok, now);

        self.circuit_stats.lock().entry(descriptor.id.clone()).or_default().record(ok);
        if let Some(caller) = caller {
            self.caller_stats.lock().entry(caller.to_string()).or_default().record(ok);
        }

        info!(circuit = %descriptor.id, verified = ok, "proof verified");
        Ok(entry.verified)
    }

    /// Verify up to `max_batch_size` proofs. Every item is isolated: an error on one item
    /// yields `false` in its slot and never affects its siblings. All items share one `now`.
    pub fn verify_batch(&self, items: &[BatchItem]) -> Result<BatchOutcome, EngineError> {
        self.verify_batch_as(None, items)
    }

    pub fn verify_batch_as(&self, caller: Option<&str>, items: &[BatchItem]) -> Result<BatchOutcome, EngineError> {
        if items.is_empty() || items.len() > self.max_batch_size {
            return Err(EngineError::BatchSizeOutOfRange { got: items.len(), max: self.max_batch_size });
        }

        let now = self.clock.now();
        let results: Vec<bool> = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                match self.verify_at(&item.circuit_id, &item.proof, &item.public_inputs, caller, now) {
                    Ok(ok) => ok,
                    Err(e) => {
                        debug!(index = i, circuit = %item.circuit_id, error = %e, "batch item rejected");
                        false
                    }
                }
            })
            .collect();

        let success_count = results.iter().filter(|r| **r).count();
        info!(size = items.len(), success_count, "batch verified");
        Ok(BatchOutcome { results, success_count })
    }

    /// `(total, valid, success rate)` of pairing checks run for a registered circuit.
    pub fn stats(&self, circuit_id: &str) -> Result<VerificationStats, EngineError> {
        self.registry.get(circuit_id)?;
        Ok(self.circuit_stats.lock().get(circuit_id).copied().unwrap_or_default().stats())
    }

    /// Same counters attributed to a caller; unknown callers report zeros.
    pub fn caller_stats(&self, caller: &str) -> VerificationStats {
        self.caller_stats.lock().get(caller).copied().unwrap_or_default().stats()
    }

    pub fn purge_expired(&self) -> usize {
        let removed = self.cache.purge_expired(self.clock.now());
        if removed > 0 {
            info!(removed, "purged expired proof cache entries");
        }
        removed
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::DEFAULT_CACHE_TTL_SECS;
    use crate::clock::ManualClock;
    use ark_groth16::VerifyingKey;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use zk_circuits::groth16::serialize_proof;

    /// Pairing check stub: accepts when the first public input is odd, counts invocations.
    #[derive(Default)]
    pub(crate) struct CountingCheck {
        pub calls: AtomicUsize,
    }

    impl PairingCheck for CountingCheck {
        fn check(&self, _d: &CircuitDescriptor, _p: &Proof<Bn254>, inputs: &[Fr]) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            inputs.first().is_some_and(|x| *x == Fr::from(1u64))
        }
    }

    pub(crate) fn proof_bytes() -> Vec<u8> {
        serialize_proof(&Proof::<Bn254>::default()).unwrap()
    }

    fn engine() -> (VerificationEngine, Arc<CountingCheck>, Arc<ManualClock>) {
        let check = Arc::new(CountingCheck::default());
        let clock = Arc::new(ManualClock::new(1_000));
        let engine = VerificationEngine::new(
            ProofCache::new(DEFAULT_CACHE_TTL_SECS).unwrap(),
            check.clone(),
            clock.clone(),
            DEFAULT_MAX_BATCH_SIZE,
        );
        engine.register(CircuitDescriptor::with_arity("two", 2, VerifyingKey::default())).unwrap();
        (engine, check, clock)
    }

    fn good() -> Vec<Fr> {
        vec![Fr::from(1u64), Fr::from(2u64)]
    }

    #[test]
    fn second_verify_is_a_cache_hit() {
        let (engine, check, _clock) = engine();
        assert!(engine.verify("two", &proof_bytes(), &good()).unwrap());
        assert!(engine.verify("two", &proof_bytes(), &good()).unwrap());
        assert_eq!(check.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn negative_results_are_cached_too() {
        let (engine, check, _clock) = engine();
        let bad = vec![Fr::from(0u64), Fr::from(2u64)];
        assert!(!engine.verify("two", &proof_bytes(), &bad).unwrap());
        assert!(!engine.verify("two", &proof_bytes(), &bad).unwrap());
        assert_eq!(check.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn expired_entry_is_reverified() {
        let (engine, check, clock) = engine();
        engine.verify("two", &proof_bytes(), &good()).unwrap();
        clock.advance(DEFAULT_CACHE_TTL_SECS + 1);
        assert!(engine.verify("two", &proof_bytes(), &good()).unwrap());
        assert_eq!(check.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unknown_circuit_and_arity_fail_before_the_pairing_check() {
        let (engine, check, _clock) = engine();
        assert_eq!(
            engine.verify("nope", &proof_bytes(), &good()).unwrap_err(),
            EngineError::UnknownCircuit("nope".into())
        );
        for len in [0usize, 1, 3, 6] {
            let inputs = vec![Fr::from(1u64); len];
            assert_eq!(
                engine.verify("two", &proof_bytes(), &inputs).unwrap_err(),
                EngineError::ArityMismatch { expected: 2, got: len }
            );
        }
        assert_eq!(check.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn malformed_proof_is_rejected_and_not_cached() {
        let (engine, check, _clock) = engine();
        let err = engine.verify("two", &[1, 2, 3], &good()).unwrap_err();
        assert!(matches!(err, EngineError::MalformedProof(_)));
        assert!(engine.cache().is_empty());
        assert_eq!(check.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn batch_isolates_failing_items() {
        let (engine, _check, _clock) = engine();
        let mut items: Vec<BatchItem> = (0..4)
            .map(|i| BatchItem {
                circuit_id: "two".into(),
                proof: proof_bytes(),
                public_inputs: vec![Fr::from(1u64), Fr::from(i as u64)],
            })
            .collect();
        items.insert(2, BatchItem { circuit_id: "unregistered".into(), proof: proof_bytes(), public_inputs: good() });

        let outcome = engine.verify_batch(&items).unwrap();
        assert_eq!(outcome.results, vec![true, true, false, true, true]);
        assert_eq!(outcome.success_count, 4);
    }

    #[test]
    fn batch_size_is_bounded() {
        let (engine, _check, _clock) = engine();
        assert!(matches!(engine.verify_batch(&[]), Err(EngineError::BatchSizeOutOfRange { .. })));
        let item = BatchItem { circuit_id: "two".into(), proof: proof_bytes(), public_inputs: good() };
        let items = vec![item; DEFAULT_MAX_BATCH_SIZE + 1];
        assert!(matches!(engine.verify_batch(&items), Err(EngineError::BatchSizeOutOfRange { got: 51, .. })));
    }

    #[test]
    fn stats_count_pairing_checks_per_circuit_and_caller() {
        let (engine, _check, _clock) = engine();
        engine.verify_as("escrow", "two", &proof_bytes(), &good()).unwrap();
        engine
            .verify_as("escrow", "two", &proof_bytes(), &[Fr::from(0u64), Fr::from(9u64)])
            .unwrap();
        engine.verify("two", &proof_bytes(), &[Fr::from(1u64), Fr::from(9u64)]).unwrap();

        let s = engine.stats("two").unwrap();
        assert_eq!((s.total, s.valid, s.success_rate_percent), (3, 2, 66));
        let c = engine.caller_stats("escrow");
        assert_eq!((c.total, c.valid, c.success_rate_percent), (2, 1, 50));
        assert_eq!(engine.caller_stats("nobody"), VerificationStats::default());
        assert!(engine.stats("nope").is_err());
    }

    #[test]
    fn cached_results_stay_bound_to_their_circuit() {
        let (engine, check, _clock) = engine();
        engine.register(CircuitDescriptor::with_arity("other", 2, VerifyingKey::default())).unwrap();

        assert!(engine.verify("two", &proof_bytes(), &good()).unwrap());
        // Same proof and inputs under another id runs its own pairing check.
        assert!(engine.verify("other", &proof_bytes(), &good()).unwrap());
        assert_eq!(check.calls.load(Ordering::SeqCst), 2);
        assert_eq!(engine.cache().len(), 2);
    }

    #[test]
    fn concurrent_verifications_run_one_pairing_check() {
        let (engine, check, _clock) = engine();
        let engine = Arc::new(engine);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                std::thread::spawn(move || engine.verify("two", &proof_bytes(), &good()).unwrap())
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(check.calls.load(Ordering::SeqCst), 1);
    }
}
