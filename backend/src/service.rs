//! The compliance service: verification engine composed with the nullifier registry,
//! privacy settings, jurisdiction registry and per-user submitted proofs.

use crate::cache::ProofCache;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::engine::{BatchItem, BatchOutcome, PairingCheck, VerificationEngine, VerificationStats};
use crate::errors::EngineError;
use crate::jurisdiction::{ActiveJurisdiction, Jurisdiction, JurisdictionRegistry};
use crate::nullifier::NullifierRegistry;
use crate::registry::CircuitDescriptor;
use crate::settings::{PrivacySettings, SettingsStore};
use ark_bn254::Fr;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use zk_circuits::CircuitKind;

/// Index of the nullifier in the whitelist circuit's public inputs.
const WHITELIST_NULLIFIER_INPUT: usize = 1;

#[derive(Clone, Debug)]
pub struct ProofRecord {
    pub public_inputs: Vec<Fr>,
    pub proof: Vec<u8>,
    pub submitted_at: u64,
    pub valid: bool,
}

impl ProofRecord {
    pub fn expires_at(&self, validity_secs: u64) -> u64 {
        self.submitted_at.saturating_add(validity_secs)
    }

    pub fn is_expired(&self, validity_secs: u64, now: u64) -> bool {
        now > self.expires_at(validity_secs)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStatus {
    pub present: bool,
    pub valid: bool,
    pub expired: bool,
    pub submitted_at: Option<u64>,
    pub expires_at: Option<u64>,
}

/// A verified submission waiting to be committed.
#[derive(Clone, Debug)]
pub struct Submission {
    pub user: String,
    pub kind: CircuitKind,
    pub proof: Vec<u8>,
    pub public_inputs: Vec<Fr>,
    /// Set only for a valid whitelist proof; claimed on commit.
    pub nullifier: Option<Fr>,
    pub valid: bool,
}

pub struct ComplianceService {
    engine: VerificationEngine,
    nullifiers: NullifierRegistry,
    settings: SettingsStore,
    jurisdictions: JurisdictionRegistry,
    proofs: RwLock<HashMap<(String, CircuitKind), ProofRecord>>,
}

impl ComplianceService {
    pub fn new(
        engine: &EngineConfig,
        default_settings: PrivacySettings,
        clock: Arc<dyn Clock>,
        pairing: Arc<dyn PairingCheck>,
    ) -> Result<Self, EngineError> {
        let cache = ProofCache::new(engine.cache_ttl_secs)?;
        Ok(Self {
            engine: VerificationEngine::new(cache, pairing, clock, engine.max_batch_size),
            nullifiers: NullifierRegistry::new(),
            settings: SettingsStore::new(default_settings)?,
            jurisdictions: JurisdictionRegistry::new(),
            proofs: RwLock::new(HashMap::new()),
        })
    }

    pub fn engine(&self) -> &VerificationEngine {
        &self.engine
    }

    pub fn nullifiers(&self) -> &NullifierRegistry {
        &self.nullifiers
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn jurisdictions(&self) -> &JurisdictionRegistry {
        &self.jurisdictions
    }

    pub fn now(&self) -> u64 {
        self.engine.clock().now()
    }

    pub fn register_circuit(&self, descriptor: CircuitDescriptor) -> Result<(), EngineError> {
        self.engine.register(descriptor)
    }

    pub fn is_circuit_registered(&self, id: &str) -> bool {
        self.engine.is_circuit_registered(id)
    }

    pub fn verify(&self, caller: Option<&str>, id: &str, proof: &[u8], inputs: &[Fr]) -> Result<bool, EngineError> {
        match caller {
            Some(caller) => self.engine.verify_as(caller, id, proof, inputs),
            None => self.engine.verify(id, proof, inputs),
        }
    }

    pub fn verify_batch(&self, caller: Option<&str>, items: &[BatchItem]) -> Result<BatchOutcome, EngineError> {
        self.engine.verify_batch_as(caller, items)
    }

    pub fn get_stats(&self, id: &str) -> Result<VerificationStats, EngineError> {
        self.engine.stats(id)
    }

    pub fn caller_stats(&self, caller: &str) -> VerificationStats {
        self.engine.caller_stats(caller)
    }

    pub fn claim_nullifier(&self, nullifier: &Fr) -> bool {
        self.nullifiers.claim(nullifier)
    }

    pub fn purge_expired(&self) -> usize {
        self.engine.purge_expired()
    }

    pub fn set_cache_ttl(&self, secs: u64) -> Result<(), EngineError> {
        self.engine.cache().set_ttl(secs)?;
        info!(ttl_secs = secs, "proof cache ttl updated");
        Ok(())
    }

    pub fn cache_len(&self) -> usize {
        self.engine.cache().len()
    }

    pub fn get_settings(&self, user: &str) -> PrivacySettings {
        self.settings.get(user)
    }

    pub fn set_settings(&self, user: &str, settings: PrivacySettings) -> Result<(), EngineError> {
        self.settings.set(user, settings)
    }

    pub fn set_default_settings(&self, settings: PrivacySettings) -> Result<(), EngineError> {
        self.settings.set_default(settings)
    }

    pub fn is_feature_enabled(&self, user: &str, kind: CircuitKind) -> bool {
        self.settings.is_feature_enabled(user, kind)
    }

    pub fn add_jurisdiction(&self, name: &str, code: &str) -> Result<Jurisdiction, EngineError> {
        self.jurisdictions.add(name, code, self.now())
    }

    pub fn remove_jurisdiction(&self, code: &str) -> Result<(), EngineError> {
        self.jurisdictions.remove(code)
    }

    pub fn set_jurisdiction_active(&self, code: &str, active: bool) -> Result<Jurisdiction, EngineError> {
        self.jurisdictions.set_active(code, active)
    }

    pub fn list_active_jurisdictions(&self) -> Vec<ActiveJurisdiction> {
        self.jurisdictions.list_active()
    }

    /// Verify and store a user's proof for `kind`, replacing any earlier submission.
    ///
    /// Whitelist proofs consume their nullifier only when they verify; a replayed
    /// nullifier fails before the pairing check and leaves the stored record untouched.
    pub fn submit_proof(
        &self,
        user: &str,
        kind: CircuitKind,
        proof: &[u8],
        public_inputs: &[Fr],
    ) -> Result<bool, EngineError> {
        let submission = self.verify_submission(user, kind, proof, public_inputs)?;
        self.commit_submission(submission)
    }

    /// First half of [`submit_proof`](Self::submit_proof): settings gate, nullifier
    /// pre-check and verification. Nothing is claimed or stored yet, so a caller can make
    /// the nullifier durable before committing.
    pub fn verify_submission(
        &self,
        user: &str,
        kind: CircuitKind,
        proof: &[u8],
        public_inputs: &[Fr],
    ) -> Result<Submission, EngineError> {
        if !self.settings.is_feature_enabled(user, kind) {
            return Err(EngineError::FeatureDisabled(kind));
        }

        let nullifier = match kind {
            CircuitKind::WhitelistMembership => public_inputs.get(WHITELIST_NULLIFIER_INPUT).copied(),
            _ => None,
        };
        if nullifier.is_some_and(|n| self.nullifiers.is_used(&n)) {
            warn!(user, "whitelist proof with used nullifier rejected");
            return Err(EngineError::NullifierAlreadyUsed);
        }

        let valid = self.engine.verify_as(user, kind.id(), proof, public_inputs)?;
        Ok(Submission {
            user: user.to_string(),
            kind,
            proof: proof.to_vec(),
            public_inputs: public_inputs.to_vec(),
            nullifier: if valid { nullifier } else { None },
            valid,
        })
    }

    /// Claim the submission's nullifier, if any, and store its record.
    pub fn commit_submission(&self, submission: Submission) -> Result<bool, EngineError> {
        if let Some(n) = &submission.nullifier {
            if !self.nullifiers.claim(n) {
                return Err(EngineError::NullifierAlreadyUsed);
            }
        }

        let Submission { user, kind, proof, public_inputs, valid, .. } = submission;
        let record = ProofRecord { public_inputs, proof, submitted_at: self.now(), valid };
        info!(user = %user, circuit = %kind, valid, "proof submitted");
        self.proofs.write().insert((user, kind), record);
        Ok(valid)
    }

    pub fn proof_record(&self, user: &str, kind: CircuitKind) -> Option<ProofRecord> {
        self.proofs.read().get(&(user.to_string(), kind)).cloned()
    }

    /// Expiry is judged now, against the user's current validity period.
    pub fn proof_status(&self, user: &str, kind: CircuitKind) -> ProofStatus {
        let Some(record) = self.proof_record(user, kind) else {
            return ProofStatus::default();
        };
        let validity = self.settings.get(user).validity_period_secs;
        ProofStatus {
            present: true,
            valid: record.valid,
            expired: record.is_expired(validity, self.now()),
            submitted_at: Some(record.submitted_at),
            expires_at: Some(record.expires_at(validity)),
        }
    }

    /// The reason `user` has no usable proof for `kind`, if any.
    pub fn require_valid_proof(&self, user: &str, kind: CircuitKind) -> Result<(), EngineError> {
        if !self.settings.is_feature_enabled(user, kind) {
            return Err(EngineError::FeatureDisabled(kind));
        }
        let status = self.proof_status(user, kind);
        if !status.present {
            return Err(EngineError::NoProofSubmitted(kind));
        }
        if !status.valid {
            return Err(EngineError::InvalidProof(kind));
        }
        if status.expired {
            return Err(EngineError::ExpiredProof(kind));
        }
        Ok(())
    }

    pub fn has_valid_proof(&self, user: &str, kind: CircuitKind) -> bool {
        self.require_valid_proof(user, kind).is_ok()
    }

    /// True when every proof type the user has enabled is backed by a live, valid proof.
    pub fn is_fully_compliant(&self, user: &str) -> bool {
        let settings = self.settings.get(user);
        CircuitKind::ALL
            .into_iter()
            .filter(|k| settings.is_enabled(*k))
            .all(|k| self.has_valid_proof(user, k))
    }
}
