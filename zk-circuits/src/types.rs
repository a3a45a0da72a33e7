//! Types shared between the circuits, the host-side prover/verifier and the backend.

use ark_bn254::{Bn254, Fr};
use ark_groth16::Proof;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four compliance predicates the engine knows how to prove.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitKind {
    WhitelistMembership,
    JurisdictionEligibility,
    AccreditationThreshold,
    ComplianceAggregation,
}

impl CircuitKind {
    pub const ALL: [CircuitKind; 4] = [
        CircuitKind::WhitelistMembership,
        CircuitKind::JurisdictionEligibility,
        CircuitKind::AccreditationThreshold,
        CircuitKind::ComplianceAggregation,
    ];

    /// Stable circuit identifier used for registration and key files.
    pub fn id(self) -> &'static str {
        match self {
            CircuitKind::WhitelistMembership => "whitelist_membership",
            CircuitKind::JurisdictionEligibility => "jurisdiction_eligibility",
            CircuitKind::AccreditationThreshold => "accreditation_threshold",
            CircuitKind::ComplianceAggregation => "compliance_aggregation",
        }
    }

    /// Number of public inputs, in the order documented on each circuit.
    pub fn arity(self) -> usize {
        match self {
            CircuitKind::WhitelistMembership => 2,
            CircuitKind::JurisdictionEligibility => 2,
            CircuitKind::AccreditationThreshold => 4,
            CircuitKind::ComplianceAggregation => 6,
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.id() == id)
    }
}

impl fmt::Display for CircuitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for CircuitKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(s).ok_or_else(|| format!("unknown circuit kind: {s}"))
    }
}

/// JSON-friendly representation of a field element.
///
/// Fr values travel as hex of arkworks' canonical compressed encoding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrHex {
    pub hex: String,
}

impl FrHex {
    pub fn from_fr(x: &Fr) -> Self {
        Self { hex: hex::encode(fr_to_bytes(x)) }
    }

    pub fn to_fr(&self) -> Result<Fr, String> {
        let bytes = hex::decode(&self.hex).map_err(|e| format!("invalid hex: {e}"))?;
        Fr::deserialize_compressed(&bytes[..]).map_err(|e| format!("invalid field bytes: {e}"))
    }
}

/// Canonical compressed bytes of a field element.
pub fn fr_to_bytes(x: &Fr) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(32);
    // Writing a field element into a Vec cannot fail.
    let _ = x.serialize_compressed(&mut bytes);
    bytes
}

/// Proof bytes as carried over the wire: base64 of the compressed encoding.
pub fn proof_to_b64(proof: &Proof<Bn254>) -> Result<String, crate::errors::ZkError> {
    let bytes = crate::groth16::serialize_proof(proof)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

pub fn b64_to_bytes(b64: &str) -> Result<Vec<u8>, String> {
    base64::engine::general_purpose::STANDARD
        .decode(b64)
        .map_err(|e| format!("invalid base64: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuit_ids_round_trip() {
        for kind in CircuitKind::ALL {
            assert_eq!(kind.id().parse::<CircuitKind>().unwrap(), kind);
        }
        assert!("membership".parse::<CircuitKind>().is_err());
    }

    #[test]
    fn fr_hex_serializes_as_plain_string() {
        let v = FrHex::from_fr(&Fr::from(9u64));
        let json = serde_json::to_string(&v).unwrap();
        assert!(json.starts_with('"'));
        let back: FrHex = serde_json::from_str(&json).unwrap();
        assert_eq!(back.to_fr().unwrap(), Fr::from(9u64));
    }
}
