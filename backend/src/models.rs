use crate::engine::VerificationStats;
use crate::errors::ApiError;
use crate::jurisdiction::ActiveJurisdiction;
use crate::service::ProofStatus;
use ark_bn254::Fr;
use serde::{Deserialize, Serialize};
use zk_circuits::types::b64_to_bytes;
use zk_circuits::{CircuitKind, FrHex};

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub circuit_id: String,

    /// Base64 of the compressed Groth16 proof.
    pub proof_b64: String,

    /// Public inputs in the circuit's documented order.
    pub public_inputs: Vec<FrHex>,

    /// Attributes the pairing check in the per-caller statistics.
    #[serde(default)]
    pub caller: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub circuit_id: String,
    pub verified: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchVerifyItem {
    pub circuit_id: String,
    pub proof_b64: String,
    pub public_inputs: Vec<FrHex>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchVerifyRequest {
    pub items: Vec<BatchVerifyItem>,
    #[serde(default)]
    pub caller: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchVerifyResponse {
    pub results: Vec<bool>,
    pub success_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CircuitInfoResponse {
    pub circuit_id: String,
    pub arity: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VkResponse {
    pub circuit_id: String,
    pub curve: String,
    pub proof_system: String,
    pub vk_b64: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub circuit_id: String,
    #[serde(flatten)]
    pub stats: VerificationStats,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitProofRequest {
    pub kind: CircuitKind,
    pub proof_b64: String,
    pub public_inputs: Vec<FrHex>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProofStatusResponse {
    pub user: String,
    pub kind: CircuitKind,
    pub has_valid_proof: bool,
    #[serde(flatten)]
    pub status: ProofStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ComplianceResponse {
    pub user: String,
    pub fully_compliant: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddJurisdictionRequest {
    pub name: String,
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JurisdictionListResponse {
    /// Value for the eligibility circuit's `allowed_mask` public input.
    pub allowed_mask: u64,
    pub jurisdictions: Vec<ActiveJurisdiction>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheTtlRequest {
    pub ttl_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheResponse {
    pub removed: usize,
    pub entries: usize,
    pub ttl_secs: u64,
}

pub fn decode_proof(b64: &str) -> Result<Vec<u8>, ApiError> {
    b64_to_bytes(b64).map_err(|e| ApiError::BadRequest(format!("proof_b64: {e}")))
}

pub fn decode_inputs(inputs: &[FrHex]) -> Result<Vec<Fr>, ApiError> {
    inputs
        .iter()
        .enumerate()
        .map(|(i, x)| x.to_fr().map_err(|e| ApiError::BadRequest(format!("public_inputs[{i}]: {e}"))))
        .collect()
}
