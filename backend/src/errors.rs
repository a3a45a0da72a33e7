use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use thiserror::Error;
use zk_circuits::CircuitKind;

/// Terminal decisions of the engine. None of these are retried internally; only
/// `ExpiredProof` is resolved by the caller submitting a fresh proof.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("unknown circuit: {0}")]
    UnknownCircuit(String),

    #[error("circuit already registered: {0}")]
    CircuitAlreadyRegistered(String),

    #[error("arity mismatch: expected {expected} public inputs, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    #[error("malformed proof: {0}")]
    MalformedProof(String),

    #[error("nullifier already used")]
    NullifierAlreadyUsed,

    #[error("proof for {0} has expired")]
    ExpiredProof(CircuitKind),

    #[error("no proof submitted for {0}")]
    NoProofSubmitted(CircuitKind),

    #[error("submitted proof for {0} did not verify")]
    InvalidProof(CircuitKind),

    #[error("{0} proofs are disabled for this user")]
    FeatureDisabled(CircuitKind),

    #[error("validity period {got}s outside [{min}, {max}]")]
    SettingsOutOfRange { got: u64, min: u64, max: u64 },

    #[error("cache ttl {got}s outside [{min}, {max}]")]
    CacheTtlOutOfRange { got: u64, min: u64, max: u64 },

    #[error("batch size {got} outside [1, {max}]")]
    BatchSizeOutOfRange { got: usize, max: usize },

    #[error("jurisdiction code already registered: {0}")]
    JurisdictionExists(String),

    #[error("jurisdiction not found: {0}")]
    JurisdictionNotFound(String),

    #[error("jurisdiction {code} already {}", status_word(.active))]
    JurisdictionStatusUnchanged { code: String, active: bool },

    #[error("no jurisdiction mask bits left")]
    JurisdictionCapacityExhausted,

    #[error("invalid jurisdiction: {0}")]
    InvalidJurisdiction(String),
}

fn status_word(active: &bool) -> &'static str {
    if *active { "active" } else { "inactive" }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("gone: {0}")]
    Gone(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("internal error")]
    Internal,
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        let msg = e.to_string();
        match e {
            EngineError::UnknownCircuit(_)
            | EngineError::NoProofSubmitted(_)
            | EngineError::JurisdictionNotFound(_) => ApiError::NotFound(msg),
            EngineError::CircuitAlreadyRegistered(_)
            | EngineError::NullifierAlreadyUsed
            | EngineError::JurisdictionExists(_)
            | EngineError::JurisdictionStatusUnchanged { .. }
            | EngineError::JurisdictionCapacityExhausted => ApiError::Conflict(msg),
            EngineError::ExpiredProof(_) => ApiError::Gone(msg),
            EngineError::FeatureDisabled(_) | EngineError::InvalidProof(_) => ApiError::Forbidden(msg),
            EngineError::ArityMismatch { .. }
            | EngineError::MalformedProof(_)
            | EngineError::SettingsOutOfRange { .. }
            | EngineError::CacheTtlOutOfRange { .. }
            | EngineError::BatchSizeOutOfRange { .. }
            | EngineError::InvalidJurisdiction(_) => ApiError::BadRequest(msg),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            ApiError::Gone(m) => (StatusCode::GONE, m.clone()),
            ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string()),
        };

        (status, Json(ErrorBody { error: msg })).into_response()
    }
}
