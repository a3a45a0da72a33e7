//! ZK layer for the compliance proof engine.
//!
//! This crate contains:
//! - Poseidon hashing and a fixed-depth Merkle tree shared with off-core provers.
//! - R1CS circuits for whitelist membership, jurisdiction eligibility, accreditation
//!   threshold and compliance aggregation, with native evaluators.
//! - Groth16 key generation, proving and verification over BN254.
//! - Serialization helpers for transporting proofs, keys and field elements.

pub mod circuits;
pub mod constants;
pub mod errors;
pub mod gadgets;
pub mod groth16;
pub mod hash;
pub mod merkle;
pub mod scaled;
pub mod types;

pub use errors::ZkError;
pub use types::{CircuitKind, FrHex};
