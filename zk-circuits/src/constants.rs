//! Crate-wide constants shared by the circuits and host-side orchestration.

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::poseidon::{find_poseidon_ark_and_mds, PoseidonConfig};
use ark_ff::PrimeField;

/// Reference whitelist tree depth (up to 2^20 = 1,048,576 leaves).
///
/// Depth is fixed when keys are generated; a verifying key for depth `d` only accepts
/// proofs built against a depth-`d` path.
pub const MERKLE_DEPTH: usize = 20;

/// Number of jurisdiction slots the eligibility circuit can decide membership over.
pub const JURISDICTION_SLOTS: usize = 16;

/// Upper bound of the 3-digit jurisdiction coding scheme.
pub const MAX_JURISDICTION_CODE: u64 = 999;

/// Bits needed to range-check a jurisdiction code against `MAX_JURISDICTION_CODE`.
pub const JURISDICTION_CODE_BITS: usize = 10;

/// Bit width of the accreditation comparator (amounts up to ~4.29B).
pub const ACCREDITATION_BITS: usize = 32;

/// Scores and weights of the aggregation circuit live in `[0, MAX_PERCENT]`.
pub const MAX_PERCENT: u64 = 100;

/// Bits needed to decompose a value in `[0, MAX_PERCENT]`.
pub const PERCENT_BITS: usize = 7;

/// Number of component scores aggregated into a compliance level.
pub const SCORE_COMPONENTS: usize = 4;

/// Scaling factor of the fixed-point domain. Levels are compared against weighted sums
/// after multiplying by this constant, never by dividing the sum.
pub const FIXED_POINT_SCALE: u64 = 100;

/// Bit width of weighted sums (max 4 * 100 * 100 = 40,000).
pub const WEIGHTED_SUM_BITS: usize = 16;

// Poseidon sponge configuration.
//
// Width-3 sponge (rate=2, capacity=1). The Merkle pair hash absorbs exactly one block.
pub const POSEIDON_RATE: usize = 2;
pub const POSEIDON_CAPACITY: usize = 1;

pub const POSEIDON_FULL_ROUNDS: usize = 8;
pub const POSEIDON_PARTIAL_ROUNDS: usize = 57;

/// Poseidon S-box exponent (alpha).
pub const POSEIDON_ALPHA: u64 = 5;

/// Deterministically derive Poseidon parameters for BN254::Fr.
///
/// Off-core provers and tree builders must use these exact parameters; both the native
/// hasher and the in-circuit gadget are built from this function.
pub fn poseidon_config() -> PoseidonConfig<Fr> {
    let prime_bits = Fr::MODULUS_BIT_SIZE as u64;

    let (ark, mds) = find_poseidon_ark_and_mds::<Fr>(
        prime_bits,
        POSEIDON_RATE,
        POSEIDON_FULL_ROUNDS as u64,
        POSEIDON_PARTIAL_ROUNDS as u64,
        0,
    );

    PoseidonConfig::new(
        POSEIDON_FULL_ROUNDS,
        POSEIDON_PARTIAL_ROUNDS,
        POSEIDON_ALPHA,
        mds,
        ark,
        POSEIDON_RATE,
        POSEIDON_CAPACITY,
    )
}
