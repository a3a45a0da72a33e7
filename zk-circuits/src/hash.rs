//! Native Poseidon hashing.
//!
//! Every function here has an in-circuit twin in [`crate::gadgets`]; the two must agree
//! bit-for-bit or proofs built by external provers will never verify.

use crate::constants::poseidon_config;
use ark_bn254::Fr;
use ark_crypto_primitives::sponge::poseidon::{PoseidonConfig, PoseidonSponge};
use ark_crypto_primitives::sponge::CryptographicSponge;
use std::sync::OnceLock;

static POSEIDON: OnceLock<PoseidonConfig<Fr>> = OnceLock::new();

/// Shared Poseidon parameters, derived once per process.
pub fn poseidon_params() -> &'static PoseidonConfig<Fr> {
    POSEIDON.get_or_init(poseidon_config)
}

/// `Hash(x1, .., xn)`: absorb all inputs in order and squeeze one element.
pub fn poseidon_hash(inputs: &[Fr]) -> Fr {
    let mut sponge = PoseidonSponge::<Fr>::new(poseidon_params());
    sponge.absorb(&inputs.to_vec());
    sponge.squeeze_field_elements::<Fr>(1)[0]
}

/// Ordered-pair hash used at every Merkle level.
pub fn hash_pair(left: Fr, right: Fr) -> Fr {
    poseidon_hash(&[left, right])
}

/// Whitelist leaf for an identity secret.
pub fn identity_leaf(identity: Fr) -> Fr {
    poseidon_hash(&[identity])
}

/// Nullifier binding an identity to one whitelist root.
pub fn nullifier(identity: Fr, root: Fr) -> Fr {
    poseidon_hash(&[identity, root])
}

/// Commitment to a single private value.
pub fn commit(value: Fr, salt: Fr) -> Fr {
    poseidon_hash(&[value, salt])
}

/// Issuer attestation over an accreditation value: `(tag, key_binding)`.
pub fn attestation(value: Fr, salt: Fr, issuer_key: [Fr; 2]) -> [Fr; 2] {
    [
        poseidon_hash(&[value, salt, issuer_key[0], issuer_key[1]]),
        poseidon_hash(&[issuer_key[0], issuer_key[1]]),
    ]
}
