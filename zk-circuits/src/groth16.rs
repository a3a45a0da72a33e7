//! Groth16 setup/prove/verify orchestration for the compliance circuits.
//!
//! SECURITY NOTE: Groth16 requires a trusted setup producing a proving key (PK) and a
//! verifying key (VK) per circuit. `setup_keys` runs a local, single-party setup suitable
//! for development only; production keys come from a ceremony and are loaded from disk.

use crate::circuits::{AccreditationCircuit, AggregationCircuit, JurisdictionCircuit, WhitelistCircuit};
use crate::errors::ZkError;
use crate::types::CircuitKind;
use ark_bn254::{Bn254, Fr};
use ark_groth16::{prepare_verifying_key, Groth16, PreparedVerifyingKey, Proof, ProvingKey, VerifyingKey};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rand::RngCore;

/// Generate a Groth16 keypair for `circuit`'s shape.
pub fn setup_keys<C: ConstraintSynthesizer<Fr>>(
    circuit: C,
    rng: &mut impl RngCore,
) -> Result<(ProvingKey<Bn254>, VerifyingKey<Bn254>), ZkError> {
    let pk = Groth16::<Bn254>::generate_random_parameters_with_reduction(circuit, rng)
        .map_err(|e| ZkError::Ark(format!("{e}")))?;

    let vk = pk.vk.clone();
    Ok((pk, vk))
}

/// Keypair for one of the built-in circuits. `merkle_depth` only affects the whitelist.
pub fn setup_kind(
    kind: CircuitKind,
    merkle_depth: usize,
    rng: &mut impl RngCore,
) -> Result<(ProvingKey<Bn254>, VerifyingKey<Bn254>), ZkError> {
    match kind {
        CircuitKind::WhitelistMembership => setup_keys(WhitelistCircuit::blank(merkle_depth), rng),
        CircuitKind::JurisdictionEligibility => setup_keys(JurisdictionCircuit::blank(), rng),
        CircuitKind::AccreditationThreshold => setup_keys(AccreditationCircuit::blank(), rng),
        CircuitKind::ComplianceAggregation => setup_keys(AggregationCircuit::blank(), rng),
    }
}

/// Fail with `Unsatisfied` unless the witness satisfies every constraint.
pub fn ensure_satisfied<C: ConstraintSynthesizer<Fr>>(circuit: C) -> Result<(), ZkError> {
    let cs = ConstraintSystem::<Fr>::new_ref();
    circuit
        .generate_constraints(cs.clone())
        .map_err(|e| ZkError::Ark(format!("{e}")))?;
    let ok = cs.is_satisfied().map_err(|e| ZkError::Ark(format!("{e}")))?;
    if !ok {
        return Err(ZkError::Unsatisfied);
    }
    Ok(())
}

/// Prove `circuit`. The witness is checked first so an unsatisfiable statement never
/// yields a (useless) proof.
pub fn prove<C: ConstraintSynthesizer<Fr> + Clone>(
    circuit: C,
    pk: &ProvingKey<Bn254>,
    rng: &mut impl RngCore,
) -> Result<Proof<Bn254>, ZkError> {
    ensure_satisfied(circuit.clone())?;
    Groth16::<Bn254>::create_random_proof_with_reduction(circuit, pk, rng)
        .map_err(|e| ZkError::Ark(format!("{e}")))
}

/// Run the pairing check for `proof` against a prepared key.
pub fn verify_prepared(
    pvk: &PreparedVerifyingKey<Bn254>,
    proof: &Proof<Bn254>,
    public_inputs: &[Fr],
) -> Result<bool, ZkError> {
    Groth16::<Bn254>::verify_proof(pvk, proof, public_inputs).map_err(|e| ZkError::Ark(format!("{e}")))
}

/// Verify a proof, failing with `VerificationFailed` on a rejected pairing check.
pub fn verify(vk: &VerifyingKey<Bn254>, proof: &Proof<Bn254>, public_inputs: &[Fr]) -> Result<(), ZkError> {
    let pvk = prepare_verifying_key(vk);
    if !verify_prepared(&pvk, proof, public_inputs)? {
        return Err(ZkError::VerificationFailed);
    }
    Ok(())
}

/// Number of public inputs a verifying key accepts.
pub fn vk_arity(vk: &VerifyingKey<Bn254>) -> usize {
    vk.gamma_abc_g1.len().saturating_sub(1)
}

/// Serialize a proving key to bytes.
pub fn serialize_pk(pk: &ProvingKey<Bn254>) -> Result<Vec<u8>, ZkError> {
    let mut out = Vec::new();
    pk.serialize_compressed(&mut out)
        .map_err(|e| ZkError::Serialization(format!("{e}")))?;
    Ok(out)
}

pub fn deserialize_pk(bytes: &[u8]) -> Result<ProvingKey<Bn254>, ZkError> {
    ProvingKey::<Bn254>::deserialize_compressed(bytes)
        .map_err(|e| ZkError::Serialization(format!("{e}")))
}

pub fn serialize_vk(vk: &VerifyingKey<Bn254>) -> Result<Vec<u8>, ZkError> {
    let mut out = Vec::new();
    vk.serialize_compressed(&mut out)
        .map_err(|e| ZkError::Serialization(format!("{e}")))?;
    Ok(out)
}

pub fn deserialize_vk(bytes: &[u8]) -> Result<VerifyingKey<Bn254>, ZkError> {
    VerifyingKey::<Bn254>::deserialize_compressed(bytes)
        .map_err(|e| ZkError::Serialization(format!("{e}")))
}

pub fn serialize_proof(proof: &Proof<Bn254>) -> Result<Vec<u8>, ZkError> {
    let mut out = Vec::new();
    proof
        .serialize_compressed(&mut out)
        .map_err(|e| ZkError::Serialization(format!("{e}")))?;
    Ok(out)
}

/// Decode a proof, validating that every point is on the curve and in the right subgroup.
/// Trailing bytes are rejected.
pub fn deserialize_proof(bytes: &[u8]) -> Result<Proof<Bn254>, ZkError> {
    let proof = Proof::<Bn254>::deserialize_compressed(bytes)
        .map_err(|e| ZkError::Serialization(format!("{e}")))?;
    if proof.compressed_size() != bytes.len() {
        return Err(ZkError::Serialization(format!(
            "expected {} proof bytes, got {}",
            proof.compressed_size(),
            bytes.len()
        )));
    }
    Ok(proof)
}
