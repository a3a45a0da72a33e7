//! Accreditation threshold.
//!
//! Proves a committed accreditation value meets a public minimum and was attested by the
//! issuer whose key is public. The attestation is hash-based: `Hash(value, salt, pk0, pk1)`
//! stands in for a signature, and `Hash(pk0, pk1)` binds the tag to that key so a valid
//! attestation cannot be replayed under another issuer key. No upper bound is placed on the
//! value.
//!
//! Public inputs, in order: `[minimum, commitment, issuer_key0, issuer_key1]`.

use crate::constants::ACCREDITATION_BITS;
use crate::gadgets::{all, constrain_bits, is_geq, poseidon_hash_var};
use crate::hash::{attestation, commit, poseidon_hash};
use ark_bn254::Fr;
use ark_r1cs_std::prelude::*;
use ark_r1cs_std::fields::fp::FpVar;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use ark_std::Zero;

#[derive(Clone, Debug)]
pub struct AccreditationPublic {
    pub minimum: u64,
    pub commitment: Fr,
    pub issuer_key: [Fr; 2],
}

impl AccreditationPublic {
    pub fn to_field_elems(&self) -> Vec<Fr> {
        vec![
            Fr::from(self.minimum),
            self.commitment,
            self.issuer_key[0],
            self.issuer_key[1],
        ]
    }
}

#[derive(Clone, Debug)]
pub struct AccreditationWitness {
    pub value: u64,
    pub salt: Fr,
    pub attestation: [Fr; 2],
}

pub struct AccreditationVars {
    pub commitment_matches: Boolean<Fr>,
    pub meets_minimum: Boolean<Fr>,
    pub attestation_valid: Boolean<Fr>,
    pub key_bound: Boolean<Fr>,
    pub satisfied: Boolean<Fr>,
}

#[derive(Clone, Debug)]
pub struct AccreditationCircuit {
    pub public: AccreditationPublic,
    pub witness: AccreditationWitness,
}

impl AccreditationCircuit {
    /// Circuit for an honestly attested `value` against `minimum`.
    pub fn new(value: u64, salt: Fr, minimum: u64, issuer_key: [Fr; 2]) -> Self {
        let v = Fr::from(value);
        Self {
            public: AccreditationPublic { minimum, commitment: commit(v, salt), issuer_key },
            witness: AccreditationWitness { value, salt, attestation: attestation(v, salt, issuer_key) },
        }
    }

    pub fn blank() -> Self {
        Self::new(0, Fr::zero(), 0, [Fr::zero(), Fr::zero()])
    }

    pub fn evaluate(&self) -> bool {
        let v = Fr::from(self.witness.value);
        let key = self.public.issuer_key;
        let fits = self.witness.value < (1u64 << ACCREDITATION_BITS)
            && self.public.minimum < (1u64 << ACCREDITATION_BITS);

        fits && commit(v, self.witness.salt) == self.public.commitment
            && self.witness.value >= self.public.minimum
            && poseidon_hash(&[v, self.witness.salt, key[0], key[1]]) == self.witness.attestation[0]
            && poseidon_hash(&key) == self.witness.attestation[1]
    }

    pub fn predicate(&self, cs: ConstraintSystemRef<Fr>) -> Result<AccreditationVars, SynthesisError> {
        let minimum = FpVar::<Fr>::new_input(cs.clone(), || Ok(Fr::from(self.public.minimum)))?;
        let public_commitment = FpVar::<Fr>::new_input(cs.clone(), || Ok(self.public.commitment))?;
        let key0 = FpVar::<Fr>::new_input(cs.clone(), || Ok(self.public.issuer_key[0]))?;
        let key1 = FpVar::<Fr>::new_input(cs.clone(), || Ok(self.public.issuer_key[1]))?;

        let value = FpVar::<Fr>::new_witness(cs.clone(), || Ok(Fr::from(self.witness.value)))?;
        let salt = FpVar::<Fr>::new_witness(cs.clone(), || Ok(self.witness.salt))?;
        let tag = FpVar::<Fr>::new_witness(cs.clone(), || Ok(self.witness.attestation[0]))?;
        let binding = FpVar::<Fr>::new_witness(cs.clone(), || Ok(self.witness.attestation[1]))?;

        // (a) commitment
        let commitment = poseidon_hash_var(cs.clone(), &[value.clone(), salt.clone()])?;
        let commitment_matches = commitment.is_eq(&public_commitment)?;

        // (b) value >= minimum on 32-bit operands
        constrain_bits(&value, ACCREDITATION_BITS)?;
        constrain_bits(&minimum, ACCREDITATION_BITS)?;
        let meets_minimum = is_geq(&value, &minimum, ACCREDITATION_BITS)?;

        // (c) issuer tag over the committed opening
        let expected_tag =
            poseidon_hash_var(cs.clone(), &[value, salt, key0.clone(), key1.clone()])?;
        let attestation_valid = expected_tag.is_eq(&tag)?;

        // (d) tag bound to this issuer key
        let expected_binding = poseidon_hash_var(cs.clone(), &[key0, key1])?;
        let key_bound = expected_binding.is_eq(&binding)?;

        let satisfied = all(&[
            commitment_matches.clone(),
            meets_minimum.clone(),
            attestation_valid.clone(),
            key_bound.clone(),
        ])?;

        Ok(AccreditationVars { commitment_matches, meets_minimum, attestation_valid, key_bound, satisfied })
    }
}

impl ConstraintSynthesizer<Fr> for AccreditationCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let vars = self.predicate(cs)?;
        vars.satisfied.enforce_equal(&Boolean::constant(true))
    }
}
