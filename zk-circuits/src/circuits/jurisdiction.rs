//! Jurisdiction eligibility.
//!
//! Proves a committed jurisdiction code indexes a set bit of the public allowed-jurisdictions
//! mask, without revealing the code.
//!
//! Public inputs, in order: `[allowed_mask, commitment]`.

use crate::constants::{JURISDICTION_CODE_BITS, JURISDICTION_SLOTS, MAX_JURISDICTION_CODE};
use crate::gadgets::{all, constrain_bits, in_range, indicator_sum, poseidon_hash_var};
use crate::hash::commit;
use ark_bn254::Fr;
use ark_r1cs_std::prelude::*;
use ark_r1cs_std::fields::fp::FpVar;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use ark_std::{One, Zero};

#[derive(Clone, Debug)]
pub struct JurisdictionPublic {
    /// Bit `i` set means jurisdiction index `i` is allowed. Only the low 16 bits count.
    pub allowed_mask: u64,
    pub commitment: Fr,
}

impl JurisdictionPublic {
    pub fn to_field_elems(&self) -> Vec<Fr> {
        vec![Fr::from(self.allowed_mask), self.commitment]
    }
}

#[derive(Clone, Debug)]
pub struct JurisdictionWitness {
    pub code: u64,
    pub salt: Fr,
}

pub struct JurisdictionVars {
    pub commitment_matches: Boolean<Fr>,
    /// `Σ (code == i) * mask_i`; 1 exactly when the code is allowed.
    pub membership_sum: FpVar<Fr>,
    pub code_in_range: Boolean<Fr>,
    pub satisfied: Boolean<Fr>,
}

#[derive(Clone, Debug)]
pub struct JurisdictionCircuit {
    pub public: JurisdictionPublic,
    pub witness: JurisdictionWitness,
}

impl JurisdictionCircuit {
    /// Circuit for `code` under `allowed_mask`, committing with `salt`.
    pub fn new(code: u64, salt: Fr, allowed_mask: u64) -> Self {
        Self {
            public: JurisdictionPublic { allowed_mask, commitment: commit(Fr::from(code), salt) },
            witness: JurisdictionWitness { code, salt },
        }
    }

    pub fn blank() -> Self {
        Self::new(0, Fr::zero(), 1)
    }

    /// Native membership sum, mirroring the circuit's indicator products.
    pub fn membership_sum(&self) -> u64 {
        (0..JURISDICTION_SLOTS as u64)
            .filter(|i| *i == self.witness.code && (self.public.allowed_mask >> i) & 1 == 1)
            .count() as u64
    }

    pub fn evaluate(&self) -> bool {
        let commitment_matches =
            commit(Fr::from(self.witness.code), self.witness.salt) == self.public.commitment;
        let mask_fits = self.public.allowed_mask < (1u64 << JURISDICTION_SLOTS);
        commitment_matches
            && mask_fits
            && self.membership_sum() == 1
            && self.witness.code <= MAX_JURISDICTION_CODE
    }

    pub fn predicate(&self, cs: ConstraintSystemRef<Fr>) -> Result<JurisdictionVars, SynthesisError> {
        let mask = FpVar::<Fr>::new_input(cs.clone(), || Ok(Fr::from(self.public.allowed_mask)))?;
        let public_commitment = FpVar::<Fr>::new_input(cs.clone(), || Ok(self.public.commitment))?;

        let code = FpVar::<Fr>::new_witness(cs.clone(), || Ok(Fr::from(self.witness.code)))?;
        let salt = FpVar::<Fr>::new_witness(cs.clone(), || Ok(self.witness.salt))?;

        let commitment = poseidon_hash_var(cs.clone(), &[code.clone(), salt])?;
        let commitment_matches = commitment.is_eq(&public_commitment)?;

        let mask_bits = constrain_bits(&mask, JURISDICTION_SLOTS)?;
        let membership_sum = indicator_sum(&code, &mask_bits)?;
        let is_member = membership_sum.is_eq(&FpVar::constant(Fr::one()))?;

        let code_in_range = in_range(&code, MAX_JURISDICTION_CODE, JURISDICTION_CODE_BITS)?;

        let satisfied = all(&[commitment_matches.clone(), is_member, code_in_range.clone()])?;
        Ok(JurisdictionVars { commitment_matches, membership_sum, code_in_range, satisfied })
    }
}

impl ConstraintSynthesizer<Fr> for JurisdictionCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let vars = self.predicate(cs)?;
        vars.satisfied.enforce_equal(&Boolean::constant(true))
    }
}
