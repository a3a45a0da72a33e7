//! Compliance aggregation.
//!
//! Proves four committed component scores, weighted by public percentages, reach a public
//! minimum compliance level. The comparison runs in the scaled domain: the minimum level is
//! multiplied by 100 rather than dividing the weighted sum, because an arithmetic circuit
//! can only divide by constants. Weights are not required to sum to 100.
//!
//! Public inputs, in order:
//! `[minimum_level, commitment, weight_a, weight_b, weight_c, weight_d]`.
//!
//! The weighted sum is the transparency value: callers can show the achieved level without
//! learning the components.

use crate::constants::{MAX_PERCENT, PERCENT_BITS, SCORE_COMPONENTS};
use crate::gadgets::{all, in_range, poseidon_hash_var};
use crate::hash::poseidon_hash;
use crate::scaled::{Scaled, ScaledVar};
use ark_bn254::Fr;
use ark_r1cs_std::prelude::*;
use ark_r1cs_std::fields::fp::FpVar;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use ark_std::Zero;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug)]
pub struct AggregationPublic {
    pub minimum_level: u64,
    pub commitment: Fr,
    pub weights: [u64; SCORE_COMPONENTS],
}

impl AggregationPublic {
    pub fn to_field_elems(&self) -> Vec<Fr> {
        let mut v = Vec::with_capacity(2 + SCORE_COMPONENTS);
        v.push(Fr::from(self.minimum_level));
        v.push(self.commitment);
        v.extend(self.weights.iter().map(|w| Fr::from(*w)));
        v
    }
}

#[derive(Clone, Debug)]
pub struct AggregationWitness {
    pub scores: [u64; SCORE_COMPONENTS],
    pub salt: Fr,
}

/// Native result: pass/fail plus the transparency value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationOutcome {
    pub passed: bool,
    pub weighted_sum: Scaled,
}

pub struct AggregationVars {
    pub commitment_matches: Boolean<Fr>,
    pub ranges_valid: Boolean<Fr>,
    pub weighted_sum: ScaledVar,
    pub meets_minimum: Boolean<Fr>,
    pub satisfied: Boolean<Fr>,
}

/// `Hash(s1, s2, s3, s4, salt)`.
pub fn score_commitment(scores: &[u64; SCORE_COMPONENTS], salt: Fr) -> Fr {
    let mut inputs: Vec<Fr> = scores.iter().map(|s| Fr::from(*s)).collect();
    inputs.push(salt);
    poseidon_hash(&inputs)
}

#[derive(Clone, Debug)]
pub struct AggregationCircuit {
    pub public: AggregationPublic,
    pub witness: AggregationWitness,
}

impl AggregationCircuit {
    pub fn new(
        scores: [u64; SCORE_COMPONENTS],
        salt: Fr,
        minimum_level: u64,
        weights: [u64; SCORE_COMPONENTS],
    ) -> Self {
        Self {
            public: AggregationPublic { minimum_level, commitment: score_commitment(&scores, salt), weights },
            witness: AggregationWitness { scores, salt },
        }
    }

    pub fn blank() -> Self {
        Self::new([0; SCORE_COMPONENTS], Fr::zero(), 0, [0; SCORE_COMPONENTS])
    }

    pub fn evaluate(&self) -> AggregationOutcome {
        let weighted_sum = Scaled::weighted_sum(&self.witness.scores, &self.public.weights);
        let ranges_valid = self
            .witness
            .scores
            .iter()
            .chain(&self.public.weights)
            .chain(std::iter::once(&self.public.minimum_level))
            .all(|v| *v <= MAX_PERCENT);
        let commitment_matches =
            score_commitment(&self.witness.scores, self.witness.salt) == self.public.commitment;

        AggregationOutcome {
            passed: ranges_valid
                && commitment_matches
                && weighted_sum >= Scaled::from_level(self.public.minimum_level),
            weighted_sum,
        }
    }

    pub fn predicate(&self, cs: ConstraintSystemRef<Fr>) -> Result<AggregationVars, SynthesisError> {
        let minimum_level = FpVar::<Fr>::new_input(cs.clone(), || Ok(Fr::from(self.public.minimum_level)))?;
        let public_commitment = FpVar::<Fr>::new_input(cs.clone(), || Ok(self.public.commitment))?;
        let weights = self
            .public
            .weights
            .iter()
            .map(|w| FpVar::<Fr>::new_input(cs.clone(), || Ok(Fr::from(*w))))
            .collect::<Result<Vec<_>, _>>()?;

        let scores = self
            .witness
            .scores
            .iter()
            .map(|s| FpVar::<Fr>::new_witness(cs.clone(), || Ok(Fr::from(*s))))
            .collect::<Result<Vec<_>, _>>()?;
        let salt = FpVar::<Fr>::new_witness(cs.clone(), || Ok(self.witness.salt))?;

        let mut preimage = scores.clone();
        preimage.push(salt);
        let commitment = poseidon_hash_var(cs.clone(), &preimage)?;
        let commitment_matches = commitment.is_eq(&public_commitment)?;

        // Every score, weight and the minimum level lies in [0, 100].
        let mut range_checks = Vec::with_capacity(2 * SCORE_COMPONENTS + 1);
        for v in scores.iter().chain(&weights).chain(std::iter::once(&minimum_level)) {
            range_checks.push(in_range(v, MAX_PERCENT, PERCENT_BITS)?);
        }
        let ranges_valid = all(&range_checks)?;

        let weighted_sum = ScaledVar::weighted_sum(&scores, &weights);
        let minimum_sum = ScaledVar::from_level(&minimum_level);
        let meets_minimum = weighted_sum.is_geq(&minimum_sum)?;

        let satisfied = all(&[commitment_matches.clone(), ranges_valid.clone(), meets_minimum.clone()])?;
        Ok(AggregationVars { commitment_matches, ranges_valid, weighted_sum, meets_minimum, satisfied })
    }
}

impl ConstraintSynthesizer<Fr> for AggregationCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let vars = self.predicate(cs)?;
        vars.satisfied.enforce_equal(&Boolean::constant(true))
    }
}
