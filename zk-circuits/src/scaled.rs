//! Fixed-point "scaled domain".
//!
//! A compliance level `L` and a weighted score sum `Σ s_i * w_i` (weights in percent) live
//! on different scales. Instead of dividing the sum by 100 (impossible for a signal inside
//! an arithmetic circuit) the level is lifted into the scaled domain by multiplying with
//! [`FIXED_POINT_SCALE`]. Values only enter the domain through the constructors below, so
//! the factor cannot be dropped silently.

use crate::constants::{FIXED_POINT_SCALE, WEIGHTED_SUM_BITS};
use crate::gadgets::is_geq;
use ark_bn254::Fr;
use ark_r1cs_std::prelude::*;
use ark_r1cs_std::fields::fp::FpVar;
use ark_relations::r1cs::SynthesisError;
use serde::{Deserialize, Serialize};

/// A native value expressed in units of `1 / FIXED_POINT_SCALE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Scaled(u64);

impl Scaled {
    /// Lift a whole level into the scaled domain. Saturates on out-of-range levels.
    pub fn from_level(level: u64) -> Self {
        Self(level.saturating_mul(FIXED_POINT_SCALE))
    }

    /// Weighted sum of percentages, already on the scaled domain by construction.
    /// Saturates instead of overflowing; range checks reject such inputs afterwards.
    pub fn weighted_sum(scores: &[u64], weights: &[u64]) -> Self {
        Self(
            scores
                .iter()
                .zip(weights)
                .fold(0u64, |acc, (s, w)| acc.saturating_add(s.saturating_mul(*w))),
        )
    }

    /// The raw scaled value.
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Whole level, rounded down. Display only.
    pub fn level_floor(self) -> u64 {
        self.0 / FIXED_POINT_SCALE
    }
}

/// In-circuit counterpart of [`Scaled`].
#[derive(Clone, Debug)]
pub struct ScaledVar(FpVar<Fr>);

impl ScaledVar {
    /// Multiply a level signal by the constant scale factor.
    pub fn from_level(level: &FpVar<Fr>) -> Self {
        Self(level * Fr::from(FIXED_POINT_SCALE))
    }

    /// `Σ s_i * w_i`; both sides are percentages so the product is already scaled.
    pub fn weighted_sum(scores: &[FpVar<Fr>], weights: &[FpVar<Fr>]) -> Self {
        let mut acc = FpVar::<Fr>::zero();
        for (s, w) in scores.iter().zip(weights) {
            acc += s * w;
        }
        Self(acc)
    }

    pub fn inner(&self) -> &FpVar<Fr> {
        &self.0
    }

    /// `self >= other`, both operands range-checked to `WEIGHTED_SUM_BITS`.
    pub fn is_geq(&self, other: &ScaledVar) -> Result<Boolean<Fr>, SynthesisError> {
        crate::gadgets::constrain_bits(&self.0, WEIGHTED_SUM_BITS)?;
        crate::gadgets::constrain_bits(&other.0, WEIGHTED_SUM_BITS)?;
        is_geq(&self.0, &other.0, WEIGHTED_SUM_BITS)
    }
}
