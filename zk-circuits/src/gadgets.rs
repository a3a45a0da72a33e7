//! R1CS gadgets shared by the predicate circuits.
//!
//! Arithmetic circuits cannot branch, index arrays or divide by a signal. Range checks,
//! comparisons and set membership are therefore expressed through bit decomposition and
//! sums of indicator products.

use crate::hash::poseidon_params;
use ark_bn254::Fr;
use ark_crypto_primitives::sponge::constraints::CryptographicSpongeVar;
use ark_crypto_primitives::sponge::poseidon::constraints::PoseidonSpongeVar;
use ark_r1cs_std::prelude::*;
use ark_r1cs_std::fields::fp::FpVar;
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};
use ark_std::{One, Zero};

/// In-circuit `Hash(x1, .., xn)`, matching [`crate::hash::poseidon_hash`].
pub fn poseidon_hash_var(
    cs: ConstraintSystemRef<Fr>,
    inputs: &[FpVar<Fr>],
) -> Result<FpVar<Fr>, SynthesisError> {
    let mut sponge = PoseidonSpongeVar::<Fr>::new(cs, poseidon_params());
    sponge.absorb(&inputs.to_vec())?;
    let mut out = sponge.squeeze_field_elements(1)?;
    Ok(out.remove(0))
}

/// Convert little-endian boolean bits into an FpVar.
pub fn bits_le_to_fp(bits_le: &[Boolean<Fr>]) -> Result<FpVar<Fr>, SynthesisError> {
    let zero = FpVar::<Fr>::constant(Fr::zero());
    let mut acc = zero.clone();
    let mut coeff = FpVar::<Fr>::constant(Fr::one());

    for b in bits_le {
        // b ? coeff : 0
        let term = b.select(&coeff, &zero)?;
        acc += term;
        coeff += coeff.clone();
    }

    Ok(acc)
}

/// Enforce that `v` fits in `n` bits and return its `n` little-endian bits.
pub fn constrain_bits(v: &FpVar<Fr>, n: usize) -> Result<Vec<Boolean<Fr>>, SynthesisError> {
    let bits = v.to_bits_le()?;
    let low = bits[..n].to_vec();
    let reconstructed = bits_le_to_fp(&low)?;
    reconstructed.enforce_equal(v)?;
    Ok(low)
}

/// Boolean gadget: `a >= b` for two values already known to fit in `n` bits (`n <= 32`).
///
/// Computes `a - b + 2^n`, which fits in `n + 1` bits; its top bit is set exactly when
/// `a >= b`.
pub fn is_geq(a: &FpVar<Fr>, b: &FpVar<Fr>, n: usize) -> Result<Boolean<Fr>, SynthesisError> {
    let offset = FpVar::<Fr>::constant(Fr::from(1u64 << n));
    let diff = a - b + offset;
    let bits = constrain_bits(&diff, n + 1)?;
    Ok(bits[n].clone())
}

/// Boolean gadget: `a <= c` for an `n`-bit value and a constant.
pub fn is_leq_const(a: &FpVar<Fr>, c: u64, n: usize) -> Result<Boolean<Fr>, SynthesisError> {
    let c = FpVar::<Fr>::constant(Fr::from(c));
    is_geq(&c, a, n)
}

/// Range-check `v` into `[0, max]` where `max < 2^n`. Returns whether the bound holds;
/// the bit width itself is enforced.
pub fn in_range(v: &FpVar<Fr>, max: u64, n: usize) -> Result<Boolean<Fr>, SynthesisError> {
    constrain_bits(v, n)?;
    is_leq_const(v, max, n)
}

/// Membership of `value` in the set encoded by `mask_bits` over the universe `0..len`.
///
/// Returns `Σ (value == i) * bit_i`. At most one term can be 1, so the sum is 1 exactly
/// when `value` indexes a set bit. Wider universes chunk into several calls.
pub fn indicator_sum(
    value: &FpVar<Fr>,
    mask_bits: &[Boolean<Fr>],
) -> Result<FpVar<Fr>, SynthesisError> {
    let zero = FpVar::<Fr>::constant(Fr::zero());
    let one = FpVar::<Fr>::constant(Fr::one());
    let mut sum = zero.clone();

    for (i, bit) in mask_bits.iter().enumerate() {
        let is_index = value.is_eq(&FpVar::constant(Fr::from(i as u64)))?;
        let hit = Boolean::kary_and(&[is_index, bit.clone()])?;
        sum += hit.select(&one, &zero)?;
    }

    Ok(sum)
}

/// AND of all `checks`.
pub fn all(checks: &[Boolean<Fr>]) -> Result<Boolean<Fr>, SynthesisError> {
    Boolean::kary_and(checks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_relations::r1cs::ConstraintSystem;

    fn witness(cs: &ConstraintSystemRef<Fr>, v: u64) -> FpVar<Fr> {
        FpVar::new_witness(cs.clone(), || Ok(Fr::from(v))).unwrap()
    }

    #[test]
    fn geq_matches_native_comparison() {
        for (a, b, expected) in [(5u64, 3u64, true), (3, 3, true), (2, 3, false), (0, 65535, false)] {
            let cs = ConstraintSystem::<Fr>::new_ref();
            let r = is_geq(&witness(&cs, a), &witness(&cs, b), 16).unwrap();
            assert_eq!(r.value().unwrap(), expected, "{a} >= {b}");
            assert!(cs.is_satisfied().unwrap());
        }
    }

    #[test]
    fn constrain_bits_rejects_oversized_values() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        constrain_bits(&witness(&cs, 256), 8).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn in_range_reports_upper_bound() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        assert!(in_range(&witness(&cs, 100), 100, 7).unwrap().value().unwrap());
        assert!(!in_range(&witness(&cs, 101), 100, 7).unwrap().value().unwrap());
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn poseidon_gadget_matches_native() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let inputs = [witness(&cs, 1), witness(&cs, 2), witness(&cs, 3)];
        let h = poseidon_hash_var(cs.clone(), &inputs).unwrap();
        let native = crate::hash::poseidon_hash(&[Fr::from(1u64), Fr::from(2u64), Fr::from(3u64)]);
        assert_eq!(h.value().unwrap(), native);
    }
}
