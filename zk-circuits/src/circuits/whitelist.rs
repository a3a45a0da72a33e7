//! Whitelist membership.
//!
//! Proves the prover knows an identity secret whose leaf `Hash(identity)` sits in the
//! whitelist tree, and that the public nullifier is `Hash(identity, root)`.
//!
//! Public inputs, in order: `[merkle_root, nullifier]`.
//!
//! The nullifier is scoped to the root on purpose: the same identity proven against a new
//! version of the whitelist yields a fresh nullifier.

use crate::gadgets::{all, poseidon_hash_var};
use crate::hash::{identity_leaf, nullifier};
use crate::merkle::{MerkleInclusionGadget, MerklePath, MerkleTree};
use ark_bn254::Fr;
use ark_r1cs_std::prelude::*;
use ark_r1cs_std::fields::fp::FpVar;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use ark_std::Zero;

#[derive(Clone, Debug)]
pub struct WhitelistPublic {
    pub merkle_root: Fr,
    pub nullifier: Fr,
}

impl WhitelistPublic {
    pub fn to_field_elems(&self) -> Vec<Fr> {
        vec![self.merkle_root, self.nullifier]
    }
}

#[derive(Clone, Debug)]
pub struct WhitelistWitness {
    pub identity: Fr,
    pub path: MerklePath,
}

/// Allocated signals exposed for inspection by callers and tests.
pub struct WhitelistVars {
    pub included: Boolean<Fr>,
    pub nullifier_matches: Boolean<Fr>,
    pub satisfied: Boolean<Fr>,
}

#[derive(Clone, Debug)]
pub struct WhitelistCircuit {
    pub public: WhitelistPublic,
    pub witness: WhitelistWitness,
}

impl WhitelistCircuit {
    /// Build a circuit for the member at `index` of `tree`.
    pub fn for_member(tree: &MerkleTree, index: usize, identity: Fr) -> Result<Self, crate::errors::ZkError> {
        let path = tree.path(index)?;
        let root = tree.root();
        Ok(Self {
            public: WhitelistPublic { merkle_root: root, nullifier: nullifier(identity, root) },
            witness: WhitelistWitness { identity, path },
        })
    }

    /// Shape-only instance used for key generation at a given depth.
    pub fn blank(depth: usize) -> Self {
        Self {
            public: WhitelistPublic { merkle_root: Fr::zero(), nullifier: Fr::zero() },
            witness: WhitelistWitness {
                identity: Fr::zero(),
                path: MerklePath { siblings: vec![Fr::zero(); depth], directions: vec![false; depth] },
            },
        }
    }

    /// Native evaluation of the predicate.
    pub fn evaluate(&self) -> bool {
        let leaf = identity_leaf(self.witness.identity);
        let included = self.witness.path.verify(leaf, self.public.merkle_root);
        let nullifier_matches =
            nullifier(self.witness.identity, self.public.merkle_root) == self.public.nullifier;
        included && nullifier_matches
    }

    pub fn predicate(&self, cs: ConstraintSystemRef<Fr>) -> Result<WhitelistVars, SynthesisError> {
        // IMPORTANT: allocation order MUST match `WhitelistPublic::to_field_elems`.
        let root = FpVar::<Fr>::new_input(cs.clone(), || Ok(self.public.merkle_root))?;
        let public_nullifier = FpVar::<Fr>::new_input(cs.clone(), || Ok(self.public.nullifier))?;

        let identity = FpVar::<Fr>::new_witness(cs.clone(), || Ok(self.witness.identity))?;
        let siblings = self
            .witness
            .path
            .siblings
            .iter()
            .map(|s| FpVar::<Fr>::new_witness(cs.clone(), || Ok(*s)))
            .collect::<Result<Vec<_>, _>>()?;
        let directions = self
            .witness
            .path
            .directions
            .iter()
            .map(|d| Boolean::new_witness(cs.clone(), || Ok(*d)))
            .collect::<Result<Vec<_>, _>>()?;

        let leaf = poseidon_hash_var(cs.clone(), &[identity.clone()])?;
        let included = MerkleInclusionGadget::is_member(cs.clone(), &leaf, &root, &siblings, &directions)?;

        let computed_nullifier = poseidon_hash_var(cs.clone(), &[identity, root])?;
        let nullifier_matches = computed_nullifier.is_eq(&public_nullifier)?;

        let satisfied = all(&[included.clone(), nullifier_matches.clone()])?;
        Ok(WhitelistVars { included, nullifier_matches, satisfied })
    }
}

impl ConstraintSynthesizer<Fr> for WhitelistCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let vars = self.predicate(cs)?;
        vars.satisfied.enforce_equal(&Boolean::constant(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_relations::r1cs::ConstraintSystem;

    fn tree_with(ids: &[u64]) -> MerkleTree {
        let leaves = ids.iter().map(|i| identity_leaf(Fr::from(*i))).collect();
        MerkleTree::new(4, leaves).unwrap()
    }

    #[test]
    fn member_with_matching_nullifier_is_accepted() {
        let tree = tree_with(&[10, 20, 30]);
        let circuit = WhitelistCircuit::for_member(&tree, 1, Fr::from(20u64)).unwrap();
        assert!(circuit.evaluate());

        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn non_member_fails_inclusion() {
        let tree = tree_with(&[10, 20, 30]);
        let mut circuit = WhitelistCircuit::for_member(&tree, 1, Fr::from(20u64)).unwrap();
        circuit.witness.identity = Fr::from(21u64);
        circuit.public.nullifier = nullifier(Fr::from(21u64), tree.root());
        assert!(!circuit.evaluate());

        let cs = ConstraintSystem::<Fr>::new_ref();
        let vars = circuit.predicate(cs.clone()).unwrap();
        assert!(!vars.included.value().unwrap());
        assert!(vars.nullifier_matches.value().unwrap());
    }

    #[test]
    fn nullifier_from_another_root_is_rejected() {
        let tree = tree_with(&[10, 20, 30]);
        let mut circuit = WhitelistCircuit::for_member(&tree, 2, Fr::from(30u64)).unwrap();
        circuit.public.nullifier = nullifier(Fr::from(30u64), Fr::from(12345u64));
        assert!(!circuit.evaluate());

        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }
}
