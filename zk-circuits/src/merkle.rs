//! Fixed-depth Poseidon Merkle tree and the inclusion sub-circuit.
//!
//! The ordered-pair hash is part of the contract with off-core tree builders: direction bit
//! 0 means the running hash is the left operand, 1 means it is the right operand.

use crate::errors::ZkError;
use crate::gadgets::poseidon_hash_var;
use crate::hash::hash_pair;
use ark_bn254::Fr;
use ark_r1cs_std::prelude::*;
use ark_r1cs_std::fields::fp::FpVar;
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};
use ark_std::Zero;
use std::fmt;

/// Sibling hashes and direction bits from a leaf up to (excluding) the root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerklePath {
    pub siblings: Vec<Fr>,
    /// `true` when the node on the path is the right child at that level.
    pub directions: Vec<bool>,
}

impl MerklePath {
    pub fn depth(&self) -> usize {
        self.siblings.len()
    }

    /// Recompute the root for `leaf` along this path.
    pub fn compute_root(&self, leaf: Fr) -> Fr {
        self.siblings
            .iter()
            .zip(&self.directions)
            .fold(leaf, |current, (sibling, is_right)| {
                if *is_right {
                    hash_pair(*sibling, current)
                } else {
                    hash_pair(current, *sibling)
                }
            })
    }

    /// Native inclusion check, mirroring [`MerkleInclusionGadget`].
    pub fn verify(&self, leaf: Fr, root: Fr) -> bool {
        self.siblings.len() == self.directions.len() && self.compute_root(leaf) == root
    }
}

impl fmt::Display for MerklePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bits: String = self
            .directions
            .iter()
            .map(|d| if *d { '1' } else { '0' })
            .collect();
        write!(f, "MerklePath(depth={}, directions={bits})", self.depth())
    }
}

/// A binary Merkle tree of fixed depth, padded with zero leaves.
///
/// Only populated nodes are stored; empty subtrees are represented by precomputed zero
/// hashes per level.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    depth: usize,
    /// `levels[0]` are the leaves, `levels[depth]` holds the root.
    levels: Vec<Vec<Fr>>,
    zeros: Vec<Fr>,
}

impl MerkleTree {
    pub fn new(depth: usize, leaves: Vec<Fr>) -> Result<Self, ZkError> {
        if depth == 0 || depth >= usize::BITS as usize {
            return Err(ZkError::InvalidDepth(depth));
        }
        let capacity = 1usize << depth;
        if leaves.len() > capacity {
            return Err(ZkError::TreeFull { capacity, got: leaves.len() });
        }

        let mut zeros = Vec::with_capacity(depth + 1);
        zeros.push(Fr::zero());
        for k in 0..depth {
            zeros.push(hash_pair(zeros[k], zeros[k]));
        }

        let mut levels = Vec::with_capacity(depth + 1);
        levels.push(leaves);
        for k in 0..depth {
            let below = &levels[k];
            let mut next = Vec::with_capacity(below.len().div_ceil(2));
            for pair in below.chunks(2) {
                let right = pair.get(1).copied().unwrap_or(zeros[k]);
                next.push(hash_pair(pair[0], right));
            }
            levels.push(next);
        }

        Ok(Self { depth, levels, zeros })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn len(&self) -> usize {
        self.levels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels[0].is_empty()
    }

    pub fn root(&self) -> Fr {
        self.levels[self.depth]
            .first()
            .copied()
            .unwrap_or(self.zeros[self.depth])
    }

    /// Authentication path for the leaf at `index`.
    pub fn path(&self, index: usize) -> Result<MerklePath, ZkError> {
        if index >= self.len() {
            return Err(ZkError::LeafOutOfRange { index, len: self.len() });
        }

        let mut siblings = Vec::with_capacity(self.depth);
        let mut directions = Vec::with_capacity(self.depth);
        let mut idx = index;

        for k in 0..self.depth {
            let is_right = idx % 2 == 1;
            let sibling_idx = if is_right { idx - 1 } else { idx + 1 };
            siblings.push(self.levels[k].get(sibling_idx).copied().unwrap_or(self.zeros[k]));
            directions.push(is_right);
            idx /= 2;
        }

        Ok(MerklePath { siblings, directions })
    }
}

/// In-circuit Merkle inclusion check.
pub struct MerkleInclusionGadget;

impl MerkleInclusionGadget {
    /// Recompute the root bottom-up and return `recomputed == root`.
    pub fn is_member(
        cs: ConstraintSystemRef<Fr>,
        leaf: &FpVar<Fr>,
        root: &FpVar<Fr>,
        siblings: &[FpVar<Fr>],
        directions: &[Boolean<Fr>],
    ) -> Result<Boolean<Fr>, SynthesisError> {
        if siblings.len() != directions.len() {
            return Err(SynthesisError::Unsatisfiable);
        }

        let mut current = leaf.clone();
        for (sibling, is_right) in siblings.iter().zip(directions) {
            let left = is_right.select(sibling, &current)?;
            let right = is_right.select(&current, sibling)?;
            current = poseidon_hash_var(cs.clone(), &[left, right])?;
        }

        current.is_eq(root)
    }
}
