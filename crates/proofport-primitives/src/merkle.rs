use crate::error::{PrimitivesError, Result};
use alloy::primitives::{keccak256, Address, B256};

/// Membership proof for one leaf of a [`SignerMerkleTree`].
///
/// `leaf_index` is the path index consumed by [`verify_proof`]: its bits are
/// the left/right parities at exactly the levels that contributed a sibling.
/// For a carried-up leaf it therefore differs from the leaf's position in the
/// allowlist; for full binary trees the two coincide.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleProof {
    pub siblings: Vec<B256>,
    pub leaf_index: usize,
    pub depth: usize,
}

/// Merkle tree over an ordered allowlist of authorized attester addresses.
///
/// Leaves are `keccak256(address)`, internal nodes `keccak256(left || right)`.
/// An unpaired node at any level is carried up to the next level unchanged,
/// there is no self-pairing; a single-leaf tree's root equals its leaf hash.
#[derive(Clone, Debug)]
pub struct SignerMerkleTree {
    leaves: Vec<Address>,
    levels: Vec<Vec<B256>>,
}

impl SignerMerkleTree {
    pub fn build(addresses: Vec<Address>) -> Result<Self> {
        if addresses.is_empty() {
            return Err(PrimitivesError::EmptyAllowlist);
        }

        let mut levels: Vec<Vec<B256>> = vec![addresses
            .iter()
            .map(|a| keccak256(a.as_slice()))
            .collect()];

        while levels.last().expect("at least one level").len() > 1 {
            let current = levels.last().expect("at least one level");
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            for pair in current.chunks(2) {
                match pair {
                    [left, right] => next.push(hash_pair(left, right)),
                    // odd node carries up unhashed
                    [lone] => next.push(*lone),
                    _ => unreachable!(),
                }
            }
            levels.push(next);
        }

        Ok(Self {
            leaves: addresses,
            levels,
        })
    }

    pub fn root(&self) -> B256 {
        self.levels.last().expect("non-empty tree")[0]
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn leaf_hash(&self, index: usize) -> Result<B256> {
        self.levels[0]
            .get(index)
            .copied()
            .ok_or(PrimitivesError::IndexOutOfBounds {
                index,
                len: self.leaves.len(),
            })
    }

    /// Membership proof for the leaf at `index`. Levels where the node is
    /// carried up unpaired contribute no sibling and no path bit.
    pub fn proof(&self, index: usize) -> Result<MerkleProof> {
        if index >= self.leaves.len() {
            return Err(PrimitivesError::IndexOutOfBounds {
                index,
                len: self.leaves.len(),
            });
        }

        let mut siblings = Vec::new();
        let mut path = 0usize;
        let mut idx = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_idx = idx ^ 1;
            if let Some(sibling) = level.get(sibling_idx) {
                path |= (idx % 2) << siblings.len();
                siblings.push(*sibling);
            }
            idx /= 2;
        }

        let depth = siblings.len();
        Ok(MerkleProof {
            siblings,
            leaf_index: path,
            depth,
        })
    }

    /// Case-insensitive lookup of an address in the allowlist.
    pub fn find_index(&self, address: &str) -> Result<usize> {
        let needle: Address = address
            .parse()
            .map_err(|_| PrimitivesError::SignerNotAuthorized(address.to_string()))?;
        self.leaves
            .iter()
            .position(|a| *a == needle)
            .ok_or_else(|| PrimitivesError::SignerNotAuthorized(address.to_string()))
    }
}

fn hash_pair(left: &B256, right: &B256) -> B256 {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left.as_slice());
    buf[32..].copy_from_slice(right.as_slice());
    keccak256(buf)
}

/// Replays a proof against a root with the pairwise-hash algorithm the circuit
/// itself runs: at each level the node is the right child iff its index is
/// odd, and the index halves going up.
pub fn verify_proof(root: B256, leaf: B256, leaf_index: usize, siblings: &[B256]) -> bool {
    let mut current = leaf;
    let mut idx = leaf_index;
    for sibling in siblings {
        let is_right = idx % 2 == 1;
        let (left, right) = if is_right {
            (sibling, &current)
        } else {
            (&current, sibling)
        };
        current = hash_pair(left, right);
        idx /= 2;
    }
    current == root
}
