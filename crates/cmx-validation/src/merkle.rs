//! Binary SHA-256 Merkle trees over output chunks.
//!
//! Leaves are `SHA-256(data)`; interior nodes are `SHA-256(left || right)`.
//! A level with an odd number of nodes pairs its last node with itself.

use cmx_types::Hash;
use sha2::{Digest, Sha256};

pub fn leaf_hash(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn node_hash(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Recompute the root from a sample and its authentication path.
///
/// At step `i`, bit `i` of `index` says whether the running hash is the
/// left (0) or right (1) child.
pub fn verify_merkle_path(data: &[u8], path: &[Hash], index: u64, root: &Hash) -> bool {
    let mut current = leaf_hash(data);
    for (i, sibling) in path.iter().enumerate() {
        let bit = index.checked_shr(i as u32).unwrap_or(0) & 1;
        current = if bit == 0 {
            node_hash(&current, sibling)
        } else {
            node_hash(sibling, &current)
        };
    }
    &current == root
}

#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// levels[0] holds leaf hashes, the last level holds the root
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    /// Build a tree over raw leaf data. Returns `None` for an empty input.
    pub fn from_leaves<T: AsRef<[u8]>>(leaves: &[T]) -> Option<Self> {
        if leaves.is_empty() {
            return None;
        }

        let mut levels = vec![leaves
            .iter()
            .map(|leaf| leaf_hash(leaf.as_ref()))
            .collect::<Vec<_>>()];

        while levels[levels.len() - 1].len() > 1 {
            let level = &levels[levels.len() - 1];
            let next = level
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => node_hash(left, right),
                    [single] => node_hash(single, single),
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            levels.push(next);
        }

        Some(Self { levels })
    }

    pub fn root(&self) -> Hash {
        self.levels[self.levels.len() - 1][0]
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Sibling hashes from leaf to root for the leaf at `index`
    pub fn proof(&self, index: u64) -> Option<Vec<Hash>> {
        let mut idx = usize::try_from(index).ok()?;
        if idx >= self.leaf_count() {
            return None;
        }

        let mut path = Vec::with_capacity(self.levels.len() - 1);
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = if idx % 2 == 0 {
                *level.get(idx + 1).unwrap_or(&level[idx])
            } else {
                level[idx - 1]
            };
            path.push(sibling);
            idx /= 2;
        }
        Some(path)
    }
}
