use crate::merkle::MerkleTree;
use cmx_types::{Hash, JobId, Seed};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Indices a worker must open against its committed output root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub job_id: JobId,
    /// Sampled chunk indices, in draw order; duplicates allowed
    pub samples: Vec<u64>,
    pub seed: Seed,
    /// Blocks before the challenge may be answered
    pub block_delay: Option<u64>,
}

/// Worker's answer to a [`Challenge`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub job_id: JobId,
    pub samples: HashMap<u64, Vec<u8>>,
    pub merkle_paths: HashMap<u64, Vec<Hash>>,
    pub output_root: Hash,
}

impl Proof {
    pub fn new(job_id: impl Into<JobId>, output_root: Hash) -> Self {
        Self {
            job_id: job_id.into(),
            output_root,
            ..Default::default()
        }
    }

    pub fn insert(&mut self, index: u64, data: Vec<u8>, path: Vec<Hash>) {
        self.samples.insert(index, data);
        self.merkle_paths.insert(index, path);
    }

    /// Honest answer built from the full output and its tree. Indices
    /// outside the output are left unanswered.
    pub fn answer<T: AsRef<[u8]>>(challenge: &Challenge, tree: &MerkleTree, chunks: &[T]) -> Self {
        let mut proof = Self::new(challenge.job_id.clone(), tree.root());
        for &index in &challenge.samples {
            if proof.samples.contains_key(&index) {
                continue;
            }
            let chunk = usize::try_from(index).ok().and_then(|i| chunks.get(i));
            if let (Some(chunk), Some(path)) = (chunk, tree.proof(index)) {
                proof.insert(index, chunk.as_ref().to_vec(), path);
            }
        }
        proof
    }
}

/// Per-sample problem found while verifying a proof
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Defect {
    MissingSample { index: u64 },
    MissingMerklePath { index: u64 },
    InvalidMerkleProof { index: u64 },
    /// Advisory only: the result failed narrowly and more sampling may help
    EscalationRecommended { confidence: f64 },
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Defect::MissingSample { index } => write!(f, "missing sample at index {}", index),
            Defect::MissingMerklePath { index } => {
                write!(f, "missing Merkle path for index {}", index)
            }
            Defect::InvalidMerkleProof { index } => {
                write!(f, "invalid Merkle proof for index {}", index)
            }
            Defect::EscalationRecommended { confidence } => write!(
                f,
                "confidence {:.4} borderline, adaptive escalation recommended",
                confidence
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub job_id: JobId,
    pub passed: bool,
    pub samples_verified: usize,
    pub samples_total: usize,
    /// Fraction of sampled indices fully verified, in [0, 1]
    pub confidence: f64,
    pub defects: Vec<Defect>,
}

impl ValidationResult {
    /// True if any opened sample failed to authenticate against the root
    pub fn has_invalid_proof(&self) -> bool {
        self.defects
            .iter()
            .any(|d| matches!(d, Defect::InvalidMerkleProof { .. }))
    }

    pub fn escalation_recommended(&self) -> bool {
        self.defects
            .iter()
            .any(|d| matches!(d, Defect::EscalationRecommended { .. }))
    }
}
