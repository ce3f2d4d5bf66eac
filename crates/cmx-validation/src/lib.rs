//! Probabilistic output checking.
//!
//! A job's output is committed as the root of a SHA-256 Merkle tree over its
//! chunks. The validator samples chunk indices from an external seed and
//! checks each opened chunk against that root, so verification costs
//! `O(samples × depth)` regardless of output size.

pub mod challenge;
pub mod config;
pub mod detection;
pub mod error;
pub mod merkle;
pub mod validator;

pub use challenge::{Challenge, Defect, Proof, ValidationResult};
pub use config::ValidationConfig;
pub use detection::{estimate_fraud_detection_probability, required_sample_size};
pub use error::{Result, ValidationError};
pub use merkle::{verify_merkle_path, MerkleTree};
pub use validator::ProofValidator;
