use crate::challenge::{Challenge, Defect, Proof, ValidationResult};
use crate::config::ValidationConfig;
use crate::error::Result;
use crate::merkle::verify_merkle_path;
use cmx_types::Seed;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing::{debug, info, warn};

/// Confidence above which a failed result is worth re-sampling
const ESCALATION_CONFIDENCE: f64 = 0.95;

/// Issues seeded sampling challenges and checks Merkle-authenticated answers
pub struct ProofValidator {
    config: ValidationConfig,
}

impl ProofValidator {
    pub fn new(config: ValidationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Draw the sample indices for a job's output.
    ///
    /// The sequence depends only on the seed, the output size and the
    /// config, so workers and auditors can recompute it.
    pub fn generate_challenge(&self, job_id: &str, output_size: u64, seed: &Seed) -> Challenge {
        let mut rng = ChaCha20Rng::from_seed(*seed.as_bytes());
        let sample_size = (self.config.sample_size as u64).min(output_size);

        let samples = if sample_size == 0 {
            Vec::new()
        } else if self.config.stratified_sampling {
            stratified_samples(&mut rng, output_size, sample_size)
        } else {
            uniform_samples(&mut rng, output_size, sample_size)
        };

        debug!(
            job_id,
            output_size,
            samples = samples.len(),
            stratified = self.config.stratified_sampling,
            "🎲 Challenge generated"
        );

        Challenge {
            job_id: job_id.to_string(),
            samples,
            seed: *seed,
            block_delay: self.config.challenge_delay_blocks,
        }
    }

    /// Check every sampled index of `challenge` against `proof`.
    ///
    /// Never fails outright; each problem becomes a [`Defect`] and the
    /// affected sample counts as unverified.
    pub fn verify_proof(&self, challenge: &Challenge, proof: &Proof) -> ValidationResult {
        if proof.job_id != challenge.job_id {
            warn!(
                challenge_job = %challenge.job_id,
                proof_job = %proof.job_id,
                "Proof job id does not match challenge"
            );
        }

        let mut defects = Vec::new();
        let mut verified = 0usize;

        for &index in &challenge.samples {
            let Some(data) = proof.samples.get(&index) else {
                defects.push(Defect::MissingSample { index });
                continue;
            };
            let Some(path) = proof.merkle_paths.get(&index) else {
                defects.push(Defect::MissingMerklePath { index });
                continue;
            };
            if verify_merkle_path(data, path, index, &proof.output_root) {
                verified += 1;
            } else {
                defects.push(Defect::InvalidMerkleProof { index });
            }
        }

        let total = challenge.samples.len();
        let confidence = if total == 0 {
            0.0
        } else {
            verified as f64 / total as f64
        };
        let passed = confidence >= self.config.min_confidence;

        if self.config.adaptive_escalation && !passed && confidence > ESCALATION_CONFIDENCE {
            defects.push(Defect::EscalationRecommended { confidence });
        }

        if passed {
            info!(
                job_id = %challenge.job_id,
                verified,
                total,
                confidence,
                "✅ Proof verified"
            );
        } else {
            warn!(
                job_id = %challenge.job_id,
                verified,
                total,
                confidence,
                defects = defects.len(),
                "❌ Proof rejected"
            );
        }

        ValidationResult {
            job_id: challenge.job_id.clone(),
            passed,
            samples_verified: verified,
            samples_total: total,
            confidence,
            defects,
        }
    }
}

/// `floor(sqrt(s))` strata of equal width (the last one absorbs the
/// remainder), `s / strata` draws in each, then uniform draws over the whole
/// range until `s` indices exist.
fn stratified_samples(rng: &mut ChaCha20Rng, output_size: u64, sample_size: u64) -> Vec<u64> {
    let strata = ((sample_size as f64).sqrt() as u64).max(1);
    let width = output_size / strata;
    let per_stratum = sample_size / strata;

    let mut samples = Vec::with_capacity(sample_size as usize);
    for i in 0..strata {
        let start = i * width;
        let end = if i == strata - 1 { output_size } else { start + width };
        for _ in 0..per_stratum {
            samples.push(rng.gen_range(start..end));
        }
    }
    while (samples.len() as u64) < sample_size {
        samples.push(rng.gen_range(0..output_size));
    }
    samples
}

fn uniform_samples(rng: &mut ChaCha20Rng, output_size: u64, sample_size: u64) -> Vec<u64> {
    (0..sample_size)
        .map(|_| rng.gen_range(0..output_size))
        .collect()
}
