use cmx_types::Seed;
use cmx_validation::{
    Challenge, Defect, MerkleTree, Proof, ProofValidator, ValidationConfig, ValidationError,
};
use proptest::prelude::*;

fn validator(config: ValidationConfig) -> ProofValidator {
    ProofValidator::new(config).unwrap()
}

fn chunks(n: usize) -> Vec<Vec<u8>> {
    (0..n).map(|i| format!("data{}", i).into_bytes()).collect()
}

#[test]
fn test_four_leaf_tree_verifies() {
    let leaves = chunks(4);
    let tree = MerkleTree::from_leaves(&leaves).unwrap();
    let v = validator(ValidationConfig::default());

    let challenge = Challenge {
        job_id: "job-1".into(),
        samples: vec![0, 1, 2],
        seed: Seed::ZERO,
        block_delay: None,
    };
    let proof = Proof::answer(&challenge, &tree, &leaves);

    let result = v.verify_proof(&challenge, &proof);
    assert_eq!(result.samples_verified, 3);
    assert_eq!(result.samples_total, 3);
    assert_eq!(result.confidence, 1.0);
    assert!(result.passed);
    assert!(result.defects.is_empty());
}

#[test]
fn test_challenge_is_deterministic() {
    let v = validator(ValidationConfig::default());
    let seed = Seed::from_bytes([0x42; 32]);

    let a = v.generate_challenge("job-1", 50_000, &seed);
    let b = v.generate_challenge("job-1", 50_000, &seed);
    assert_eq!(a, b);
    assert_eq!(a.samples.len(), 1000);

    let other = v.generate_challenge("job-1", 50_000, &Seed::from_bytes([0x43; 32]));
    assert_ne!(a.samples, other.samples);
}

#[test]
fn test_sample_size_capped_by_output() {
    let v = validator(ValidationConfig::default());
    let challenge = v.generate_challenge("small", 100, &Seed::ZERO);
    assert_eq!(challenge.samples.len(), 100);
    assert!(challenge.samples.iter().all(|&s| s < 100));
}

#[test]
fn test_stratified_coverage() {
    let v = validator(ValidationConfig {
        sample_size: 100,
        ..Default::default()
    });
    let challenge = v.generate_challenge("job-1", 1000, &Seed::from_bytes([7; 32]));
    assert_eq!(challenge.samples.len(), 100);

    let mut buckets = [false; 10];
    for &s in &challenge.samples {
        assert!(s < 1000);
        buckets[(s / 100) as usize] = true;
    }
    let covered = buckets.iter().filter(|&&b| b).count();
    assert!(covered >= 5, "only {} of 10 buckets covered", covered);
}

#[test]
fn test_uniform_sampling_in_range() {
    let v = validator(ValidationConfig {
        sample_size: 500,
        stratified_sampling: false,
        ..Default::default()
    });
    let challenge = v.generate_challenge("job-1", 777, &Seed::from_bytes([1; 32]));
    assert_eq!(challenge.samples.len(), 500);
    assert!(challenge.samples.iter().all(|&s| s < 777));
}

#[test]
fn test_challenge_carries_block_delay() {
    let v = validator(ValidationConfig {
        challenge_delay_blocks: Some(12),
        ..Default::default()
    });
    assert_eq!(v.generate_challenge("job", 10, &Seed::ZERO).block_delay, Some(12));
}

#[test]
fn test_missing_sample_and_path_are_distinct_defects() {
    let leaves = chunks(4);
    let tree = MerkleTree::from_leaves(&leaves).unwrap();
    let v = validator(ValidationConfig::default());
    let challenge = Challenge {
        job_id: "job-1".into(),
        samples: vec![0, 1, 2],
        seed: Seed::ZERO,
        block_delay: None,
    };

    let mut proof = Proof::answer(&challenge, &tree, &leaves);
    proof.samples.remove(&1);
    proof.merkle_paths.remove(&2);

    let result = v.verify_proof(&challenge, &proof);
    assert_eq!(result.samples_verified, 1);
    assert!(!result.passed);
    assert!(result.defects.contains(&Defect::MissingSample { index: 1 }));
    assert!(result.defects.contains(&Defect::MissingMerklePath { index: 2 }));
    assert!(!result.has_invalid_proof());
}

#[test]
fn test_tampered_sample_is_invalid_proof() {
    let leaves = chunks(4);
    let tree = MerkleTree::from_leaves(&leaves).unwrap();
    let v = validator(ValidationConfig::default());
    let challenge = Challenge {
        job_id: "job-1".into(),
        samples: vec![0, 3],
        seed: Seed::ZERO,
        block_delay: None,
    };

    let mut proof = Proof::answer(&challenge, &tree, &leaves);
    proof.samples.insert(3, b"forged".to_vec());

    let result = v.verify_proof(&challenge, &proof);
    assert_eq!(result.samples_verified, 1);
    assert_eq!(result.confidence, 0.5);
    assert_eq!(result.defects, vec![Defect::InvalidMerkleProof { index: 3 }]);
    assert!(result.has_invalid_proof());
}

#[test]
fn test_wrong_root_fails_every_sample() {
    let leaves = chunks(8);
    let tree = MerkleTree::from_leaves(&leaves).unwrap();
    let v = validator(ValidationConfig::default());
    let challenge = v.generate_challenge("job-1", 8, &Seed::from_bytes([5; 32]));

    let mut proof = Proof::answer(&challenge, &tree, &leaves);
    proof.output_root = [0xAA; 32];

    let result = v.verify_proof(&challenge, &proof);
    assert_eq!(result.samples_verified, 0);
    assert_eq!(result.confidence, 0.0);
    assert_eq!(result.defects.len(), 8);
}

#[test]
fn test_borderline_failure_recommends_escalation() {
    let leaves = chunks(1000);
    let tree = MerkleTree::from_leaves(&leaves).unwrap();
    let v = validator(ValidationConfig::default());
    let challenge = Challenge {
        job_id: "job-1".into(),
        samples: (0..100).collect(),
        seed: Seed::ZERO,
        block_delay: None,
    };

    // 98 of 100 verify: fails 0.999 but clears 0.95
    let mut proof = Proof::answer(&challenge, &tree, &leaves);
    proof.samples.remove(&10);
    proof.samples.remove(&20);

    let result = v.verify_proof(&challenge, &proof);
    assert!(!result.passed);
    assert!((result.confidence - 0.98).abs() < 1e-12);
    assert!(result.escalation_recommended());

    let quiet = validator(ValidationConfig {
        adaptive_escalation: false,
        ..Default::default()
    });
    assert!(!quiet.verify_proof(&challenge, &proof).escalation_recommended());
}

#[test]
fn test_clear_failure_does_not_escalate() {
    let leaves = chunks(10);
    let tree = MerkleTree::from_leaves(&leaves).unwrap();
    let v = validator(ValidationConfig::default());
    let challenge = Challenge {
        job_id: "job-1".into(),
        samples: (0..10).collect(),
        seed: Seed::ZERO,
        block_delay: None,
    };
    let mut proof = Proof::answer(&challenge, &tree, &leaves);
    proof.samples.remove(&0);

    let result = v.verify_proof(&challenge, &proof);
    assert!((result.confidence - 0.9).abs() < 1e-12);
    assert!(!result.escalation_recommended());
}

#[test]
fn test_invalid_config_rejected() {
    for config in [
        ValidationConfig {
            sample_size: 0,
            ..Default::default()
        },
        ValidationConfig {
            min_confidence: 1.5,
            ..Default::default()
        },
        ValidationConfig {
            min_confidence: 0.0,
            ..Default::default()
        },
    ] {
        assert!(matches!(
            ProofValidator::new(config),
            Err(ValidationError::InvalidConfiguration(_))
        ));
    }
}

#[test]
fn test_result_serializes_defects() {
    let v = validator(ValidationConfig::default());
    let challenge = v.generate_challenge("job-1", 2, &Seed::ZERO);
    let result = v.verify_proof(&challenge, &Proof::new("job-1", [0; 32]));

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["defects"][0]["kind"], "missing_sample");
    assert_eq!(json["passed"], false);
}

proptest! {
    #[test]
    fn prop_challenge_bounds(
        output_size in 0u64..20_000,
        sample_size in 1usize..2_000,
        stratified in any::<bool>(),
        seed in prop::array::uniform32(any::<u8>()),
    ) {
        let v = validator(ValidationConfig {
            sample_size,
            stratified_sampling: stratified,
            ..Default::default()
        });
        let challenge = v.generate_challenge("p", output_size, &Seed::from_bytes(seed));

        prop_assert_eq!(challenge.samples.len() as u64, (sample_size as u64).min(output_size));
        prop_assert!(challenge.samples.iter().all(|&s| s < output_size));
    }

    #[test]
    fn prop_honest_proof_always_passes(
        n in 1usize..200,
        sample_size in 1usize..64,
        seed in prop::array::uniform32(any::<u8>()),
    ) {
        let leaves = chunks(n);
        let tree = MerkleTree::from_leaves(&leaves).unwrap();
        let v = validator(ValidationConfig {
            sample_size,
            ..Default::default()
        });
        let challenge = v.generate_challenge("p", n as u64, &Seed::from_bytes(seed));
        let result = v.verify_proof(&challenge, &Proof::answer(&challenge, &tree, &leaves));

        prop_assert_eq!(result.confidence, 1.0);
        prop_assert!(result.passed);
        prop_assert!(result.defects.is_empty());
    }

    #[test]
    fn prop_confidence_in_unit_interval(
        n in 1usize..100,
        drop_mask in prop::collection::vec(any::<bool>(), 100),
        seed in prop::array::uniform32(any::<u8>()),
    ) {
        let leaves = chunks(n);
        let tree = MerkleTree::from_leaves(&leaves).unwrap();
        let v = validator(ValidationConfig {
            sample_size: 50,
            ..Default::default()
        });
        let challenge = v.generate_challenge("p", n as u64, &Seed::from_bytes(seed));
        let mut proof = Proof::answer(&challenge, &tree, &leaves);
        for (i, drop) in drop_mask.iter().enumerate() {
            if *drop {
                proof.samples.remove(&(i as u64));
            }
        }

        let result = v.verify_proof(&challenge, &proof);
        prop_assert!((0.0..=1.0).contains(&result.confidence));
        prop_assert_eq!(result.confidence == 1.0, result.defects.is_empty());
    }
}
