//! Detection guarantees of random sampling, independent of any challenge.

/// Probability that `sample_size` uniform samples hit at least one bad chunk
/// when a fraction `fraud_rate` of the output is bad: `1 - (1 - f)^s`.
///
/// `fraud_rate` is clamped to `[0, 1]`; a non-finite rate is treated as 0.
pub fn estimate_fraud_detection_probability(fraud_rate: f64, sample_size: u64) -> f64 {
    let f = clamp_unit(fraud_rate);
    1.0 - (1.0 - f).powf(sample_size as f64)
}

/// Smallest sample size whose detection probability reaches `target`.
///
/// Returns `None` when no finite sample size can: a zero fraud rate with a
/// positive target, or a target of 1 or more against a partial fraud rate.
pub fn required_sample_size(fraud_rate: f64, target: f64) -> Option<u64> {
    let f = clamp_unit(fraud_rate);
    if !target.is_finite() {
        return None;
    }
    if target <= 0.0 {
        return Some(0);
    }
    if f >= 1.0 {
        return Some(1);
    }
    if f == 0.0 || target >= 1.0 {
        return None;
    }

    let estimate = ((1.0 - target).ln() / (1.0 - f).ln()).ceil();
    if !estimate.is_finite() || estimate >= u64::MAX as f64 {
        return None;
    }
    let mut s = estimate.max(0.0) as u64;
    // Walk off floating point error around the boundary
    while s > 0 && estimate_fraud_detection_probability(f, s - 1) >= target {
        s -= 1;
    }
    while estimate_fraud_detection_probability(f, s) < target {
        s += 1;
    }
    Some(s)
}

fn clamp_unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}
