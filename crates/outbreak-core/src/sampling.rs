//! Random sampling helpers shared by population generation and the epoch
//! state machine.

use rand::Rng;

/// Draw from `N(mean, std_dev)` using the Box-Muller transform.
pub fn sample_normal<R: Rng + ?Sized>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    // `random` yields [0, 1); flip it so the logarithm never sees zero.
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = rng.random::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    std_dev.mul_add(z, mean)
}

/// Draw a count from `N(mean, std_dev)`, floored and clamped to at least 1.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn sample_count<R: Rng + ?Sized>(rng: &mut R, mean: f64, std_dev: f64) -> u64 {
    let sample = sample_normal(rng, mean, std_dev).floor().max(1.0);
    if sample.is_finite() { sample as u64 } else { 1 }
}

/// Pick an index uniformly from `0..len`. `None` when `len` is zero.
pub fn sample_index<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Option<usize> {
    (len > 0).then(|| rng.random_range(0..len))
}

/// Run one Bernoulli trial with success probability `p`.
///
/// Probabilities outside `[0, 1]` behave as their nearest bound.
pub fn bernoulli<R: Rng + ?Sized>(rng: &mut R, p: f64) -> bool {
    rng.random::<f64>() < p
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn normal_samples_center_on_mean() {
        let mut rng = StdRng::seed_from_u64(1);
        let n = 20_000;
        let sum: f64 = (0..n).map(|_| sample_normal(&mut rng, 10.0, 2.0)).sum();
        let mean = sum / f64::from(n);
        assert!((mean - 10.0).abs() < 0.1, "mean was {mean}");
    }

    #[test]
    fn counts_are_at_least_one() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..1000 {
            assert!(sample_count(&mut rng, 5.0, 4.0) >= 1);
        }
    }

    #[test]
    fn index_of_empty_range_is_none() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(sample_index(&mut rng, 0), None);
        assert_eq!(sample_index(&mut rng, 1), Some(0));
    }

    #[test]
    fn bernoulli_extremes() {
        let mut rng = StdRng::seed_from_u64(4);
        assert!((0..100).all(|_| !bernoulli(&mut rng, 0.0)));
        assert!((0..100).all(|_| bernoulli(&mut rng, 1.0)));
    }
}
