//! Sampling of small polynomial coefficients.

use crate::{Error, Result};
use rand::{CryptoRng, RngCore};

/// Sample a vector of independent centered binomial distributions of a given
/// variance. The variance must be a multiple of 1/2 between 0.5 and 16.
///
/// Each sample is the difference of the Hamming weights of two words of
/// `2 * variance` random bits.
pub fn sample_vec_cbd<R: RngCore + CryptoRng>(
    vector_size: usize,
    variance: f32,
    rng: &mut R,
) -> Result<Vec<i64>> {
    let k = (2.0 * variance).round();
    if !(1.0..=32.0).contains(&k) || (2.0 * variance - k).abs() > f32::EPSILON {
        return Err(Error::Default(format!(
            "The variance should be a multiple of 1/2 between 0.5 and 16, got {variance}"
        )));
    }
    let k = k as u32;
    let mask = if k == 32 { u32::MAX } else { (1u32 << k) - 1 };

    Ok((0..vector_size)
        .map(|_| {
            let bits = rng.next_u64();
            let a = (bits as u32) & mask;
            let b = ((bits >> 32) as u32) & mask;
            a.count_ones() as i64 - b.count_ones() as i64
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::sample_vec_cbd;
    use rand::thread_rng;
    use std::error::Error;

    #[test]
    fn invalid_variance() {
        let mut rng = thread_rng();
        assert!(sample_vec_cbd(10, 0.0, &mut rng).is_err());
        assert!(sample_vec_cbd(10, 0.7, &mut rng).is_err());
        assert!(sample_vec_cbd(10, 16.5, &mut rng).is_err());
    }

    #[test]
    fn bounds_and_variance() -> Result<(), Box<dyn Error>> {
        let mut rng = thread_rng();
        for variance in [0.5f32, 1.0, 10.0, 16.0] {
            let v = sample_vec_cbd(100_000, variance, &mut rng)?;
            let bound = (2.0 * variance) as i64;
            assert!(v.iter().all(|vi| vi.abs() <= bound));

            let mean = v.iter().sum::<i64>() as f64 / v.len() as f64;
            let empirical = v.iter().map(|vi| (*vi as f64 - mean).powi(2)).sum::<f64>()
                / v.len() as f64;
            assert!((empirical - variance as f64).abs() < 0.1 * variance as f64);
        }
        Ok(())
    }
}
