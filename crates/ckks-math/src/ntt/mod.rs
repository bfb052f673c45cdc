//! Number-Theoretic Transform in ZZ_q.

mod native;

pub use native::NttOperator;

/// Returns whether a modulus p is prime and supports the Number Theoretic
/// Transform of size n.
///
/// Aborts if n is not a power of 2 that is >= 8.
pub fn supports_ntt(p: u64, n: usize) -> bool {
    assert!(n >= 8 && n.is_power_of_two());

    p % ((n as u64) << 1) == 1 && crate::zq::primes::is_prime(p)
}

#[cfg(test)]
mod tests {
    use super::{supports_ntt, NttOperator};
    use crate::zq::Modulus;
    use rand::thread_rng;

    #[test]
    fn ntt_support() {
        assert!(supports_ntt(1153, 8));
        assert!(supports_ntt(1153, 64));
        assert!(!supports_ntt(1153, 128));
        assert!(!supports_ntt(1155, 8));
        assert!(supports_ntt(4611686018326724609, 4096));
    }

    #[test]
    fn forward_backward() {
        let mut rng = thread_rng();
        for size in [8usize, 32, 1024] {
            for p in [1153u64, 4611686018326724609] {
                let q = Modulus::new(p).unwrap();
                let Some(op) = NttOperator::new(&q, size) else {
                    assert!(!supports_ntt(p, size));
                    continue;
                };
                for _ in 0..10 {
                    let a = q.random_vec(size, &mut rng);
                    let mut b = a.clone();
                    op.forward(&mut b);
                    assert!(b.iter().all(|bi| *bi < p));
                    assert_ne!(a, b);
                    op.backward(&mut b);
                    assert_eq!(a, b);
                }
            }
        }
    }

    #[test]
    fn negacyclic_product() {
        // (1 + x) * x^(n-1) = x^(n-1) - 1 in Z_q[x]/(x^n + 1).
        let q = Modulus::new(1153).unwrap();
        let op = NttOperator::new(&q, 8).unwrap();
        let mut a = vec![1u64, 1, 0, 0, 0, 0, 0, 0];
        let mut b = vec![0u64, 0, 0, 0, 0, 0, 0, 1];
        op.forward(&mut a);
        op.forward(&mut b);
        let mut c = a.iter().zip(&b).map(|(ai, bi)| q.mul(*ai, *bi)).collect::<Vec<_>>();
        op.backward(&mut c);
        assert_eq!(c, vec![1152, 0, 0, 0, 0, 0, 0, 1]);
    }
}
