//! Ring of integers modulo q, with q a prime of at most 62 bits.

pub mod primes;

use crate::{Error, Result};
use itertools::Itertools;
use rand::{CryptoRng, Rng, RngCore};

/// Structure encapsulating an integer modulus up to 62 bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modulus {
    pub(crate) p: u64,
}

impl Modulus {
    /// Create a modulus from an integer of at most 62 bits.
    pub fn new(p: u64) -> Result<Self> {
        if p < 2 || (p >> 62) != 0 {
            Err(Error::InvalidModulus(p))
        } else {
            Ok(Self { p })
        }
    }

    /// Returns the value of the modulus.
    pub const fn modulus(&self) -> u64 {
        self.p
    }

    /// Modular addition of a and b in constant time.
    ///
    /// Aborts if a >= p or b >= p in debug mode.
    pub const fn add(&self, a: u64, b: u64) -> u64 {
        debug_assert!(a < self.p && b < self.p);
        Self::reduce1(a + b, self.p)
    }

    /// Modular subtraction of a and b in constant time.
    ///
    /// Aborts if a >= p or b >= p in debug mode.
    pub const fn sub(&self, a: u64, b: u64) -> u64 {
        debug_assert!(a < self.p && b < self.p);
        Self::reduce1(a + self.p - b, self.p)
    }

    /// Modular negation of a in constant time.
    ///
    /// Aborts if a >= p in debug mode.
    pub const fn neg(&self, a: u64) -> u64 {
        debug_assert!(a < self.p);
        Self::reduce1(self.p - a, self.p)
    }

    /// Modular multiplication of a and b.
    ///
    /// Aborts if a >= p or b >= p in debug mode.
    pub const fn mul(&self, a: u64, b: u64) -> u64 {
        debug_assert!(a < self.p && b < self.p);
        ((a as u128 * b as u128) % (self.p as u128)) as u64
    }

    /// Compute the Shoup representation of a.
    ///
    /// Aborts if a >= p in debug mode.
    pub const fn shoup(&self, a: u64) -> u64 {
        debug_assert!(a < self.p);
        (((a as u128) << 64) / (self.p as u128)) as u64
    }

    /// Shoup representation of a vector of values.
    pub fn shoup_vec(&self, a: &[u64]) -> Vec<u64> {
        a.iter().map(|ai| self.shoup(*ai)).collect_vec()
    }

    /// Lazy Shoup multiplication of a and b, with b_shoup the Shoup
    /// representation of b. The result is in [0, 2p).
    ///
    /// Aborts if b >= p in debug mode.
    pub const fn lazy_mul_shoup(&self, a: u64, b: u64, b_shoup: u64) -> u64 {
        debug_assert!(b < self.p);
        let q = ((a as u128 * b_shoup as u128) >> 64) as u64;
        let r = a.wrapping_mul(b).wrapping_sub(q.wrapping_mul(self.p));
        debug_assert!(r < 2 * self.p);
        r
    }

    /// Shoup multiplication of a and b, with b_shoup the Shoup representation
    /// of b.
    pub const fn mul_shoup(&self, a: u64, b: u64, b_shoup: u64) -> u64 {
        Self::reduce1(self.lazy_mul_shoup(a, b, b_shoup), self.p)
    }

    /// Reduce a value in [0, 2p) to [0, p).
    pub const fn reduce1(x: u64, p: u64) -> u64 {
        debug_assert!(x < 2 * p);
        if x >= p {
            x - p
        } else {
            x
        }
    }

    /// Modular reduction of an arbitrary u64.
    pub const fn reduce(&self, a: u64) -> u64 {
        a % self.p
    }

    /// Modular reduction of a signed integer.
    pub const fn reduce_i64(&self, a: i64) -> u64 {
        (a as i128).rem_euclid(self.p as i128) as u64
    }

    /// Modular reduction of a signed 128-bit integer.
    pub const fn reduce_i128(&self, a: i128) -> u64 {
        a.rem_euclid(self.p as i128) as u64
    }

    /// Reduce a vector in place.
    pub fn reduce_vec(&self, a: &mut [u64]) {
        a.iter_mut().for_each(|ai| *ai = self.reduce(*ai));
    }

    /// Modular exponentiation.
    ///
    /// Aborts if a >= p in debug mode.
    pub fn pow(&self, a: u64, n: u64) -> u64 {
        debug_assert!(a < self.p);
        let mut result = 1 % self.p;
        let mut base = a;
        let mut exponent = n;
        while exponent > 0 {
            if exponent & 1 == 1 {
                result = self.mul(result, base);
            }
            base = self.mul(base, base);
            exponent >>= 1;
        }
        result
    }

    /// Modular inverse of a, assuming the modulus is prime.
    ///
    /// Returns None if a is zero modulo p.
    pub fn inv(&self, a: u64) -> Option<u64> {
        let a = self.reduce(a);
        if a == 0 {
            None
        } else {
            let r = self.pow(a, self.p - 2);
            debug_assert_eq!(self.mul(a, r), 1);
            Some(r)
        }
    }

    /// Sample a vector of uniformly random values modulo p.
    pub fn random_vec<R: RngCore + CryptoRng>(&self, size: usize, rng: &mut R) -> Vec<u64> {
        (0..size).map(|_| rng.gen_range(0..self.p)).collect_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::Modulus;
    use proptest::prelude::*;

    const P: u64 = 4611686018326724609;

    #[test]
    fn constructor() {
        assert!(Modulus::new(0).is_err());
        assert!(Modulus::new(1).is_err());
        assert!(Modulus::new(1 << 62).is_err());
        assert!(Modulus::new(2).is_ok());
        assert!(Modulus::new(P).is_ok());
    }

    #[test]
    fn inverse() {
        let q = Modulus::new(1153).unwrap();
        assert_eq!(q.inv(0), None);
        for a in 1..1153 {
            let b = q.inv(a).unwrap();
            assert_eq!(q.mul(a, b), 1);
        }
    }

    #[test]
    fn signed_reduction() {
        let q = Modulus::new(1153).unwrap();
        assert_eq!(q.reduce_i64(-1), 1152);
        assert_eq!(q.reduce_i64(1154), 1);
        assert_eq!(q.reduce_i128(-1153 * 3 - 2), 1151);
    }

    proptest! {
        #[test]
        fn shoup_matches_mul(a in 0..P, b in 0..P) {
            let q = Modulus::new(P).unwrap();
            prop_assert_eq!(q.mul_shoup(a, b, q.shoup(b)), q.mul(a, b));
        }

        #[test]
        fn add_sub_neg(a in 0..P, b in 0..P) {
            let q = Modulus::new(P).unwrap();
            prop_assert_eq!(q.sub(q.add(a, b), b), a);
            prop_assert_eq!(q.add(a, q.neg(a)), 0);
        }
    }
}
