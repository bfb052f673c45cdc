//! Generation of NTT-friendly primes.

use num_bigint_dig::{prime::probably_prime, BigUint};

/// Returns whether the modulus p is prime; this function is 100% accurate.
pub fn is_prime(p: u64) -> bool {
    probably_prime(&BigUint::from(p), 0)
}

/// Generate a `num_bits`-bit prime, congruent to 1 mod `modulo`, strictly
/// smaller than `upper_bound`. Note that `num_bits` must be between 10 and
/// 62, and that `upper_bound` must be at most 2^num_bits.
///
/// Returns None if no such prime exists.
pub fn generate_prime(num_bits: usize, modulo: u64, upper_bound: u64) -> Option<u64> {
    if !(10..=62).contains(&num_bits) || modulo < 2 {
        return None;
    }
    debug_assert!(
        (1u64 << num_bits) >= upper_bound,
        "upper_bound larger than number of bits"
    );
    if upper_bound < 2 + modulo {
        return None;
    }

    let leading_zeros = (64 - num_bits) as u32;

    let mut tentative_prime = upper_bound - 1;
    tentative_prime -= (tentative_prime - 1) % modulo;
    while tentative_prime.leading_zeros() == leading_zeros && !is_prime(tentative_prime) {
        match tentative_prime.checked_sub(modulo) {
            Some(next) if next > 1 => tentative_prime = next,
            _ => return None,
        }
    }

    if tentative_prime.leading_zeros() == leading_zeros {
        debug_assert!(is_prime(tentative_prime));
        debug_assert_eq!(tentative_prime % modulo, 1);
        Some(tentative_prime)
    } else {
        None
    }
}
