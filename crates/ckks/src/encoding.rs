//! Canonical embedding for the CKKS encoding.
//!
//! The slots of a plaintext polynomial of degree `n` are its evaluations at
//! the primitive `2n`-th roots of unity `ζ^(5^j)`, for `0 <= j < n / 2`. The
//! special FFT below computes these evaluations, and their inverse, in
//! `O(n log n)`.

use num_complex::Complex64;
use std::f64::consts::PI;

/// Special FFT evaluating and interpolating the canonical embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecialFft {
    m: usize,
    slots: usize,
    rot_group: Box<[usize]>,
    ksi_pows: Box<[Complex64]>,
}

impl SpecialFft {
    /// Create the special FFT for polynomials of a given degree.
    ///
    /// Aborts if the degree is not a power of two larger or equal to 8 in
    /// debug mode.
    pub fn new(degree: usize) -> Self {
        debug_assert!(degree >= 8 && degree.is_power_of_two());

        let m = 2 * degree;
        let slots = degree / 2;

        let mut rot_group = Vec::with_capacity(slots);
        let mut five_pow = 1usize;
        for _ in 0..slots {
            rot_group.push(five_pow);
            five_pow = (five_pow * 5) % m;
        }

        let ksi_pows = (0..=m)
            .map(|j| Complex64::from_polar(1.0, 2.0 * PI * (j as f64) / (m as f64)))
            .collect::<Vec<_>>();

        Self {
            m,
            slots,
            rot_group: rot_group.into_boxed_slice(),
            ksi_pows: ksi_pows.into_boxed_slice(),
        }
    }

    /// Number of slots, i.e. half the degree.
    pub const fn slots(&self) -> usize {
        self.slots
    }

    /// Galois element rotating the slots to the left by `steps` positions.
    pub fn rotation_element(&self, steps: usize) -> usize {
        self.rot_group[steps % self.slots]
    }

    /// Evaluate the polynomial whose coefficients are packed in `vals`
    /// (real parts in the low half, imaginary parts in the high half) at the
    /// slot roots, in place.
    ///
    /// Aborts if `vals` does not have exactly `slots` elements.
    pub fn embed(&self, vals: &mut [Complex64]) {
        assert_eq!(vals.len(), self.slots);
        let size = vals.len();

        bit_reverse(vals);
        let mut len = 2;
        while len <= size {
            let lenh = len >> 1;
            let lenq = len << 2;
            let gap = self.m / lenq;
            for i in (0..size).step_by(len) {
                for j in 0..lenh {
                    let idx = (self.rot_group[j] % lenq) * gap;
                    let u = vals[i + j];
                    let v = vals[i + j + lenh] * self.ksi_pows[idx];
                    vals[i + j] = u + v;
                    vals[i + j + lenh] = u - v;
                }
            }
            len <<= 1;
        }
    }

    /// Inverse of [`SpecialFft::embed`], in place.
    ///
    /// Aborts if `vals` does not have exactly `slots` elements.
    pub fn embed_inverse(&self, vals: &mut [Complex64]) {
        assert_eq!(vals.len(), self.slots);
        let size = vals.len();

        let mut len = size;
        while len >= 1 {
            let lenh = len >> 1;
            let lenq = len << 2;
            let gap = self.m / lenq;
            for i in (0..size).step_by(len) {
                for j in 0..lenh {
                    let idx = (lenq - (self.rot_group[j] % lenq)) * gap;
                    let u = vals[i + j] + vals[i + j + lenh];
                    let v = (vals[i + j] - vals[i + j + lenh]) * self.ksi_pows[idx];
                    vals[i + j] = u;
                    vals[i + j + lenh] = v;
                }
            }
            len >>= 1;
        }
        bit_reverse(vals);

        let size_inv = 1.0 / size as f64;
        vals.iter_mut().for_each(|v| *v *= size_inv);
    }
}

fn bit_reverse(vals: &mut [Complex64]) {
    let size = vals.len();
    if size <= 2 {
        return;
    }
    let shift = usize::BITS - size.trailing_zeros();
    for i in 0..size {
        let j = i.reverse_bits() >> shift;
        if i < j {
            vals.swap(i, j);
        }
    }
}
