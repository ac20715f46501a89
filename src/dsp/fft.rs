//! In-place radix-2 Cooley–Tukey transform.

use super::complex::Complex;
use std::f64::consts::PI;

/// Reverse the lowest `bits` bits of `index`.
fn reverse_bits(index: usize, bits: u32) -> usize {
    let mut reversed = 0;
    for bit in 0..bits {
        if index & (1 << bit) != 0 {
            reversed |= 1 << (bits - 1 - bit);
        }
    }
    reversed
}

/// Forward DFT of `buffer`, computed in place.
///
/// The length must be a power of two; callers zero-pad up front. No
/// normalization is applied, so a round trip scales by the length.
pub fn transform(buffer: &mut [Complex]) {
    let n = buffer.len();
    debug_assert!(n.is_power_of_two(), "transform length must be a power of two");
    if n < 2 {
        return;
    }
    let bits = n.trailing_zeros();

    // Bit-reversal permutation; swap each pair once.
    for i in 0..n {
        let r = reverse_bits(i, bits);
        if i < r {
            buffer.swap(i, r);
        }
    }

    // Butterfly passes over sub-transforms of length 2, 4, ..., n.
    let mut len = 2;
    while len <= n {
        let angle = -2.0 * PI / len as f64;
        let w_len = Complex::new(angle.cos(), angle.sin());
        for base in (0..n).step_by(len) {
            let mut w = Complex::real(1.0);
            for k in 0..len / 2 {
                let even = buffer[base + k];
                let odd = w * buffer[base + k + len / 2];
                buffer[base + k] = even + odd;
                buffer[base + k + len / 2] = even - odd;
                w = w * w_len;
            }
        }
        len <<= 1;
    }
}
