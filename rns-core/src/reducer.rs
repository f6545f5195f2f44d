//! Barrett-style modular reducer: reduces any `W₂` (`u128`) value to `[0, m)` for a fixed
//! modulus `m < 2^63`, in constant time.

use serde::{Deserialize, Serialize};

use crate::error::RnsError;
use crate::scalar::U256;

#[inline(always)]
fn conditional_sub_u128(r: u128, m: u128) -> u128 {
    let (diff, borrow) = r.overflowing_sub(m);
    let mask = (borrow as u128).wrapping_neg();
    diff.wrapping_add(mask & m)
}

/// A modulus paired with its precomputed Barrett reciprocal `⌊2^128 / m⌋`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reducer {
    modulus: u64,
    mu: u128,
}

impl Reducer {
    /// `m` must satisfy `0 < m < 2^63` so that `2m` fits in a `u64` (required for
    /// `addMod`/`ConstMulMod` downstream).
    pub fn new(m: u64) -> Result<Self, RnsError> {
        if m == 0 || m >= (1u64 << 63) {
            return Err(RnsError::ModulusOutOfRange { modulus: m });
        }
        let m128 = m as u128;
        let q = u128::MAX / m128;
        let r = u128::MAX % m128;
        let mu = if r == m128 - 1 { q + 1 } else { q };
        Ok(Self { modulus: m, mu })
    }

    #[inline(always)]
    pub fn modulus(&self) -> u64 {
        self.modulus
    }

    /// Reduces `x` to `[0, m)`. Constant time in `x`; `self.modulus`/`self.mu` are public.
    #[inline(always)]
    pub fn reduce(&self, x: u128) -> u64 {
        let m = self.modulus as u128;

        // q_est ≈ floor(x / m), computed as the top 128 bits of the 256-bit product x * mu.
        let x_limbs = [x as u64, (x >> 64) as u64];
        let mu_limbs = [self.mu as u64, (self.mu >> 64) as u64];
        let prod = U256(crate::scalar::widen_mul_limbs_u128(&x_limbs, &mu_limbs));
        let q_est = ((prod.0[3] as u128) << 64) | (prod.0[2] as u128);

        let mut r = x.wrapping_sub(q_est.wrapping_mul(m));
        r = conditional_sub_u128(r, m);
        r = conditional_sub_u128(r, m);
        rns_util::assume(r < m);
        r as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduce_small_values_is_identity() {
        let r = Reducer::new(17).unwrap();
        assert_eq!(r.reduce(0), 0);
        assert_eq!(r.reduce(16), 16);
    }

    #[test]
    fn reduce_matches_native_mod() {
        let m = 1_000_000_007u64;
        let r = Reducer::new(m).unwrap();
        for x in [0u128, 1, m as u128, (m as u128) * 3 + 5, u128::MAX, 1u128 << 100] {
            assert_eq!(r.reduce(x), (x % m as u128) as u64);
        }
    }

    #[test]
    fn reduce_is_idempotent() {
        let r = Reducer::new(998_244_353).unwrap();
        let x = (1u128 << 127) + 12345;
        let once = r.reduce(x);
        let twice = r.reduce(once as u128);
        assert_eq!(once, twice);
        assert!(once < r.modulus());
    }

    #[test]
    fn rejects_modulus_out_of_range() {
        assert!(matches!(
            Reducer::new(0),
            Err(RnsError::ModulusOutOfRange { modulus: 0 })
        ));
        assert!(matches!(
            Reducer::new(1u64 << 63),
            Err(RnsError::ModulusOutOfRange { .. })
        ));
    }
}
