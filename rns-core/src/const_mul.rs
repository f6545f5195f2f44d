//! A constant multiplicand `c` bound to a modulus `m`: applying it to any `x ∈ [0, m)`
//! returns `(c·x) mod m` in constant time.

use serde::{Deserialize, Serialize};

use crate::error::RnsError;
use crate::reducer::Reducer;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstMulMod {
    c: u64,
    reducer: Reducer,
}

impl ConstMulMod {
    pub fn new(c: u64, m: u64) -> Result<Self, RnsError> {
        let reducer = Reducer::new(m)?;
        Ok(Self {
            c: reducer.reduce(c as u128),
            reducer,
        })
    }

    #[inline(always)]
    pub fn modulus(&self) -> u64 {
        self.reducer.modulus()
    }

    #[inline(always)]
    pub fn constant(&self) -> u64 {
        self.c
    }

    /// `x ∈ [0, m)` ⇒ `(c·x) mod m`, constant time in `x`.
    #[inline(always)]
    pub fn apply(&self, x: u64) -> u64 {
        self.reducer.reduce((self.c as u128) * (x as u128))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_matches_native_mod() {
        let m = 1_000_000_007u64;
        let cm = ConstMulMod::new(12345, m).unwrap();
        for x in [0u64, 1, 42, m - 1] {
            assert_eq!(cm.apply(x), (12345u128 * x as u128 % m as u128) as u64);
        }
    }

    #[test]
    fn reduces_constant_at_construction() {
        let m = 17u64;
        let cm = ConstMulMod::new(50, m).unwrap();
        assert_eq!(cm.constant(), 50 % 17);
    }
}
