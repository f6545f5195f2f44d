//! The scalar kernel: fixed-width unsigned integer types `W₁ = u64` up through
//! `W₃₂ = U2048`, each a power-of-two multiple of the last, with widening multiplication
//! between adjacent widths and the `Wide` trait used by the CRT composer's caller-chosen
//! accumulator type.

use crate::error::RnsError;

/// Schoolbook widening multiply: `a * b` where both operands have `N` limbs, producing a
/// `2N`-limb result. Limbs are little-endian (`limbs[0]` is least significant).
fn widen_mul_limbs<const N: usize, const M: usize>(a: &[u64; N], b: &[u64; N]) -> [u64; M] {
    debug_assert_eq!(M, 2 * N);
    let mut result = [0u64; M];
    for i in 0..N {
        let mut carry: u128 = 0;
        for j in 0..N {
            let idx = i + j;
            let prod = (a[i] as u128) * (b[j] as u128) + (result[idx] as u128) + carry;
            result[idx] = prod as u64;
            carry = prod >> 64;
        }
        let mut k = i + N;
        while carry != 0 {
            let sum = (result[k] as u128) + carry;
            result[k] = sum as u64;
            carry = sum >> 64;
            k += 1;
        }
    }
    result
}

/// `u128 × u128 → 256-bit` widening multiply, exposed for the Barrett reducer which needs
/// the top 128 bits of `x * mu`.
pub(crate) fn widen_mul_limbs_u128(a: &[u64; 2], b: &[u64; 2]) -> [u64; 4] {
    widen_mul_limbs::<2, 4>(a, b)
}

fn wrapping_add_limbs<const N: usize>(a: &[u64; N], b: &[u64; N]) -> [u64; N] {
    let mut out = [0u64; N];
    let mut carry = 0u64;
    for i in 0..N {
        let (s1, c1) = a[i].overflowing_add(b[i]);
        let (s2, c2) = s1.overflowing_add(carry);
        out[i] = s2;
        carry = (c1 as u64) + (c2 as u64);
    }
    out
}

fn wrapping_sub_limbs<const N: usize>(a: &[u64; N], b: &[u64; N]) -> [u64; N] {
    let mut out = [0u64; N];
    let mut borrow = 0u64;
    for i in 0..N {
        let (d1, b1) = a[i].overflowing_sub(b[i]);
        let (d2, b2) = d1.overflowing_sub(borrow);
        out[i] = d2;
        borrow = (b1 as u64) + (b2 as u64);
    }
    out
}

fn cmp_limbs<const N: usize>(a: &[u64; N], b: &[u64; N]) -> core::cmp::Ordering {
    for i in (0..N).rev() {
        match a[i].cmp(&b[i]) {
            core::cmp::Ordering::Equal => continue,
            other => return other,
        }
    }
    core::cmp::Ordering::Equal
}

fn sub_borrow_limbs<const N: usize>(a: &[u64; N], b: &[u64; N]) -> ([u64; N], bool) {
    let mut out = [0u64; N];
    let mut borrow = 0u64;
    for i in 0..N {
        let (d1, b1) = a[i].overflowing_sub(b[i]);
        let (d2, b2) = d1.overflowing_sub(borrow);
        out[i] = d2;
        borrow = (b1 as u64) + (b2 as u64);
    }
    (out, borrow != 0)
}

/// `r - m` if `r >= m`, else `r` unchanged — branchless: no control flow depends on the
/// comparison, only the wrapping arithmetic does. Mirrors `modmath::conditional_sub_u64`
/// and `reducer::conditional_sub_u128`, generalized to an `N`-limb value.
fn conditional_sub_limbs<const N: usize>(r: &[u64; N], m: &[u64; N]) -> [u64; N] {
    let (diff, borrow) = sub_borrow_limbs(r, m);
    let mask = (borrow as u64).wrapping_neg();
    let mut masked_m = [0u64; N];
    for i in 0..N {
        masked_m[i] = mask & m[i];
    }
    wrapping_add_limbs(&diff, &masked_m)
}

/// Multiplies a `N`-limb value by a `u64` scalar, returning the low `N` limbs and the
/// overflow limb (non-zero iff the true product did not fit in `N` limbs).
fn mul_u64_limbs<const N: usize>(a: &[u64; N], scalar: u64) -> ([u64; N], u64) {
    let mut out = [0u64; N];
    let mut carry: u128 = 0;
    for i in 0..N {
        let prod = (a[i] as u128) * (scalar as u128) + carry;
        out[i] = prod as u64;
        carry = prod >> 64;
    }
    (out, carry as u64)
}

/// Divides a `N`-limb value by a `u64` divisor, returning the quotient. Panics in debug
/// builds if the division is inexact; callers only ever divide `q` by a modulus that
/// divides it, so the remainder is always zero.
fn div_u64_limbs<const N: usize>(a: &[u64; N], divisor: u64) -> [u64; N] {
    debug_assert!(divisor != 0);
    let mut out = [0u64; N];
    let mut rem: u128 = 0;
    for i in (0..N).rev() {
        let cur = (rem << 64) | (a[i] as u128);
        out[i] = (cur / divisor as u128) as u64;
        rem = cur % divisor as u128;
    }
    debug_assert_eq!(rem, 0, "div_u64_limbs: inexact division");
    out
}

macro_rules! wide_uint {
    ($name:ident, $limbs:literal, $double:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub [u64; $limbs]);

        impl $name {
            pub const ZERO: Self = Self([0u64; $limbs]);
            pub const MAX: Self = Self([u64::MAX; $limbs]);

            pub fn from_u64(v: u64) -> Self {
                let mut limbs = [0u64; $limbs];
                limbs[0] = v;
                Self(limbs)
            }

            pub fn wrapping_add(self, other: Self) -> Self {
                Self(wrapping_add_limbs(&self.0, &other.0))
            }

            pub fn wrapping_sub(self, other: Self) -> Self {
                Self(wrapping_sub_limbs(&self.0, &other.0))
            }

            pub fn wrapping_mul(self, other: Self) -> Self {
                let wide = widen_mul_limbs::<$limbs, { $limbs * 2 }>(&self.0, &other.0);
                let mut low = [0u64; $limbs];
                low.copy_from_slice(&wide[..$limbs]);
                Self(low)
            }

            pub fn checked_mul_u64(self, scalar: u64) -> Option<Self> {
                let (low, overflow) = mul_u64_limbs(&self.0, scalar);
                if overflow != 0 {
                    None
                } else {
                    Some(Self(low))
                }
            }

            pub fn div_u64(self, divisor: u64) -> Self {
                Self(div_u64_limbs(&self.0, divisor))
            }

            /// `self - modulus` if `self >= modulus`, else `self`. Branchless in `self`.
            pub fn conditional_sub(self, modulus: Self) -> Self {
                Self(conditional_sub_limbs(&self.0, &modulus.0))
            }

            /// Widening multiply into the next tower width.
            pub fn widening_mul(self, other: Self) -> $double {
                $double(widen_mul_limbs::<$limbs, { $limbs * 2 }>(&self.0, &other.0))
            }
        }

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> core::cmp::Ordering {
                cmp_limbs(&self.0, &other.0)
            }
        }
    };
}

wide_uint!(U512, 8, U1024);
wide_uint!(U1024, 16, U2048);
wide_uint!(U2048, 32, U4096Unused);

// `U256`'s double width is `U512`, already defined above; declare it separately so the
// macro's `$double` parameter always names a real type.
#[derive(Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct U256(pub [u64; 4]);

impl U256 {
    pub const ZERO: Self = Self([0u64; 4]);
    pub const MAX: Self = Self([u64::MAX; 4]);

    pub fn from_u64(v: u64) -> Self {
        let mut limbs = [0u64; 4];
        limbs[0] = v;
        Self(limbs)
    }

    pub fn wrapping_add(self, other: Self) -> Self {
        Self(wrapping_add_limbs(&self.0, &other.0))
    }

    pub fn wrapping_sub(self, other: Self) -> Self {
        Self(wrapping_sub_limbs(&self.0, &other.0))
    }

    pub fn wrapping_mul(self, other: Self) -> Self {
        let wide = widen_mul_limbs::<4, 8>(&self.0, &other.0);
        let mut low = [0u64; 4];
        low.copy_from_slice(&wide[..4]);
        Self(low)
    }

    pub fn checked_mul_u64(self, scalar: u64) -> Option<Self> {
        let (low, overflow) = mul_u64_limbs(&self.0, scalar);
        if overflow != 0 {
            None
        } else {
            Some(Self(low))
        }
    }

    pub fn div_u64(self, divisor: u64) -> Self {
        Self(div_u64_limbs(&self.0, divisor))
    }

    pub fn conditional_sub(self, modulus: Self) -> Self {
        Self(conditional_sub_limbs(&self.0, &modulus.0))
    }

    pub fn widening_mul(self, other: Self) -> U512 {
        U512(widen_mul_limbs::<4, 8>(&self.0, &other.0))
    }
}

impl PartialOrd for U256 {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for U256 {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        cmp_limbs(&self.0, &other.0)
    }
}

// `U2048` is the top of the tower: it has no wider type to widen into. The macro above
// pointed its `widening_mul` at a placeholder type (`U4096Unused`) that is never
// constructed or named outside this module; `U2048` never calls `widening_mul` in practice
// because `Wide::IS_TOP_OF_TOWER` routes callers to `ProductTooWide` before they would.
#[allow(dead_code)]
struct U4096Unused([u64; 64]);

/// Shared interface for the six concrete widths used as the CRT composer's caller-chosen
/// accumulator type `V`. Implemented once per width instead of falling back to a single
/// arbitrary-precision type, so the width actually used is fixed at the call site.
pub trait Wide: Copy + Eq + Ord {
    const ZERO: Self;
    const MAX: Self;

    /// `true` only for the widest tower type (`U2048`): there is no wider type to retry
    /// with, so overflow building `q` in this type means the moduli set itself is too
    /// large, not merely that the caller picked too narrow a `V`.
    const IS_TOP_OF_TOWER: bool = false;

    fn from_u64(v: u64) -> Self;
    fn wrapping_add(self, other: Self) -> Self;
    fn wrapping_sub(self, other: Self) -> Self;
    fn wrapping_mul(self, other: Self) -> Self;
    fn checked_mul_u64(self, scalar: u64) -> Option<Self>;
    fn div_u64(self, divisor: u64) -> Self;

    /// `self - modulus` if `self >= modulus`, else `self` unchanged. Implementations must be
    /// branchless in `self` (no control flow keyed on the comparison), since callers apply
    /// this to values derived from secret residues.
    fn conditional_sub(self, modulus: Self) -> Self;
}

macro_rules! impl_wide {
    ($t:ty, $is_top:expr) => {
        impl Wide for $t {
            const ZERO: Self = <$t>::ZERO;
            const MAX: Self = <$t>::MAX;
            const IS_TOP_OF_TOWER: bool = $is_top;

            fn from_u64(v: u64) -> Self {
                <$t>::from_u64(v)
            }
            fn wrapping_add(self, other: Self) -> Self {
                <$t>::wrapping_add(self, other)
            }
            fn wrapping_sub(self, other: Self) -> Self {
                <$t>::wrapping_sub(self, other)
            }
            fn wrapping_mul(self, other: Self) -> Self {
                <$t>::wrapping_mul(self, other)
            }
            fn checked_mul_u64(self, scalar: u64) -> Option<Self> {
                <$t>::checked_mul_u64(self, scalar)
            }
            fn div_u64(self, divisor: u64) -> Self {
                <$t>::div_u64(self, divisor)
            }
            fn conditional_sub(self, modulus: Self) -> Self {
                <$t>::conditional_sub(self, modulus)
            }
        }
    };
}

impl Wide for u64 {
    const ZERO: Self = 0;
    const MAX: Self = u64::MAX;

    fn from_u64(v: u64) -> Self {
        v
    }
    fn wrapping_add(self, other: Self) -> Self {
        u64::wrapping_add(self, other)
    }
    fn wrapping_sub(self, other: Self) -> Self {
        u64::wrapping_sub(self, other)
    }
    fn wrapping_mul(self, other: Self) -> Self {
        u64::wrapping_mul(self, other)
    }
    fn checked_mul_u64(self, scalar: u64) -> Option<Self> {
        self.checked_mul(scalar)
    }
    fn div_u64(self, divisor: u64) -> Self {
        self / divisor
    }
    fn conditional_sub(self, modulus: Self) -> Self {
        let (diff, borrow) = self.overflowing_sub(modulus);
        let mask = (borrow as u64).wrapping_neg();
        diff.wrapping_add(mask & modulus)
    }
}

impl Wide for u128 {
    const ZERO: Self = 0;
    const MAX: Self = u128::MAX;

    fn from_u64(v: u64) -> Self {
        v as u128
    }
    fn wrapping_add(self, other: Self) -> Self {
        u128::wrapping_add(self, other)
    }
    fn wrapping_sub(self, other: Self) -> Self {
        u128::wrapping_sub(self, other)
    }
    fn wrapping_mul(self, other: Self) -> Self {
        u128::wrapping_mul(self, other)
    }
    fn checked_mul_u64(self, scalar: u64) -> Option<Self> {
        self.checked_mul(scalar as u128)
    }
    fn div_u64(self, divisor: u64) -> Self {
        self / (divisor as u128)
    }
    fn conditional_sub(self, modulus: Self) -> Self {
        let (diff, borrow) = self.overflowing_sub(modulus);
        let mask = (borrow as u128).wrapping_neg();
        diff.wrapping_add(mask & modulus)
    }
}

impl_wide!(U256, false);
impl_wide!(U512, false);
impl_wide!(U1024, false);
impl_wide!(U2048, true);

static_assertions::const_assert_eq!(core::mem::size_of::<U256>(), 2 * core::mem::size_of::<u128>());
static_assertions::const_assert_eq!(core::mem::size_of::<U512>(), 2 * core::mem::size_of::<U256>());
static_assertions::const_assert_eq!(core::mem::size_of::<U1024>(), 2 * core::mem::size_of::<U512>());
static_assertions::const_assert_eq!(core::mem::size_of::<U2048>(), 2 * core::mem::size_of::<U1024>());

/// Native `u64 × u64 → u128` widening multiply, used throughout the reducer and punctured
/// product construction. Kept separate from the tower macro since `u128` is a primitive
/// type with a native widening multiply, not a limb array.
#[inline(always)]
pub fn widening_mul_u64(a: u64, b: u64) -> u128 {
    (a as u128) * (b as u128)
}

/// Computes `∏ moduli` in the caller-chosen width `V`, returning `None` on overflow (the
/// caller turns that into `WidthTooSmall` or `ProductTooWide` depending on `V::IS_TOP_OF_TOWER`).
pub fn wide_product<V: Wide>(moduli: &[u64]) -> Option<V> {
    let mut acc = V::from_u64(1);
    for &m in moduli {
        acc = acc.checked_mul_u64(m)?;
    }
    Some(acc)
}

pub(crate) fn wide_product_or_err<V: Wide>(moduli: &[u64]) -> Result<V, RnsError> {
    wide_product::<V>(moduli).ok_or(if V::IS_TOP_OF_TOWER {
        RnsError::ProductTooWide {
            modulus_count: moduli.len(),
        }
    } else {
        RnsError::WidthTooSmall {
            modulus_count: moduli.len(),
        }
    })
}
