//! Free-standing modular arithmetic: modular inverse (variable time, public moduli only)
//! and modular addition (constant time in the residue values).

use crate::error::RnsError;

#[inline(always)]
fn conditional_sub_u64(r: u64, m: u64) -> u64 {
    let (diff, borrow) = r.overflowing_sub(m);
    let mask = (borrow as u64).wrapping_neg();
    diff.wrapping_add(mask & m)
}

/// `(a + b) mod m` for `a, b ∈ [0, m)`. Constant time in `a` and `b`; `m` is public.
#[inline(always)]
pub fn add_mod(a: u64, b: u64, m: u64) -> u64 {
    let s = a.wrapping_add(b);
    conditional_sub_u64(s, m)
}

/// Extended-Euclidean modular inverse. Runs in variable time and is only ever called on
/// public moduli (construction-time punctured products), never on secret residues.
/// Fails with `NotInvertible` if `gcd(a, m) != 1`.
pub fn inv_mod(a: u64, m: u64) -> Result<u64, RnsError> {
    if m <= 1 {
        return Err(RnsError::NotInvertible { modulus: m });
    }
    let (mut old_r, mut r) = (a as i128 % m as i128, m as i128);
    let (mut old_s, mut s) = (1i128, 0i128);

    while r != 0 {
        let quotient = old_r / r;
        let (new_r, new_s) = (old_r - quotient * r, old_s - quotient * s);
        old_r = r;
        r = new_r;
        old_s = s;
        s = new_s;
    }

    if old_r != 1 && old_r != -1 {
        return Err(RnsError::NotInvertible { modulus: m });
    }

    let inv = old_s.rem_euclid(m as i128);
    Ok(inv as u64)
}
