//! The approximate RNS base converter: projects a polynomial in basis `q` into an
//! independent basis `t` without materializing the large CRT-composed integer.

use serde::{Deserialize, Serialize};

use crate::crt::CrtComposer;
use crate::error::RnsError;
use crate::poly_context::{PolyContext, Polynomial};
use crate::scalar::{widening_mul_u64, Wide};

/// Owns both contexts, the `M × L` punctured-product matrix, and an embedded `CrtComposer`
/// over the input context (whose `invPunctured` table is reused for scaling).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RnsBaseConverter {
    composer: CrtComposer,
    ctx_t: PolyContext,
    /// `punctured[j][i] = (∏_{k≠i} q_k) mod t_j`.
    punctured: Vec<Vec<u64>>,
}

impl RnsBaseConverter {
    pub fn new(ctx_q: PolyContext, ctx_t: PolyContext) -> Result<Self, RnsError> {
        if ctx_q.degree() != ctx_t.degree() {
            return Err(RnsError::DegreeMismatch {
                input_degree: ctx_q.degree(),
                output_degree: ctx_t.degree(),
            });
        }

        let l = ctx_q.len();
        let max_q = *ctx_q.moduli().iter().max().unwrap_or(&1);
        let max_t = *ctx_t.moduli().iter().max().unwrap_or(&1);
        let term_bound = (max_q as u128)
            .checked_mul(max_t as u128)
            .ok_or(RnsError::ProductTooWide { modulus_count: l })?;
        (l as u128)
            .checked_mul(term_bound)
            .ok_or(RnsError::ProductTooWide { modulus_count: l })?;

        let composer = CrtComposer::new(ctx_q)?;

        let moduli_q = composer.context().moduli();
        let mut punctured = Vec::with_capacity(ctx_t.len());
        for reducer_j in ctx_t.reducers() {
            let mut row = Vec::with_capacity(l);
            for i in 0..l {
                let mut acc = reducer_j.reduce(1);
                for (k, &qk) in moduli_q.iter().enumerate() {
                    if k == i {
                        continue;
                    }
                    acc = reducer_j.reduce(widening_mul_u64(acc, qk));
                }
                row.push(acc);
            }
            punctured.push(row);
        }

        Ok(Self {
            composer,
            ctx_t,
            punctured,
        })
    }

    pub fn context_in(&self) -> &PolyContext {
        self.composer.context()
    }

    pub fn context_out(&self) -> &PolyContext {
        &self.ctx_t
    }

    /// Delegates to the embedded composer: recovers the exact CRT value in basis `q`.
    pub fn crt_compose<V: Wide>(&self, poly: &Polynomial) -> Result<Vec<V>, RnsError> {
        self.composer.compose_poly(poly)
    }

    /// `poly[i,k] ← (data[i,k] · (q/q_i)^{-1}) mod q_i` for every row `i`, in place.
    pub fn scale_in_place(&self, poly: &mut Polynomial) -> Result<(), RnsError> {
        let l = self.composer.context().len();
        let n = self.composer.context().degree();
        poly.check_shape(l, n)?;

        let inv_punctured = self.composer.inv_punctured();
        for i in 0..l {
            let cm = &inv_punctured[i];
            for x in poly.row_mut(i) {
                *x = cm.apply(*x);
            }
        }
        Ok(())
    }

    /// Assembles the scaled `L × N` polynomial into a fresh `M × N` polynomial over `ctx_t`.
    pub fn assemble_output(&self, scaled: &Polynomial) -> Result<Polynomial, RnsError> {
        let l = self.composer.context().len();
        let n = self.composer.context().degree();
        scaled.check_shape(l, n)?;

        let m = self.ctx_t.len();
        let mut out = Polynomial::zero(m, n);
        for j in 0..m {
            let reducer_j = &self.ctx_t.reducers()[j];
            let row_j = &self.punctured[j];
            for k in 0..n {
                let mut s: u128 = 0;
                for i in 0..l {
                    s = s.wrapping_add((scaled.get(i, k) as u128) * (row_j[i] as u128));
                }
                out.set(j, k, reducer_j.reduce(s));
            }
        }
        Ok(out)
    }

    /// Two-phase conversion: `scale_in_place` on a copy, then `assemble_output`.
    pub fn convert_approximate(&self, poly: &Polynomial) -> Result<Polynomial, RnsError> {
        let mut scaled = poly.clone();
        self.scale_in_place(&mut scaled)?;
        self.assemble_output(&scaled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::testing::biguint_to_u64;
    use num::BigUint;

    fn converter(q: Vec<u64>, t: Vec<u64>, n: usize) -> RnsBaseConverter {
        let ctx_q = PolyContext::new(q, n).unwrap();
        let ctx_t = PolyContext::new(t, n).unwrap();
        RnsBaseConverter::new(ctx_q, ctx_t).unwrap()
    }

    #[test]
    fn approximate_conversion_identity_near_zero() {
        let conv = converter(vec![17, 19], vec![23], 1);
        let poly = Polynomial::from_rows(2, 1, vec![0, 0]).unwrap();
        let out = conv.convert_approximate(&poly).unwrap();
        assert_eq!(out.get(0, 0), 0);
    }

    #[test]
    fn approximate_conversion_bounded_error() {
        let conv = converter(vec![17, 19], vec![23], 1);
        let poly = Polynomial::from_rows(2, 1, vec![3, 5]).unwrap();
        let out = conv.convert_approximate(&poly).unwrap();
        // x = 309 (CRT of 3 mod 17, 5 mod 19); q = 323.
        let candidates = [309u64 % 23, (309 + 323) % 23];
        assert!(candidates.contains(&out.get(0, 0)));
    }

    #[test]
    fn scale_then_assemble_matches_convert_approximate() {
        let conv = converter(vec![17, 19, 23], vec![29, 31], 2);
        let poly = Polynomial::from_rows(3, 2, vec![3, 10, 5, 12, 7, 20]).unwrap();
        let direct = conv.convert_approximate(&poly).unwrap();

        let mut scaled = poly.clone();
        conv.scale_in_place(&mut scaled).unwrap();
        let decomposed = conv.assemble_output(&scaled).unwrap();

        assert_eq!(direct, decomposed);
    }

    #[test]
    fn approximate_conversion_matches_exact_crt_up_to_bounded_multiple_of_q() {
        let q_moduli = vec![97u64, 101, 103];
        let t_moduli = vec![89u64, 83];
        let n = 4;
        let conv = converter(q_moduli.clone(), t_moduli.clone(), n);
        let data = vec![5, 11, 40, 96, 7, 13, 42, 98, 9, 17, 44, 100];
        let poly = Polynomial::from_rows(3, n, data.clone()).unwrap();
        let out = conv.convert_approximate(&poly).unwrap();

        let q: BigUint = q_moduli.iter().map(|&m| BigUint::from(m)).product();
        for k in 0..n {
            let mut x = BigUint::from(0u8);
            for (i, &qi) in q_moduli.iter().enumerate() {
                let qi_big = BigUint::from(qi);
                let residue = BigUint::from(data[i * n + k]);
                let punctured = &q / &qi_big;
                let inv = mod_inverse(&punctured, &qi_big);
                x = (x + residue * punctured * inv) % &q;
            }
            for (j, &tj) in t_moduli.iter().enumerate() {
                let tj_big = BigUint::from(tj);
                let expected_exact = biguint_to_u64(&(&x % &tj_big));
                let got = out.get(j, k);
                let mut matched = false;
                for a in 0u64..3 {
                    let candidate = biguint_to_u64(&((&x + BigUint::from(a) * &q) % &tj_big));
                    if candidate == got {
                        matched = true;
                        break;
                    }
                }
                assert!(
                    matched,
                    "no a in [0,L) reproduces output {got} (exact mod t_j = {expected_exact})"
                );
            }
        }
    }

    fn mod_inverse(a: &BigUint, m: &BigUint) -> BigUint {
        // a is invertible by construction (pairwise-coprime moduli); brute-search is fine
        // at these tiny test moduli.
        let mut x = BigUint::from(1u8);
        while (&x * a) % m != BigUint::from(1u8) {
            x += BigUint::from(1u8);
        }
        x
    }

    /// Sweeps `L = 8` input moduli and `N` up to 64, checking the `a_x ∈ [0, L)` bound from
    /// the same independent CRT reconstruction as
    /// `approximate_conversion_matches_exact_crt_up_to_bounded_multiple_of_q`, just at a
    /// larger scale than that scenario's hand-picked three moduli.
    #[test]
    fn approximate_conversion_bound_holds_for_eight_moduli_and_larger_degrees() {
        use rand::Rng;

        let q_moduli = vec![101u64, 103, 107, 109, 113, 127, 131, 137];
        let t_moduli = vec![139u64, 149];
        let l = q_moduli.len();
        let mut rng = rand::thread_rng();

        for &n in &[1usize, 4, 64] {
            let conv = converter(q_moduli.clone(), t_moduli.clone(), n);
            let mut data = vec![0u64; l * n];
            for (i, &qi) in q_moduli.iter().enumerate() {
                for k in 0..n {
                    data[i * n + k] = rng.gen_range(0..qi);
                }
            }
            let poly = Polynomial::from_rows(l, n, data.clone()).unwrap();
            let out = conv.convert_approximate(&poly).unwrap();

            let q: BigUint = q_moduli.iter().map(|&m| BigUint::from(m)).product();
            for k in 0..n {
                let mut x = BigUint::from(0u8);
                for (i, &qi) in q_moduli.iter().enumerate() {
                    let qi_big = BigUint::from(qi);
                    let residue = BigUint::from(data[i * n + k]);
                    let punctured = &q / &qi_big;
                    let inv = mod_inverse(&punctured, &qi_big);
                    x = (x + residue * punctured * inv) % &q;
                }
                for &tj in &t_moduli {
                    let tj_big = BigUint::from(tj);
                    let got = out.get(t_moduli.iter().position(|&v| v == tj).unwrap(), k);
                    let matched = (0u64..l as u64)
                        .any(|a| biguint_to_u64(&((&x + BigUint::from(a) * &q) % &tj_big)) == got);
                    assert!(matched, "no a in [0,L) reproduces output {got} for modulus {tj}");
                }
            }
        }
    }

    #[test]
    fn degree_mismatch_is_reported() {
        let ctx_q = PolyContext::new(vec![17, 19], 4).unwrap();
        let ctx_t = PolyContext::new(vec![23], 2).unwrap();
        assert!(matches!(
            RnsBaseConverter::new(ctx_q, ctx_t),
            Err(RnsError::DegreeMismatch { .. })
        ));
    }
}
