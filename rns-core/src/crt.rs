//! The CRT composer: recovers an integer `x ∈ [0, q)` from its RNS residues.

use serde::{Deserialize, Serialize};

use crate::const_mul::ConstMulMod;
use crate::error::RnsError;
use crate::modmath::inv_mod;
use crate::poly_context::{PolyContext, Polynomial};
use crate::scalar::{wide_product_or_err, widening_mul_u64, Wide};

/// Holds a `PolyContext` and, per modulus `q_i`, `ConstMulMod(((q/q_i)^{-1}) mod q_i, q_i)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrtComposer {
    ctx: PolyContext,
    inv_punctured: Vec<ConstMulMod>,
}

impl CrtComposer {
    /// Fails with `NotInvertible` if the supplied moduli are not pairwise coprime.
    pub fn new(ctx: PolyContext) -> Result<Self, RnsError> {
        let l = ctx.len();
        let moduli = ctx.moduli();
        let reducers = ctx.reducers();
        let mut inv_punctured = Vec::with_capacity(l);

        for i in 0..l {
            let qi = moduli[i];
            let mut p = reducers[i].reduce(1);
            for (j, &qj) in moduli.iter().enumerate() {
                if j == i {
                    continue;
                }
                p = reducers[i].reduce(widening_mul_u64(p, qj));
            }
            let p_inv = inv_mod(p, qi)?;
            inv_punctured.push(ConstMulMod::new(p_inv, qi)?);
        }

        Ok(Self { ctx, inv_punctured })
    }

    pub fn context(&self) -> &PolyContext {
        &self.ctx
    }

    /// Shared with `RnsBaseConverter`, which reuses these for its scaling step.
    pub fn inv_punctured(&self) -> &[ConstMulMod] {
        &self.inv_punctured
    }

    /// `L=1` returns `q_0`; otherwise returns `2q`. Bounds the widest value `compose` will
    /// produce, so callers can pick `V` wide enough.
    pub fn compose_max_intermediate_value<V: Wide>(moduli: &[u64]) -> Result<V, RnsError> {
        if moduli.len() == 1 {
            return Ok(V::from_u64(moduli[0]));
        }
        let q: V = wide_product_or_err(moduli)?;
        q.checked_mul_u64(2).ok_or_else(too_wide_error::<V>(moduli.len()))
    }

    /// `data` is an `L × N` row-major residue matrix. Fails with `WidthTooSmall` or
    /// `ProductTooWide` (depending on `V::IS_TOP_OF_TOWER`) unless `V` is wide enough for
    /// `compose_max_intermediate_value`, i.e. `2q` for `L > 1` and `q` for `L == 1`.
    pub fn compose<V: Wide>(&self, data: &[u64], rows: usize, cols: usize) -> Result<Vec<V>, RnsError> {
        let l = self.ctx.len();
        if rows != l || data.len() != rows * cols {
            return Err(RnsError::ShapeMismatch {
                expected_rows: l,
                expected_cols: cols,
                got_rows: rows,
                got_cols: cols,
            });
        }

        let moduli = self.ctx.moduli();
        let q: V = wide_product_or_err(moduli)?;
        if moduli.len() > 1 {
            q.checked_mul_u64(2).ok_or_else(too_wide_error::<V>(moduli.len()))?;
        }
        let punctured: Vec<V> = moduli.iter().map(|&qi| q.div_u64(qi)).collect();

        let mut result = vec![V::ZERO; cols];
        for k in 0..cols {
            let mut acc = V::ZERO;
            for i in 0..rows {
                let r_ik = self.inv_punctured[i].apply(data[i * cols + k]);
                let term = V::from_u64(r_ik).wrapping_mul(punctured[i]);
                acc = add_mod_wide(acc, term, q);
            }
            result[k] = acc;
        }
        Ok(result)
    }

    pub fn compose_poly<V: Wide>(&self, poly: &Polynomial) -> Result<Vec<V>, RnsError> {
        let (rows, cols) = poly.shape();
        self.compose(poly.as_slice(), rows, cols)
    }
}

fn too_wide_error<V: Wide>(modulus_count: usize) -> impl FnOnce() -> RnsError {
    move || {
        if V::IS_TOP_OF_TOWER {
            RnsError::ProductTooWide { modulus_count }
        } else {
            RnsError::WidthTooSmall { modulus_count }
        }
    }
}

/// `(a + b) mod m` for the wide accumulator, where `a` and `b` are derived from secret
/// residues via `invPunctured[i].apply`. Constant time in `a` and `b`, same as
/// `modmath::add_mod`: `conditional_sub` performs the correction with a wrapping mask
/// instead of branching on the comparison.
fn add_mod_wide<V: Wide>(a: V, b: V, m: V) -> V {
    let s = a.wrapping_add(b);
    s.conditional_sub(m)
}
