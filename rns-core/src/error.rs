//! Typed errors surfaced by the RNS core. Every variant is raised synchronously at
//! construction time or at the start of a hot-path call, before any residue data is
//! touched; nothing here is retried or logged by the core itself.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RnsError {
    /// A polynomial's shape (row count, column count) does not match the context it was
    /// presented against.
    #[error("shape mismatch: expected {expected_rows}x{expected_cols}, got {got_rows}x{got_cols}")]
    ShapeMismatch {
        expected_rows: usize,
        expected_cols: usize,
        got_rows: usize,
        got_cols: usize,
    },

    /// The caller-chosen accumulator type `V` is not wide enough for `composeMaxIntermediateValue`;
    /// picking a wider tower type may resolve this.
    #[error("accumulator type too narrow for {modulus_count} moduli")]
    WidthTooSmall { modulus_count: usize },

    /// Even the widest tower type (`U2048`) cannot hold the product of the supplied moduli.
    #[error("product of {modulus_count} moduli exceeds the widest available accumulator type")]
    ProductTooWide { modulus_count: usize },

    /// A punctured product has no inverse modulo its own modulus, i.e. the supplied moduli
    /// are not pairwise coprime.
    #[error("modulus {modulus} is not coprime with the remaining moduli")]
    NotInvertible { modulus: u64 },

    /// A supplied modulus is zero or does not fit in `W₁ - 1` bits.
    #[error("modulus {modulus} is out of range (must be in [2, 2^63))")]
    ModulusOutOfRange { modulus: u64 },

    /// The input and output contexts of a base converter have different polynomial degrees.
    #[error("degree mismatch: input context has degree {input_degree}, output context has degree {output_degree}")]
    DegreeMismatch {
        input_degree: usize,
        output_degree: usize,
    },
}
