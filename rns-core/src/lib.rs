//! Residue Number System arithmetic core for ring-LWE homomorphic encryption: the
//! Chinese-Remainder-Theorem composer and the approximate RNS base converter, plus the
//! modular-arithmetic kernel both sit on.
//!
//! The core is synchronous, free of internal locking, and touches no files or sockets; its
//! boundary is the typed API below, consumed by the enclosing scheme (key generation,
//! encryption, NTT) which lives outside this crate.

pub mod const_mul;
pub mod crt;
pub mod converter;
pub mod error;
pub mod modmath;
pub mod poly_context;
pub mod reducer;
pub mod scalar;

pub use const_mul::ConstMulMod;
pub use converter::RnsBaseConverter;
pub use crt::CrtComposer;
pub use error::RnsError;
pub use modmath::{add_mod, inv_mod};
pub use poly_context::{PolyContext, Polynomial};
pub use reducer::Reducer;
pub use scalar::{Wide, U1024, U2048, U256, U512};
