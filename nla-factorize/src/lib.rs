//! Dense factorizations over `ndarray` matrices.
//!
//! Only what the filters need: a Cholesky factor for drawing correlated
//! Gaussian samples and a pivoted LU for solving the innovation system.

extern crate ndarray as nd;

pub use cholesky::*;
pub use error::FactorizeError;
pub use lu::*;

pub mod cholesky;
pub mod error;
pub mod lu;
