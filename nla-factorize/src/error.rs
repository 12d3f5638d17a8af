/// Failures of the dense factorizations in this crate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FactorizeError {
  /// The input matrix has a different number of rows and columns.
  #[error("matrix is not square ({rows}x{cols})")]
  NotSquare { rows: usize, cols: usize },

  /// A diagonal pivot of the Cholesky factorization was not positive.
  #[error("matrix is not positive definite (pivot {pivot} is {value})")]
  NotPositiveDefinite { pivot: usize, value: f64 },

  /// LU elimination found no usable pivot in column `pivot`.
  #[error("matrix is singular to working precision (column {pivot})")]
  Singular { pivot: usize },

  /// A right-hand side does not match the factorized system.
  #[error("right-hand side has {found} rows, system has {expected}")]
  DimensionMismatch { expected: usize, found: usize },
}
