/// Why an integration could not produce the requested trajectory.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntegrationError {
  #[error("output grid is empty")]
  EmptyGrid,

  #[error("output grid is not strictly increasing at index {index}")]
  GridNotIncreasing { index: usize },

  #[error("output buffer is {found:?}, expected {expected:?}")]
  DimensionMismatch {
    expected: (usize, usize),
    found: (usize, usize),
  },

  /// The controller shrank the step below what `x` can resolve without
  /// meeting the tolerance.
  #[error("step size {h:e} underflowed at x = {x}")]
  StepSizeUnderflow { x: f64, h: f64 },

  #[error("solution became non-finite at x = {x}")]
  NonFinite { x: f64 },

  #[error("exceeded {max} steps at x = {x}")]
  TooManySteps { max: u64, x: f64 },
}
