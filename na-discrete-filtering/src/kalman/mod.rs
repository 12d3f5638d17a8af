
use nd::{ArrayView, Ix1, Ix2};

use crate::error::{Error, Result};
use crate::utils::check_shape;

pub mod enkf;
pub mod kf;

/// Prior and observation statistics shared by the ensemble filters.
#[derive(Debug, Clone, Copy)]
pub struct EnsembleInit<'a> {
  /// `x0`; the ensemble is drawn around this.
  pub initial_mean: ArrayView<'a, f64, Ix1>,
  /// `P0`, symmetric positive definite.
  pub initial_covariance: ArrayView<'a, f64, Ix2>,
  /// `H`, `(m, n)`.
  pub observation_operator: ArrayView<'a, f64, Ix2>,
  /// `R`, `(m, m)` symmetric positive definite.
  pub observation_covariance: ArrayView<'a, f64, Ix2>,
  pub ensemble_count: usize,
}

impl<'a> EnsembleInit<'a> {
  pub fn state_dim(&self) -> usize { self.initial_mean.len() }
  pub fn observation_dim(&self) -> usize { self.observation_operator.nrows() }

  /// Checks the member count and that every shape agrees with `x0` and `H`.
  pub fn validate(&self) -> Result<()> {
    if self.ensemble_count < 2 {
      return Err(Error::TooFewMembers { count: self.ensemble_count });
    }

    let n = self.state_dim();
    let m = self.observation_dim();
    check_shape("initial covariance", self.initial_covariance.shape(), &[n, n])?;
    check_shape("observation operator", self.observation_operator.shape(), &[m, n])?;
    check_shape("observation covariance", self.observation_covariance.shape(), &[m, m])?;
    Ok(())
  }
}
