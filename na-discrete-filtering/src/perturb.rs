//! Perturbed observations for the stochastic ensemble update.

use nd::{ArrayView, ArrayViewMut, Axis, Ix1, Ix2};
use nd::linalg::general_mat_mul;
use rand::Rng;

use crate::utils::make_2d_randn;

pub trait PerturbObservations {
  /// Destination for the perturbed observations, `(m, Ne)`.
  fn perturbed_observations_view_mut(&mut self) -> ArrayViewMut<f64, Ix2>;

  /// Sets column `e` to `observation + sqrt_cov · z_e` with `z_e` standard
  /// normal. Draws one `(m, Ne)` block from `rand`.
  fn perturb_observations<R>(&mut self,
                             observation: ArrayView<f64, Ix1>,
                             sqrt_cov: ArrayView<f64, Ix2>,
                             rand: &mut R)
    where R: Rng + ?Sized,
  {
    let mut d = self.perturbed_observations_view_mut();
    let z = make_2d_randn(d.dim(), rand);
    general_mat_mul(1.0, &sqrt_cov, &z, 0.0, &mut d);
    d += &observation.insert_axis(Axis(1));
  }
}
