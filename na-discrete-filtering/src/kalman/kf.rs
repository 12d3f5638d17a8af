//! The plain linear Kalman filter for `x_{k+1} = M x_k`,
//! `y_k = H x_k + v_k`, `v_k ~ N(0, R)`.
//!
//! Mostly useful as a reference: with a linear model the ensemble filters
//! converge to this as the ensemble grows.

use nd::{Array, ArrayView, Axis, Ix1, Ix2, Ix3};
use nd::linalg::general_mat_mul;
use nla::LuFactorize;

use crate::Observer;
use crate::error::{Error, Result};
use crate::utils::check_shape;

#[derive(Debug, Clone, Copy)]
pub struct Init<'a> {
  pub initial_mean: ArrayView<'a, f64, Ix1>,
  pub initial_covariance: ArrayView<'a, f64, Ix2>,
  /// M
  pub transition: ArrayView<'a, f64, Ix2>,
  pub observation_operator: ArrayView<'a, f64, Ix2>,
  pub observation_covariance: ArrayView<'a, f64, Ix2>,
}

#[derive(Debug)]
pub struct Filter<'a> {
  transition: ArrayView<'a, f64, Ix2>,
  observation_operator: ArrayView<'a, f64, Ix2>,
  observation_covariance: ArrayView<'a, f64, Ix2>,

  mean: Array<f64, Ix1>,
  covariance: Array<f64, Ix2>,
}

impl<'a> Filter<'a> {
  pub fn new(i: Init<'a>) -> Result<Filter<'a>> {
    let n = i.initial_mean.len();
    let m = i.observation_operator.nrows();
    check_shape("initial covariance", i.initial_covariance.shape(), &[n, n])?;
    check_shape("transition", i.transition.shape(), &[n, n])?;
    check_shape("observation operator", i.observation_operator.shape(), &[m, n])?;
    check_shape("observation covariance", i.observation_covariance.shape(), &[m, m])?;

    Ok(Filter {
      transition: i.transition,
      observation_operator: i.observation_operator,
      observation_covariance: i.observation_covariance,
      mean: i.initial_mean.to_owned(),
      covariance: i.initial_covariance.to_owned(),
    })
  }

  pub fn mean(&self) -> ArrayView<f64, Ix1> { self.mean.view() }
  pub fn covariance(&self) -> ArrayView<f64, Ix2> { self.covariance.view() }

  /// `m ← M m`, `C ← M C Mᵀ`.
  pub fn forecast(&mut self) {
    self.mean = self.transition.dot(&self.mean);
    let mc = self.transition.dot(&self.covariance);
    general_mat_mul(1.0, &mc, &self.transition.t(), 0.0, &mut self.covariance);
  }

  /// Conditions on `observation`. `obs_index` only labels errors.
  pub fn analyze(&mut self, obs_index: usize, observation: ArrayView<f64, Ix1>)
    -> Result<()>
  {
    let h = &self.observation_operator;
    check_shape("observation", observation.shape(), &[h.nrows()])?;

    // S = H C Hᵀ + R; G = S⁻¹ H C, so the gain is Gᵀ.
    let hc = h.dot(&self.covariance);
    let mut s = self.observation_covariance.to_owned();
    general_mat_mul(1.0, &hc, &h.t(), 1.0, &mut s);
    let g = s.lu()
      .and_then(|lu| lu.solve_multi(&hc))
      .map_err(|source| Error::SingularMatrix { obs_index, source })?;

    let innovation = &observation - &h.dot(&self.mean);
    self.mean += &g.t().dot(&innovation);
    general_mat_mul(-1.0, &g.t(), &hc, 1.0, &mut self.covariance);

    let sym = (&self.covariance + &self.covariance.t()) * 0.5;
    self.covariance = sym;
    Ok(())
  }

  pub fn step<Ob>(&mut self, obs_index: usize, observer: &Ob) -> Result<()>
    where Ob: Observer,
  {
    self.forecast();
    let mut y = Array::zeros(self.observation_operator.nrows());
    if !observer.observe_into(obs_index, y.view_mut()) {
      return Err(Error::MissingObservation { obs_index });
    }
    self.analyze(obs_index, y.view())
  }
}

#[derive(Debug, Clone)]
pub struct Estimates {
  /// `(n, steps)`
  pub means: Array<f64, Ix2>,
  /// `(steps, n, n)`
  pub covariances: Array<f64, Ix3>,
}

/// Forecasts and analyzes `steps` times, recording each analysis.
pub fn run<Ob>(i: Init, observer: &Ob, steps: usize) -> Result<Estimates>
  where Ob: Observer,
{
  let mut filter = Filter::new(i)?;
  let n = filter.mean.len();
  let mut out = Estimates {
    means: Array::zeros((n, steps)),
    covariances: Array::zeros((steps, n, n)),
  };
  for k in 0..steps {
    filter.step(k, observer)?;
    out.means.column_mut(k).assign(&filter.mean);
    out.covariances.index_axis_mut(Axis(0), k).assign(&filter.covariance);
  }
  Ok(out)
}

#[cfg(test)]
mod test {
  use super::*;
  use nd::{arr1, arr2, Array2};

  use crate::utils::PartialEqWithinTol;

  #[test]
  fn scalar_update() {
    let m0 = arr1(&[0.0]);
    let one = arr2(&[[1.0]]);
    let mut f = Filter::new(Init {
      initial_mean: m0.view(),
      initial_covariance: one.view(),
      transition: one.view(),
      observation_operator: one.view(),
      observation_covariance: one.view(),
    }).unwrap();

    f.forecast();
    f.analyze(0, arr1(&[2.0]).view()).unwrap();
    assert!(f.mean()[0].partial_eq_within_std_tol(&1.0));
    assert!(f.covariance()[[0, 0]].partial_eq_within_std_tol(&0.5));
  }

  #[test]
  fn unobserved_component_follows_model() {
    let m0 = arr1(&[1.0, 2.0]);
    let p0 = Array2::eye(2);
    let transition = arr2(&[[0.5, 0.0], [0.0, 0.25]]);
    let h = arr2(&[[1.0, 0.0]]);
    let r = arr2(&[[0.1]]);
    let y = arr2(&[[0.4, 0.2, 0.1]]);
    let est = run(Init {
      initial_mean: m0.view(),
      initial_covariance: p0.view(),
      transition: transition.view(),
      observation_operator: h.view(),
      observation_covariance: r.view(),
    }, &y, 3).unwrap();

    assert_eq!(est.means.dim(), (2, 3));
    for k in 0..3 {
      let expected = 2.0 * 0.25f64.powi(k as i32 + 1);
      assert!(est.means[[1, k]].partial_eq_within_tol(&expected, 1e-12));
      let c = est.covariances.index_axis(Axis(0), k);
      assert!(c.partial_eq_within_std_tol(&c.t()));
      // the observed variance stays below R
      assert!(c[[0, 0]] < 0.1);
    }
  }

  #[test]
  fn shapes_are_checked() {
    let m0 = arr1(&[1.0, 2.0]);
    let p0 = Array2::eye(2);
    let bad = Array2::eye(3);
    let h = arr2(&[[1.0, 0.0]]);
    let r = arr2(&[[0.1]]);
    match Filter::new(Init {
      initial_mean: m0.view(),
      initial_covariance: p0.view(),
      transition: bad.view(),
      observation_operator: h.view(),
      observation_covariance: r.view(),
    }) {
      Err(Error::DimensionMismatch { what: "transition", .. }) => {},
      other => panic!("unexpected {:?}", other),
    }
  }
}
