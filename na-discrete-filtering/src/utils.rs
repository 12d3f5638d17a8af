
use nd::{Array, ArrayBase, ArrayView, ArrayViewMut, Axis, Data, Dimension,
         Ix1, Ix2};
use nd::linalg::general_mat_mul;

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::error::{Error, Result};

/// Returns an error naming `what` unless `found == expected`.
pub fn check_shape(what: &'static str, found: &[usize], expected: &[usize])
  -> Result<()>
{
  if found == expected {
    Ok(())
  } else {
    Err(Error::DimensionMismatch {
      what,
      expected: expected.to_vec(),
      found: found.to_vec(),
    })
  }
}

/// Standard normal draws, filled row by row.
pub fn make_2d_randn<R>(dim: (usize, usize), rand: &mut R) -> Array<f64, Ix2>
  where R: Rng + ?Sized,
{
  let mut r = Array::zeros(dim);
  for i in 0..dim.0 {
    for j in 0..dim.1 {
      r[[i, j]] = StandardNormal.sample(rand);
    }
  }

  r
}

/// `count` draws from `N(0, S Sᵀ)`, one per column.
pub fn colored_randn<S, R>(sqrt_cov: &ArrayBase<S, Ix2>,
                           count: usize,
                           rand: &mut R) -> Array<f64, Ix2>
  where S: Data<Elem = f64>,
        R: Rng + ?Sized,
{
  let z = make_2d_randn((sqrt_cov.ncols(), count), rand);
  sqrt_cov.dot(&z)
}

/// Member average of an ensemble stored one member per column.
pub fn ensemble_mean<S>(ensembles: &ArrayBase<S, Ix2>) -> Array<f64, Ix1>
  where S: Data<Elem = f64>,
{
  ensembles.sum_axis(Axis(1)) / ensembles.ncols() as f64
}

/// Writes the anomalies `X − mean·1ᵀ` into `centered` and the unbiased
/// sample covariance `A Aᵀ / (Ne − 1)` into `cov`.
pub fn sample_covariance_into(ensembles: ArrayView<f64, Ix2>,
                              mean: ArrayView<f64, Ix1>,
                              mut centered: ArrayViewMut<f64, Ix2>,
                              cov: &mut ArrayViewMut<f64, Ix2>)
{
  let n_e = ensembles.ncols();
  debug_assert!(n_e >= 2);
  debug_assert_eq!(centered.dim(), ensembles.dim());
  debug_assert_eq!(cov.dim(), (mean.len(), mean.len()));

  centered.assign(&ensembles);
  centered -= &mean.insert_axis(Axis(1));
  let scale = 1.0 / (n_e - 1) as f64;
  general_mat_mul(scale, &centered, &centered.t(), 0.0, cov);
}

pub trait PartialEqWithinTol<Rhs, Tol> {
  const STD_TOL: Tol;
  fn partial_eq_within_tol(&self, rhs: &Rhs, tol: Tol) -> bool;

  fn partial_neq_within_tol(&self, rhs: &Rhs, tol: Tol) -> bool {
    !self.partial_eq_within_tol(rhs, tol)
  }

  fn partial_eq_within_std_tol(&self, rhs: &Rhs) -> bool {
    self.partial_eq_within_tol(rhs, Self::STD_TOL)
  }
  fn partial_neq_within_std_tol(&self, rhs: &Rhs) -> bool {
    !self.partial_eq_within_std_tol(rhs)
  }
}

impl PartialEqWithinTol<f64, f64> for f64 {
  const STD_TOL: Self = ::std::f64::EPSILON;
  fn partial_eq_within_tol(&self, rhs: &f64, tol: f64) -> bool {
    (self - rhs).abs() <= tol
  }
}
impl<S1, S2, D> PartialEqWithinTol<ArrayBase<S2, D>, f64> for ArrayBase<S1, D>
  where S1: Data<Elem = f64>,
        S2: Data<Elem = f64>,
        D: Dimension,
{
  const STD_TOL: f64 = ::std::f64::EPSILON;
  fn partial_eq_within_tol(&self, rhs: &ArrayBase<S2, D>, tol: f64) -> bool {
    self.shape() == rhs.shape() &&
      self.iter()
        .zip(rhs.iter())
        .all(|(l, r)| l.partial_eq_within_tol(r, tol))
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use nd::{arr1, arr2, Array2};
  use rand::SeedableRng;
  use rand_isaac::Isaac64Rng;

  #[test]
  fn shape_check() {
    assert!(check_shape("x", &[3], &[3]).is_ok());
    match check_shape("x", &[2, 3], &[3, 3]) {
      Err(Error::DimensionMismatch { what: "x", expected, found }) => {
        assert_eq!(expected, vec![3, 3]);
        assert_eq!(found, vec![2, 3]);
      },
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn randn_is_seeded() {
    let mut a = Isaac64Rng::seed_from_u64(7);
    let mut b = Isaac64Rng::seed_from_u64(7);
    let x = make_2d_randn((3, 4), &mut a);
    let y = make_2d_randn((3, 4), &mut b);
    assert_eq!(x, y);
    assert!(x.iter().all(|v| v.is_finite()));
  }

  #[test]
  fn colored_sample_covariance() {
    let mut rand = Isaac64Rng::seed_from_u64(11);
    let l = arr2(&[[2.0, 0.0], [1.0, 0.5]]);
    let x = colored_randn(&l, 20000, &mut rand);
    let mean = ensemble_mean(&x);
    let mut centered = Array2::zeros(x.dim());
    let mut cov = Array2::zeros((2, 2));
    sample_covariance_into(x.view(), mean.view(), centered.view_mut(),
                           &mut cov.view_mut());

    let expected = l.dot(&l.t());
    assert!(cov.partial_eq_within_tol(&expected, 0.1), "{}", cov);
    assert!(mean.partial_eq_within_tol(&arr1(&[0.0, 0.0]), 0.05), "{}", mean);
  }

  #[test]
  fn covariance_of_known_ensemble() {
    let x = arr2(&[[1.0, 2.0, 3.0], [2.0, 2.0, 5.0]]);
    let mean = ensemble_mean(&x);
    assert_eq!(mean, arr1(&[2.0, 3.0]));

    let mut centered = Array2::zeros(x.dim());
    let mut cov = Array2::zeros((2, 2));
    sample_covariance_into(x.view(), mean.view(), centered.view_mut(),
                           &mut cov.view_mut());
    assert_eq!(centered, arr2(&[[-1.0, 0.0, 1.0], [-1.0, -1.0, 2.0]]));
    assert!(cov.partial_eq_within_std_tol(&arr2(&[[1.0, 1.5], [1.5, 3.0]])));
  }

  #[test]
  fn within_tol() {
    assert!(1.0f64.partial_eq_within_tol(&1.05, 0.1));
    assert!(1.0f64.partial_neq_within_tol(&1.2, 0.1));
    let a = arr1(&[1.0, 2.0]);
    assert!(a.partial_neq_within_std_tol(&arr1(&[1.0, 2.0, 3.0])));
  }
}
