
extern crate na_discrete_filtering as na_df;
extern crate ndarray as nd;
extern crate nla_factorize as nla;

use nd::{Array, ArrayBase, Axis, Data, Ix1, Ix2};

pub use error::DataError;

pub mod data;
pub mod error;
pub mod progress;

/// Root-mean-square difference over every component and time of two
/// `(n, T)` trajectories.
///
/// # Panics
/// If the shapes differ.
pub fn rmse<S1, S2>(a: &ArrayBase<S1, Ix2>, b: &ArrayBase<S2, Ix2>) -> f64
  where S1: Data<Elem = f64>,
        S2: Data<Elem = f64>,
{
  assert_eq!(a.dim(), b.dim(), "trajectory shapes differ");
  if a.is_empty() {
    return 0.0;
  }
  let sq: f64 = a.iter()
    .zip(b.iter())
    .map(|(l, r)| (l - r) * (l - r))
    .sum();
  (sq / a.len() as f64).sqrt()
}

/// Euclidean error at each time, `T` of them.
pub fn error_norms<S1, S2>(a: &ArrayBase<S1, Ix2>, b: &ArrayBase<S2, Ix2>)
  -> Array<f64, Ix1>
  where S1: Data<Elem = f64>,
        S2: Data<Elem = f64>,
{
  assert_eq!(a.dim(), b.dim(), "trajectory shapes differ");
  (a - b).map_axis(Axis(0), |col| col.dot(&col).sqrt())
}

#[cfg(test)]
mod test {
  use super::*;
  use nd::{arr1, arr2};

  #[test]
  fn rmse_of_known_difference() {
    let a = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
    let b = arr2(&[[1.0, 0.0], [3.0, 4.0]]);
    assert_eq!(rmse(&a, &a), 0.0);
    assert_eq!(rmse(&a, &b), 1.0);
  }

  #[test]
  fn norms_per_time() {
    let a = arr2(&[[3.0, 0.0], [4.0, 1.0]]);
    let b = arr2(&[[0.0, 0.0], [0.0, 0.0]]);
    assert_eq!(error_norms(&a, &b), arr1(&[5.0, 1.0]));
  }

  #[test]
  #[should_panic]
  fn shapes_must_agree() {
    let a = arr2(&[[1.0, 2.0]]);
    let b = arr2(&[[1.0], [2.0]]);
    rmse(&a, &b);
  }
}
