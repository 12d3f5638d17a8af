use nd::{Array, ArrayBase, Data, Ix2};
use num_traits::Float;

use crate::error::FactorizeError;

pub trait Cholesky {
  type Elem;

  /// Returns the upper triangular factor, R, of A = R^*R.
  ///
  /// Only the upper triangle of `self` is read.
  fn l_lstar(&self) -> Result<Array<Self::Elem, Ix2>, FactorizeError>;

  /// Returns the lower triangular factor, L = R^*, so that A = L L^*.
  /// This is the square root used to color standard normal draws.
  fn lower_sqrt(&self) -> Result<Array<Self::Elem, Ix2>, FactorizeError> {
    self.l_lstar()
      .map(|r| r.reversed_axes())
  }
}

impl<S, A> Cholesky for ArrayBase<S, Ix2>
  where S: Data<Elem = A>,
        A: Float,
{
  type Elem = A;

  fn l_lstar(&self) -> Result<Array<A, Ix2>, FactorizeError> {
    let (rows, cols) = self.dim();
    if rows != cols {
      return Err(FactorizeError::NotSquare { rows, cols });
    }
    let m = rows;

    let mut r: Array<A, Ix2> = Array::zeros((m, m));
    for j in 0..m {
      let mut s = self[[j, j]];
      for k in 0..j {
        s = s - r[[k, j]] * r[[k, j]];
      }
      // also rejects NaN
      if !(s > A::zero()) {
        return Err(FactorizeError::NotPositiveDefinite {
          pivot: j,
          value: s.to_f64().unwrap_or(::std::f64::NAN),
        });
      }
      let d = s.sqrt();
      r[[j, j]] = d;

      for i in j + 1..m {
        let mut t = self[[j, i]];
        for k in 0..j {
          t = t - r[[k, j]] * r[[k, i]];
        }
        r[[j, i]] = t / d;
      }
    }

    Ok(r)
  }
}
