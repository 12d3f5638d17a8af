//! LU factorization with partial (row) pivoting.

use nd::{Array, ArrayBase, Data, Ix1, Ix2};
use num_traits::Float;

use crate::error::FactorizeError;

/// `P A = L U`, stored packed: the strict lower triangle of `lu` holds L
/// (unit diagonal implied), the upper triangle holds U.
#[derive(Debug, Clone)]
pub struct Lu<A> {
  lu: Array<A, Ix2>,
  /// Row `i` of `P A` is row `perm[i]` of `A`.
  perm: Vec<usize>,
}

pub trait LuFactorize {
  type Elem;
  fn lu(&self) -> Result<Lu<Self::Elem>, FactorizeError>;
}

impl<S, A> LuFactorize for ArrayBase<S, Ix2>
  where S: Data<Elem = A>,
        A: Float,
{
  type Elem = A;

  fn lu(&self) -> Result<Lu<A>, FactorizeError> {
    let (rows, cols) = self.dim();
    if rows != cols {
      return Err(FactorizeError::NotSquare { rows, cols });
    }
    let n = rows;

    let scale = self.iter()
      .fold(A::zero(), |m, v| m.max(v.abs()));
    let n_a = A::from(n).unwrap_or_else(A::one);
    let tiny = A::epsilon() * scale * n_a;

    let mut lu = self.to_owned();
    let mut perm: Vec<usize> = (0..n).collect();

    for k in 0..n {
      let mut p = k;
      let mut best = lu[[k, k]].abs();
      for i in k + 1..n {
        let v = lu[[i, k]].abs();
        if v > best {
          best = v;
          p = i;
        }
      }
      // `!(a > b)` so a NaN pivot also lands here.
      if !(best > tiny) {
        return Err(FactorizeError::Singular { pivot: k });
      }

      if p != k {
        for j in 0..n {
          lu.swap([k, j], [p, j]);
        }
        perm.swap(k, p);
      }

      let pivot = lu[[k, k]];
      for i in k + 1..n {
        let factor = lu[[i, k]] / pivot;
        lu[[i, k]] = factor;
        if factor == A::zero() { continue; }
        for j in k + 1..n {
          let t = lu[[k, j]];
          lu[[i, j]] = lu[[i, j]] - factor * t;
        }
      }
    }

    Ok(Lu { lu, perm })
  }
}

impl<A> Lu<A>
  where A: Float,
{
  pub fn dim(&self) -> usize { self.perm.len() }

  /// Solves `A X = B` for every column of `B`.
  pub fn solve_multi<S>(&self, b: &ArrayBase<S, Ix2>)
                        -> Result<Array<A, Ix2>, FactorizeError>
    where S: Data<Elem = A>,
  {
    let n = self.dim();
    if b.nrows() != n {
      return Err(FactorizeError::DimensionMismatch {
        expected: n,
        found: b.nrows(),
      });
    }

    let mut x: Array<A, Ix2> = Array::zeros(b.raw_dim());
    for (i, &src) in self.perm.iter().enumerate() {
      x.row_mut(i).assign(&b.row(src));
    }

    for mut col in x.columns_mut() {
      // L y = P b
      for i in 0..n {
        let mut s = col[i];
        for j in 0..i {
          s = s - self.lu[[i, j]] * col[j];
        }
        col[i] = s;
      }
      // U x = y
      for i in (0..n).rev() {
        let mut s = col[i];
        for j in i + 1..n {
          s = s - self.lu[[i, j]] * col[j];
        }
        col[i] = s / self.lu[[i, i]];
      }
    }

    Ok(x)
  }

  pub fn solve<S>(&self, b: &ArrayBase<S, Ix1>)
                  -> Result<Array<A, Ix1>, FactorizeError>
    where S: Data<Elem = A>,
  {
    let n = b.len();
    let b2 = b.to_owned().into_shape((n, 1))
      .map_err(|_| FactorizeError::DimensionMismatch {
        expected: self.dim(),
        found: n,
      })?;
    let x = self.solve_multi(&b2)?;
    Ok(x.column(0).to_owned())
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use nd::{arr1, arr2, Array2};

  fn close(a: &Array2<f64>, b: &Array2<f64>, tol: f64) -> bool {
    a.shape() == b.shape() &&
      a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= tol)
  }

  #[test]
  fn solves_general_system() {
    let a = arr2(&[
      [2.0, 1.0, 1.0],
      [4.0, -6.0, 0.0],
      [-2.0, 7.0, 2.0],
    ]);
    let x = arr1(&[1.0, -2.0, 3.0]);
    let b = a.dot(&x);

    let sol = a.lu().unwrap().solve(&b).unwrap();
    for (s, e) in sol.iter().zip(x.iter()) {
      assert!((s - e).abs() < 1e-12, "{} vs {}", s, e);
    }
  }

  #[test]
  fn needs_pivoting() {
    let a = arr2(&[[0.0, 1.0], [1.0, 0.0]]);
    let b = arr2(&[[3.0, 1.0], [5.0, 2.0]]);
    let x = a.lu().unwrap().solve_multi(&b).unwrap();
    assert!(close(&x, &arr2(&[[5.0, 2.0], [3.0, 1.0]]), 0.0));
  }

  #[test]
  fn multi_rhs_matches_columns() {
    let a = arr2(&[
      [4.0, 1.0, 0.5],
      [1.0, 3.0, 0.2],
      [0.5, 0.2, 2.0],
    ]);
    let b = arr2(&[
      [1.0, 0.0, 2.0, -1.0],
      [0.0, 1.0, 1.0, 3.0],
      [2.0, 1.0, 0.0, 0.5],
    ]);
    let lu = a.lu().unwrap();
    let x = lu.solve_multi(&b).unwrap();
    assert!(close(&a.dot(&x), &b, 1e-12));
  }

  #[test]
  fn singular() {
    let a = arr2(&[[1.0, 2.0], [2.0, 4.0]]);
    match a.lu() {
      Err(FactorizeError::Singular { pivot: 1 }) => {},
      other => panic!("unexpected {:?}", other),
    }

    let z: Array2<f64> = Array2::zeros((3, 3));
    assert!(z.lu().is_err());
  }

  #[test]
  fn rhs_mismatch() {
    let a: Array2<f64> = Array2::eye(3);
    let b: Array2<f64> = Array2::zeros((2, 1));
    assert_eq!(a.lu().unwrap().solve_multi(&b).unwrap_err(),
               FactorizeError::DimensionMismatch { expected: 3, found: 2 });
  }
}
