//! Discrete-time filters for sequential data assimilation.
//!
//! Models and observations are plugged in through [`Model`] and
//! [`Observer`]; the filters themselves live under [`kalman`].

extern crate ndarray as nd;
extern crate nla_factorize as nla;

use nd::{ArrayBase, ArrayView, ArrayViewMut, Axis, Data, Ix1, Ix2};
use rand::Rng;

pub use error::{Error, Result, Stage};

pub mod ensemble;
pub mod error;
pub mod kalman;
pub mod perturb;
pub mod utils;

/// A forward model: maps a state and a time grid to the trajectory through
/// that grid. Implementations must be pure; ensemble members are propagated
/// concurrently through a shared reference.
pub trait Model: Send + Sync {
  type Error: ::std::error::Error + Send + Sync + 'static;

  fn state_dim(&self) -> usize;

  /// Writes one column of `out` per entry of `time_grid`. The first column
  /// is `state` itself.
  fn propagate(&self,
               state: ArrayView<f64, Ix1>,
               time_grid: ArrayView<f64, Ix1>,
               out: ArrayViewMut<f64, Ix2>)
               -> ::std::result::Result<(), Self::Error>;
}

#[derive(Debug)]
pub struct ModelStats<M> {
  pub model: M,
  /// Number of member propagations so far.
  pub calls: u64,
}
impl<M> From<M> for ModelStats<M> {
  fn from(v: M) -> ModelStats<M> {
    ModelStats {
      model: v,
      calls: 0,
    }
  }
}

pub trait Observer {
  fn observation_dim(&self) -> usize;
  /// How many observation steps are available, if known up front.
  fn observation_count(&self) -> Option<usize> { None }
  /// Returns `false` if there is no observation for step `idx`.
  fn observe_into(&self, idx: usize, out: ArrayViewMut<f64, Ix1>) -> bool;
}

/// Observations stored one column per observation step.
impl<S> Observer for ArrayBase<S, Ix2>
  where S: Data<Elem = f64>,
{
  fn observation_dim(&self) -> usize { self.nrows() }
  fn observation_count(&self) -> Option<usize> { Some(self.ncols()) }
  fn observe_into(&self, idx: usize, mut out: ArrayViewMut<f64, Ix1>) -> bool {
    if idx >= self.ncols() || out.len() != self.nrows() {
      return false;
    }
    out.assign(&self.index_axis(Axis(1), idx));
    true
  }
}

pub trait Workspace<I>: Sized {
  /// Sets up the initial state; may draw from `rand`.
  fn alloc<R>(i: I, rand: &mut R) -> Result<Self>
    where R: Rng + ?Sized;
}

pub trait Algorithm<M, Ob>: Sized
  where M: Model,
        Ob: Observer,
{
  type Init;
  type WS;

  /// Validates `i` against the model and observer.
  fn init(i: &Self::Init, model: &ModelStats<M>, observer: &Ob) -> Result<Self>;

  fn next_step<R>(&self,
                  current_step: usize,
                  rand: &mut R,
                  workspace: &mut Self::WS,
                  model: &mut ModelStats<M>,
                  observer: &Ob)
                  -> Result<()>
    where R: Rng + ?Sized;
}

#[cfg(test)]
mod test {
  use super::*;
  use nd::{arr1, arr2};

  #[test]
  fn matrix_observer() {
    let obs = arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    assert_eq!(obs.observation_dim(), 2);
    assert_eq!(obs.observation_count(), Some(3));

    let mut out = arr1(&[0.0, 0.0]);
    assert!(obs.observe_into(1, out.view_mut()));
    assert_eq!(out, arr1(&[2.0, 5.0]));
    assert!(!obs.observe_into(3, out.view_mut()));
  }
}
