//! Fifth order explicit Runge-Kutta (Dormand & Prince).
//! Use to approximate first order ODEs.
//!
//! The local error is estimated with the embedded fourth order solution and
//! each accepted step carries the coefficients of a continuous extension
//! (Hairer, Norsett & Wanner, "Solving ODEs I", II.6), so the solution can be
//! sampled anywhere inside the step without extra model evaluations.

use nd::{Array, ArrayView, ArrayViewMut, Ix1, Ix2};

use tracing::trace;

use crate::error::IntegrationError;

const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

// fifth order weights; also the last row of the tableau (FSAL)
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// fifth minus fourth order weights
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

// dense output
const D1: f64 = -12715105075.0 / 11282082432.0;
const D3: f64 = 87487479700.0 / 32700410799.0;
const D4: f64 = -10690763975.0 / 1880347072.0;
const D5: f64 = 701980252875.0 / 199316789632.0;
const D6: f64 = -1453857185.0 / 822651844.0;
const D7: f64 = 69997945.0 / 29380423.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

pub const DEFAULT_MAX_STEPS: u64 = 100_000;

/// Mixed error tolerance: component `i` is accepted when its error is below
/// `atol + rtol * |y_i|`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
  pub rtol: f64,
  pub atol: f64,
}
impl Default for Tolerance {
  fn default() -> Self {
    Tolerance {
      rtol: 1.0e-3,
      atol: 1.0e-6,
    }
  }
}

pub fn new(x: f64, y: Array<f64, Ix1>, tolerance: Tolerance) -> State {
  State::new(x, y, tolerance)
}

#[derive(Debug, Clone)]
pub struct State {
  calls: u64,
  steps: u64,
  rejected: u64,
  started: bool,

  /// Proposal for the next step; picked automatically when `None`.
  pub h: Option<f64>,
  pub tolerance: Tolerance,
  pub max_steps: u64,

  x: f64,
  y: Array<f64, Ix1>,
  yp: Array<f64, Ix1>,
}

/// One accepted step, `[x_old, x_old + h]`, plus its continuous extension.
#[derive(Debug, Clone)]
pub struct DenseStep {
  x_old: f64,
  h: f64,
  /// Column `j` is the `j`-th coefficient vector of the interpolant.
  ycoeff: Array<f64, Ix2>,
}

impl State {
  pub fn new(x: f64, y: Array<f64, Ix1>, tolerance: Tolerance) -> State {
    let yp = Array::zeros(y.raw_dim());
    State {
      calls: 0,
      steps: 0,
      rejected: 0,
      started: false,

      h: None,
      tolerance,
      max_steps: DEFAULT_MAX_STEPS,

      x,
      y,
      yp,
    }
  }
  pub fn x(&self) -> f64 { self.x }
  pub fn y(&self) -> ArrayView<f64, Ix1> { self.y.view() }
  pub fn yp(&self) -> ArrayView<f64, Ix1> { self.yp.view() }

  pub fn total_model_calls(&self) -> u64 { self.calls }
  pub fn total_steps(&self) -> u64 { self.steps }
  pub fn rejected_steps(&self) -> u64 { self.rejected }

  fn feval<F>(&mut self, f: &mut F, x: f64, y: &Array<f64, Ix1>) -> Array<f64, Ix1>
    where F: FnMut(f64, ArrayView<f64, Ix1>, ArrayViewMut<f64, Ix1>),
  {
    let mut yp = Array::zeros(y.raw_dim());
    f(x, y.view(), yp.view_mut());
    self.calls += 1;
    yp
  }

  fn scale(&self, y: &Array<f64, Ix1>) -> Array<f64, Ix1> {
    let Tolerance { rtol, atol } = self.tolerance;
    y.mapv(|v| atol + v.abs() * rtol)
  }

  /// Starting step from the size of the derivatives (Hairer's heuristic).
  fn initial_step<F>(&mut self, f: &mut F, span: f64) -> f64
    where F: FnMut(f64, ArrayView<f64, Ix1>, ArrayViewMut<f64, Ix1>),
  {
    let scale = self.scale(&self.y);
    let d0 = rms(&(&self.y / &scale));
    let d1 = rms(&(&self.yp / &scale));
    let h0 = if d0 < 1.0e-5 || d1 < 1.0e-5 {
      1.0e-6
    } else {
      0.01 * d0 / d1
    };
    let h0 = h0.min(span);

    let mut y1 = self.y.clone();
    y1.scaled_add(h0, &self.yp);
    let x1 = self.x + h0;
    let f1 = self.feval(f, x1, &y1);
    let d2 = rms(&((&f1 - &self.yp) / &scale)) / h0;

    let h1 = if d1.max(d2) <= 1.0e-15 {
      (h0 * 1.0e-3).max(1.0e-6)
    } else {
      (0.01 / d1.max(d2)).powf(1.0 / 5.0)
    };

    (100.0 * h0).min(h1).min(span)
  }

  /// Takes one accepted step towards `x_bound`, never past it.
  pub fn step<F>(&mut self, f: &mut F, x_bound: f64)
                 -> Result<DenseStep, IntegrationError>
    where F: FnMut(f64, ArrayView<f64, Ix1>, ArrayViewMut<f64, Ix1>),
  {
    debug_assert!(x_bound > self.x);

    if !self.started {
      let x = self.x;
      let y = self.y.clone();
      self.yp = self.feval(f, x, &y);
      self.started = true;
    }
    let mut h = match self.h {
      Some(h) => h,
      None => self.initial_step(f, x_bound - self.x),
    };

    let mut failed = false;
    let mut attempts = 0u64;

    loop {
      let x = self.x;
      let min_step = 10.0 * ::std::f64::EPSILON * x.abs().max(x_bound.abs());
      if !(h > min_step) {
        return Err(IntegrationError::StepSizeUnderflow { x, h });
      }
      if self.steps + attempts >= self.max_steps {
        return Err(IntegrationError::TooManySteps { max: self.max_steps, x });
      }
      attempts += 1;

      let (h_step, x_new) = if x + h >= x_bound {
        (x_bound - x, x_bound)
      } else {
        (h, x + h)
      };

      let k1 = self.yp.clone();
      let y2 = stage(&self.y, h_step, &[(A21, &k1)]);
      let k2 = self.feval(f, x + C2 * h_step, &y2);
      let y3 = stage(&self.y, h_step, &[(A31, &k1), (A32, &k2)]);
      let k3 = self.feval(f, x + C3 * h_step, &y3);
      let y4 = stage(&self.y, h_step, &[(A41, &k1), (A42, &k2), (A43, &k3)]);
      let k4 = self.feval(f, x + C4 * h_step, &y4);
      let y5 = stage(&self.y, h_step, &[(A51, &k1), (A52, &k2), (A53, &k3),
                                        (A54, &k4)]);
      let k5 = self.feval(f, x + C5 * h_step, &y5);
      let y6 = stage(&self.y, h_step, &[(A61, &k1), (A62, &k2), (A63, &k3),
                                        (A64, &k4), (A65, &k5)]);
      let k6 = self.feval(f, x_new, &y6);
      let y_new = stage(&self.y, h_step, &[(B1, &k1), (B3, &k3), (B4, &k4),
                                           (B5, &k5), (B6, &k6)]);
      let k7 = self.feval(f, x_new, &y_new);

      let mut err: Array<f64, Ix1> = Array::zeros(self.y.raw_dim());
      for &(e, k) in [(E1, &k1), (E3, &k3), (E4, &k4),
                      (E5, &k5), (E6, &k6), (E7, &k7)].iter() {
        err.scaled_add(h_step * e, k);
      }
      let Tolerance { rtol, atol } = self.tolerance;
      let mut scaled = err;
      for ((e, &y0), &y1) in scaled.iter_mut().zip(self.y.iter()).zip(y_new.iter()) {
        *e /= atol + y0.abs().max(y1.abs()) * rtol;
      }
      let err_norm = rms(&scaled);

      if !err_norm.is_finite() || y_new.iter().any(|v| !v.is_finite()) {
        return Err(IntegrationError::NonFinite { x: x_new });
      }

      if err_norm < 1.0 {
        let mut factor = if err_norm == 0.0 {
          MAX_FACTOR
        } else {
          (SAFETY * err_norm.powf(-1.0 / 5.0)).min(MAX_FACTOR)
        };
        if failed {
          factor = factor.min(1.0);
        }

        let mut ycoeff = Array::zeros((self.y.len(), 5));
        {
          let ydiff = &y_new - &self.y;
          let mut bspl = &k1 * h_step;
          bspl -= &ydiff;
          let mut c3 = &ydiff - &(&k7 * h_step);
          c3 -= &bspl;
          let c4 = stage(&Array::zeros(self.y.raw_dim()), h_step,
                         &[(D1, &k1), (D3, &k3), (D4, &k4),
                           (D5, &k5), (D6, &k6), (D7, &k7)]);

          ycoeff.column_mut(0).assign(&self.y);
          ycoeff.column_mut(1).assign(&ydiff);
          ycoeff.column_mut(2).assign(&bspl);
          ycoeff.column_mut(3).assign(&c3);
          ycoeff.column_mut(4).assign(&c4);
        }

        let x_old = self.x;
        self.x = x_new;
        self.y = y_new;
        self.yp = k7;
        self.steps += 1;
        self.h = Some(h_step * factor);

        return Ok(DenseStep {
          x_old,
          h: h_step,
          ycoeff,
        });
      }

      self.rejected += 1;
      failed = true;
      h = h_step * (SAFETY * err_norm.powf(-1.0 / 5.0)).max(MIN_FACTOR);
      trace!(x, h_rejected = h_step, h_next = h, err_norm, "step rejected");
    }
  }
}

impl DenseStep {
  pub fn x_old(&self) -> f64 { self.x_old }
  pub fn x_new(&self) -> f64 { self.x_old + self.h }
  pub fn step_size(&self) -> f64 { self.h }
  pub fn ycoeff(&self) -> ArrayView<f64, Ix2> { self.ycoeff.view() }

  /// Evaluates the continuous extension at `xi`, which should lie inside
  /// the step. Exact at both ends.
  pub fn y_value(&self, xi: f64, mut dest: ArrayViewMut<f64, Ix1>) {
    let theta = (xi - self.x_old) / self.h;
    let theta1 = 1.0 - theta;
    let c = &self.ycoeff;

    for (i, z) in dest.iter_mut().enumerate() {
      *z = c[[i, 0]] + theta * (c[[i, 1]] + theta1 * (c[[i, 2]] + theta *
                                (c[[i, 3]] + theta1 * c[[i, 4]])));
    }
  }
}

fn stage(y: &Array<f64, Ix1>, h: f64, terms: &[(f64, &Array<f64, Ix1>)])
         -> Array<f64, Ix1>
{
  let mut out = y.clone();
  for &(a, k) in terms.iter() {
    out.scaled_add(h * a, k);
  }
  out
}

fn rms(v: &Array<f64, Ix1>) -> f64 {
  if v.is_empty() { return 0.0; }
  (v.iter().map(|e| e * e).sum::<f64>() / v.len() as f64).sqrt()
}
