use std::fmt;

use nla::FactorizeError;

pub type Result<T> = ::std::result::Result<T, Error>;

/// The half of an assimilation cycle that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Forecast,
  Assimilate,
}
impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match *self {
      Stage::Forecast => f.write_str("forecast"),
      Stage::Assimilate => f.write_str("assimilate"),
    }
  }
}

/// Every error ends the run; the filter never retries.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// An input's shape disagrees with the state or observation dimension.
  #[error("{what} has shape {found:?}, expected {expected:?}")]
  DimensionMismatch {
    what: &'static str,
    expected: Vec<usize>,
    found: Vec<usize>,
  },

  /// Sample covariances need at least two members.
  #[error("ensemble needs at least 2 members, got {count}")]
  TooFewMembers { count: usize },

  #[error("invalid assimilation window: {reason}")]
  InvalidWindow { reason: &'static str },

  #[error("observation times must be strictly increasing after the start time (index {index})")]
  ObservationTimesNotIncreasing { index: usize },

  #[error("{what} is not symmetric positive definite")]
  NotPositiveDefinite {
    what: &'static str,
    #[source]
    source: FactorizeError,
  },

  #[error("forecast stage failed at observation {obs_index} (member {member}): {source}")]
  IntegrationFailure {
    obs_index: usize,
    member: usize,
    #[source]
    source: Box<dyn ::std::error::Error + Send + Sync>,
  },

  #[error("assimilate stage failed at observation {obs_index}: innovation covariance is singular")]
  SingularMatrix {
    obs_index: usize,
    #[source]
    source: FactorizeError,
  },

  #[error("assimilate stage failed at observation {obs_index}: no observation available")]
  MissingObservation { obs_index: usize },
}

impl Error {
  pub fn stage(&self) -> Option<Stage> {
    match *self {
      Error::IntegrationFailure { .. } => Some(Stage::Forecast),
      Error::SingularMatrix { .. } |
      Error::MissingObservation { .. } => Some(Stage::Assimilate),
      _ => None,
    }
  }

  pub fn obs_index(&self) -> Option<usize> {
    match *self {
      Error::IntegrationFailure { obs_index, .. } |
      Error::SingularMatrix { obs_index, .. } |
      Error::MissingObservation { obs_index } => Some(obs_index),
      _ => None,
    }
  }
}
