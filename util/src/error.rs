use nla::FactorizeError;

#[derive(Debug, thiserror::Error)]
pub enum DataError {
  /// Bad window or shapes.
  #[error(transparent)]
  Setup(#[from] na_df::Error),

  #[error("model failed while integrating the truth: {0}")]
  Model(#[source] Box<dyn ::std::error::Error + Send + Sync>),

  #[error("observation covariance is not symmetric positive definite")]
  NotPositiveDefinite(#[from] FactorizeError),
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn messages() {
    let e = DataError::from(FactorizeError::NotPositiveDefinite {
      pivot: 0,
      value: -1.0,
    });
    assert_eq!(e.to_string(),
               "observation covariance is not symmetric positive definite");

    let e = DataError::from(na_df::Error::TooFewMembers { count: 0 });
    assert_eq!(e.to_string(), "ensemble needs at least 2 members, got 0");
  }
}
