use clap::Parser;

use sixty_three::L63Setup;

/// Ensemble Kalman filter twin experiment on the Lorenz '63 system.
#[derive(Parser, Debug)]
#[command(name = "sixty-three", version)]
pub struct Cli {
  /// Increase verbosity (-v info, -vv debug, -vvv trace).
  #[arg(short, long, action = clap::ArgAction::Count)]
  pub verbose: u8,

  /// Don't draw a progress bar.
  #[arg(short, long)]
  pub quiet: bool,

  /// Number of ensemble members.
  #[arg(short = 'n', long)]
  pub ensemble_count: Option<usize>,

  /// Index of the last observation; there are `n_obs + 1` of them.
  #[arg(long)]
  pub n_obs: Option<usize>,

  /// Trajectory samples between consecutive observations.
  #[arg(long)]
  pub steps_per_gap: Option<usize>,

  /// Time between trajectory samples.
  #[arg(long)]
  pub step_size: Option<f64>,

  /// Diagonal of the initial covariance.
  #[arg(long)]
  pub initial_variance: Option<f64>,

  /// Diagonal of the observation error covariance.
  #[arg(long)]
  pub observation_variance: Option<f64>,

  /// RNG seed.
  #[arg(short, long)]
  pub seed: Option<u64>,
}

impl Cli {
  pub fn apply(&self, mut setup: L63Setup) -> L63Setup {
    if let Some(v) = self.ensemble_count { setup.ensemble_count = v; }
    if let Some(v) = self.n_obs { setup.n_obs = v; }
    if let Some(v) = self.steps_per_gap { setup.steps_per_gap = v; }
    if let Some(v) = self.step_size { setup.step_size = v; }
    if let Some(v) = self.initial_variance { setup.initial_variance = v; }
    if let Some(v) = self.observation_variance { setup.observation_variance = v; }
    if let Some(v) = self.seed { setup.rand_seed = v; }
    setup
  }
}
