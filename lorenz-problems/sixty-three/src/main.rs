extern crate na_discrete_filtering as na_df;
extern crate ndarray as nd;

mod cli;
mod logging;

use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use nd::{Array, Ix2};
use tracing::info;

use na_df::{Algorithm, Workspace};
use na_df::kalman::enkf;
use sixty_three::{L63Model, L63Setup};
use util::progress::StepProgress;

use crate::cli::Cli;

fn main() {
  let cli = Cli::parse();
  logging::init(cli.verbose);

  if let Err(e) = run(&cli) {
    eprintln!("Error: {e:#}");
    process::exit(1);
  }
}

fn run(cli: &Cli) -> Result<()> {
  let setup = cli.apply(L63Setup::default());
  info!(?setup, "generating truth and observations");
  let data = setup.generate()
    .context("generating the truth and observations")?;
  let observations = &data.data.observations;

  let mut rand = data.rand.clone();
  let mut model = data.model();
  let init = data.init();
  let steps = init.window.observation_steps();

  let algo = <enkf::Algo as Algorithm<L63Model, Array<f64, Ix2>>>::init(&init, &model,
                                                                        observations)?;
  let mut workspace = enkf::OwnedWorkspace::alloc(init, &mut rand)?;

  let mut progress = if cli.quiet {
    None
  } else {
    Some(StepProgress::new(steps, "EnKF".into()))
  };
  for i in 0..steps {
    algo.next_step(i, &mut rand, &mut workspace, &mut model, observations)
      .with_context(|| format!("assimilation step {} of {}", i + 1, steps))?;
    if let Some(ref mut p) = progress {
      p.step(workspace.current_time());
    }
  }
  if let Some(p) = progress {
    p.finish();
  }

  let out = workspace.into_trajectories();
  let free = data.free_run()
    .context("running the model without assimilation")?;
  let truth = &data.data.truth;

  let assimilated = util::rmse(&out.mean, truth);
  let forecast_only = util::rmse(&free, truth);
  info!(assimilated, forecast_only, model_calls = model.calls, "finished");

  let errors = util::error_norms(&out.mean, truth);
  for (i, &t) in data.observation_times.iter().enumerate() {
    let slot = (i + 1) * setup.steps_per_gap;
    println!("t = {:7.3}  mean error {:9.5}  spread {:9.5}",
             t, errors[slot],
             out.forecast_covariances.index_axis(nd::Axis(0), i).diag().sum().sqrt());
  }
  println!("assimilated mean RMSE:  {:.5}", assimilated);
  println!("forecast-only RMSE:     {:.5}", forecast_only);

  Ok(())
}
