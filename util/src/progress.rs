use std::borrow::Cow;
use std::io::Stdout;
use std::time::Duration;

use pbr::ProgressBar;

/// A terminal progress bar over the observation steps of a run.
pub struct StepProgress {
  name: Cow<'static, str>,
  progress: ProgressBar<Stdout>,
}

impl StepProgress {
  pub fn new(total: usize, name: Cow<'static, str>) -> StepProgress {
    let mut p = ProgressBar::new(total as u64);
    p.show_speed = false;
    p.show_percent = true;
    p.show_counter = true;
    p.show_time_left = true;

    let fps = Duration::new(1, 0) / 60;
    p.set_max_refresh_rate(Some(fps));

    p.message(&format!("{}: ", name));
    StepProgress {
      name,
      progress: p,
    }
  }

  /// Marks one observation step as assimilated.
  pub fn step(&mut self, time: f64) {
    self.progress.message(&format!("{} (t = {:.3}): ", self.name, time));
    self.progress.inc();
  }

  pub fn finish(mut self) {
    let msg = format!("{} done!", self.name);
    self.progress.finish_println(&msg);
  }
}
