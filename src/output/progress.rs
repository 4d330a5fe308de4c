use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright_green, bright_red, bright_yellow};

/// Spinner shown while a one-shot refresh loads the dashboard
pub struct LoadProgress {
    pb: ProgressBar,
}

impl LoadProgress {
    pub fn start() -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_draw_target(ProgressDrawTarget::stderr());
        if let Ok(style) = ProgressStyle::default_spinner().template("  {msg} {spinner}") {
            pb.set_style(style);
        }
        pb.set_message(bright_yellow("Fetching projects and pipelines").to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self { pb }
    }

    pub fn finish(self, projects: usize) {
        self.pb
            .finish_with_message(bright_green(format!("Loaded {projects} projects ✓")).to_string());
        eprintln!();
    }

    pub fn fail(self, message: &str) {
        self.pb
            .abandon_with_message(bright_red(format!("Failed: {message}")).to_string());
        eprintln!();
    }
}
