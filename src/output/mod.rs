mod dashboard;
mod progress;
mod styling;
mod tables;

pub use dashboard::{print_dashboard, render_dashboard, render_jobs};
pub use progress::LoadProgress;
pub use styling::{bright_green, dim, magenta_bold, status as status_text};

/// Prints the pipedash banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🚦 pipedash"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("CI/CD Pipeline Dashboard")
    );
}
