use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(120));
    let style = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template("{spinner:.blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb
}

/// Run a blocking engine round-trip behind a spinner.
///
/// The spinner is cleared once `op` returns so the command's own output
/// starts on a clean line.
pub fn with_spinner<T, E, F>(msg: &str, op: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
{
    let pb = create_spinner(msg);
    let result = op();
    pb.finish_and_clear();
    result
}
