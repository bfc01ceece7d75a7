use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;

/// Count progress bar over dispatched PURLs. Hidden unless stderr is a terminal
/// or when `enabled` is false.
pub fn create_count_progress_bar(total_items: u64, enabled: bool) -> ProgressBar {
    if !enabled || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(total_items);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .expect("Failed to create progress style")
            .progress_chars("#>-")
    );
    pb
}
