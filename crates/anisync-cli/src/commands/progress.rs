use anisync_core::{ProgressCallback, ProgressEvent};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::sync::Arc;

/// Spinner or bar for a long-running pipeline
///
/// Without a terminal the bar is hidden and progress is left to the
/// pipeline's own tracing output.
pub struct PipelineUI {
    bar: ProgressBar,
    interactive: bool,
}

impl PipelineUI {
    /// Open-ended progress, used when the total is unknown (catalog pages)
    pub fn spinner(message: &str, quiet: bool) -> Self {
        let interactive = is_interactive() && !quiet;
        let bar = if interactive {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner())
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
            );
            bar.enable_steady_tick(std::time::Duration::from_millis(120));
            bar
        } else {
            ProgressBar::hidden()
        };
        bar.set_message(message.to_string());
        Self { bar, interactive }
    }

    pub fn bar(total: u64, message: &str, quiet: bool) -> Self {
        let interactive = is_interactive() && !quiet;
        let bar = if interactive {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▉▊▋▌▍▎▏  "),
            );
            bar
        } else {
            ProgressBar::hidden()
        };
        bar.set_message(message.to_string());
        Self { bar, interactive }
    }

    /// Callback that feeds pipeline events into this bar
    pub fn callback(&self) -> ProgressCallback {
        let bar = self.bar.clone();
        let synced = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        Arc::new(move |event: ProgressEvent| match event {
            ProgressEvent::PageSynced { page, items } => {
                let total = synced.fetch_add(items, std::sync::atomic::Ordering::Relaxed) + items;
                bar.set_message(format!("page {} synced, {} entries so far", page, total));
            }
            ProgressEvent::PageFailed { page, error } => {
                bar.println(format!("  page {} failed: {}", page, error));
            }
            ProgressEvent::RateLimited { page, wait } => {
                bar.set_message(format!("rate limited on page {}, waiting {}s", page, wait.as_secs()));
            }
            ProgressEvent::BatchDone { done, total } => {
                bar.set_length(total as u64);
                bar.set_position(done as u64);
            }
        })
    }

    pub fn finish(&self, message: &str) {
        if self.interactive {
            self.bar.finish_with_message(message.to_string());
        } else {
            self.bar.finish_and_clear();
        }
    }
}

pub fn is_interactive() -> bool {
    std::io::stdout().is_terminal() && std::io::stderr().is_terminal()
}
