//! Progress bar for a running update.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use updater_core::{ProgressReport, UpdateState};

const BAR_TEMPLATE: &str =
    "{spinner} {msg:12} [{bar:40}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const SPINNER_TEMPLATE: &str = "{spinner} {msg:12} {bytes} ({bytes_per_sec})";

/// Spawns the progress bar when requested.
///
/// The task ends once both channels close, which happens when the workflow
/// finishes. Returns `None` when `use_bar` is false.
pub(crate) fn spawn_progress_ui(
    use_bar: bool,
    progress: watch::Receiver<ProgressReport>,
    state: watch::Receiver<UpdateState>,
) -> Option<JoinHandle<()>> {
    if !use_bar {
        return None;
    }
    Some(tokio::spawn(run_progress_bar(progress, state)))
}

async fn run_progress_bar(
    mut progress: watch::Receiver<ProgressReport>,
    mut state: watch::Receiver<UpdateState>,
) {
    let bar = ProgressBar::new_spinner();
    bar.set_style(spinner_style());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar.set_message(state.borrow().to_string());

    let mut progress_open = true;
    let mut state_open = true;
    while progress_open || state_open {
        tokio::select! {
            changed = progress.changed(), if progress_open => {
                if changed.is_err() {
                    progress_open = false;
                    continue;
                }
                let report = *progress.borrow_and_update();
                apply_report(&bar, &report);
            }
            changed = state.changed(), if state_open => {
                if changed.is_err() {
                    state_open = false;
                    continue;
                }
                let current = *state.borrow_and_update();
                bar.set_message(current.to_string());
            }
        }
    }

    bar.finish_and_clear();
}

fn apply_report(bar: &ProgressBar, report: &ProgressReport) {
    if let Some(total) = report.total
        && bar.length() != Some(total)
    {
        bar.set_length(total);
        bar.set_style(bar_style());
    }
    bar.set_position(report.bytes_transferred);
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .map(|style| style.progress_chars("=> "))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}
