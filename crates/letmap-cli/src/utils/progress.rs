use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use letmap::engine::progress::{Progress, ProgressCallback};
use std::time::Duration;

const SPINNER_TICK_MS: u64 = 80;

/// Renders workflow [`Progress`] events on stderr.
///
/// Each phase shows as a spinner labelled with the phase name; a task inside
/// the phase turns it into a step counter. Workers report from several
/// threads, which the shared [`ProgressBar`] handle supports directly.
#[derive(Clone)]
pub struct CliProgressHandler {
    bar: ProgressBar,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr())
            .with_style(Self::spinner_style());
        bar.finish_and_clear();
        Self { bar }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let bar = self.bar.clone();

        Box::new(move |progress: Progress| match progress {
            Progress::PhaseStart { name } => {
                bar.reset();
                bar.set_length(0);
                bar.set_prefix(name);
                bar.set_message("");
                bar.set_style(Self::spinner_style());
                bar.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
            }
            Progress::TaskStart { total } => {
                bar.disable_steady_tick();
                bar.reset();
                bar.set_length(total);
                bar.set_style(Self::step_style());
            }
            Progress::TaskIncrement { amount } => bar.inc(amount),
            Progress::TaskFinish => {
                if let Some(total) = bar.length() {
                    bar.set_position(total);
                }
            }
            Progress::PhaseFinish => {
                bar.disable_steady_tick();
                bar.set_style(Self::spinner_style());
                bar.finish_with_message("✓");
            }
        })
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {prefix:.bold} {msg}")
            .expect("Failed to create spinner style template")
    }

    fn step_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{prefix:<10.bold} [{bar:40.cyan/blue}] {human_pos}/{human_len} steps ({per_sec}, {eta})",
        )
        .expect("Failed to create step style template")
        .progress_chars("##-")
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}
