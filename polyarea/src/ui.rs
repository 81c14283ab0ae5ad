//! Application UI. For now, this is mostly progress bars.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Application UI state.
pub struct Ui {
    /// Our stacked progress bars, one per pipeline stage.
    multi_progress: MultiProgress,
}

impl Ui {
    /// Create a new UI. This sets up logging and progress bars.
    pub fn init() -> Ui {
        // Skipped files and unusable EXIF data are reported at warn level,
        // and those need to be visible without setting RUST_LOG.
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("warn"),
        )
        .init();
        Ui {
            multi_progress: MultiProgress::new(),
        }
    }

    /// Create a new progress bar with default settings.
    pub fn new_progress_bar(&self, len: u64) -> ProgressBar {
        let pb = ProgressBar::new(len).with_style(default_progress_style());
        self.multi_progress.add(pb)
    }

    /// Create a new spinner with default settings.
    pub fn new_spinner(&self) -> ProgressBar {
        let sp = ProgressBar::new_spinner().with_style(default_spinner_style());
        self.multi_progress.add(sp)
    }
}

fn default_progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  {msg:25} {pos:>4}/{len:4} {wide_bar:.cyan/blue} {eta_precise}")
        .expect("bad progress bar template")
}

fn default_spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner} {msg}")
        .expect("bad progress bar template")
}
