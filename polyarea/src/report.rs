//! Diagnostic reporting for the measurement pipeline.

use log::{info, warn};

/// Sink for warnings and diagnostics emitted while processing annotations.
///
/// Production code routes everything through the `log` facade; tests
/// substitute a collecting implementation so they can assert on what was
/// emitted without capturing process output.
pub trait Reporter {
    /// Report a recoverable problem with an input file.
    fn warning(&self, message: &str);

    /// Report a discarded or ignored detection.
    fn diagnostic(&self, message: &str);
}

/// Forwards all reports to the `log` facade.
pub struct LogReporter;

impl Reporter for LogReporter {
    fn warning(&self, message: &str) {
        warn!("{}", message);
    }

    fn diagnostic(&self, message: &str) {
        info!("{}", message);
    }
}
