//! Incremental progress reporting for a scan run.

use indicatif::{ProgressBar, ProgressStyle};

/// Thin wrapper over an indicatif bar. The message slot carries the running
/// count of alive endpoints.
#[derive(Debug)]
pub struct Bar {
    pb: ProgressBar,
}

impl Bar {
    /// A visible bar sized to the candidate count.
    #[must_use]
    pub fn new(count: u64) -> Self {
        let pb = ProgressBar::new(count);
        pb.set_style(
            ProgressStyle::with_template("alive: {msg:>6} {wide_bar} {pos}/{len}")
                .expect("static template is valid"),
        );
        Self { pb }
    }

    /// A bar that draws nothing, for greppable output.
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            pb: ProgressBar::hidden(),
        }
    }

    pub fn grow(&self, n: u64, message: String) {
        self.pb.set_message(message);
        self.pb.inc(n);
    }

    pub fn done(&self) {
        self.pb.finish();
    }
}
