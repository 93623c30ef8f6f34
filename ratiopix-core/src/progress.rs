//! Progress reporting.

/// Width of the rendered progress bar in characters.
pub const BAR_WIDTH: usize = 30;

/// Logical progress lines.
pub const FILE_LINE: usize = 1;
pub const SERIES_LINE: usize = 2;

/// Observer for run progress. Implementations must not affect results.
pub trait ProgressReporter {
    /// Reports `progress` out of `total` on logical line `line`.
    fn update(&self, line: usize, progress: usize, total: usize, prefix: &str);

    /// Reports a status message such as run start or end.
    fn status(&self, message: &str);
}

/// Reporter that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn update(&self, _line: usize, _progress: usize, _total: usize, _prefix: &str) {}

    fn status(&self, _message: &str) {}
}

/// Renders `prefix [####......] progress/total`.
///
/// `progress` is clamped to `total`; a zero total renders an empty bar.
#[must_use]
pub fn render_bar(progress: usize, total: usize, prefix: &str) -> String {
    let done = if total == 0 {
        0
    } else {
        BAR_WIDTH * progress.min(total) / total
    };
    format!(
        "{prefix}\t[{}{}] {progress}/{total}",
        "#".repeat(done),
        ".".repeat(BAR_WIDTH - done)
    )
}
