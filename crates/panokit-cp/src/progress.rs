/// Receiver of progress notifications from the long running passes.
///
/// The passes poll [`ProgressReporter::is_cancelled`] between units of work and
/// stop with [`crate::CleanError::Cancelled`] once it returns `true`.
pub trait ProgressReporter {
    /// Called before each unit of work; `step` counts from zero up to `total`.
    fn report_progress(&mut self, step: usize, total: usize);

    /// Whether the caller asked to stop.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// A reporter that ignores progress and never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report_progress(&mut self, _step: usize, _total: usize) {}
}
