//! The callback interface between the optimizer and its embedding program.

/// Receives lifecycle notifications from the optimizer.
///
/// `terminate` fires exactly once per run, after the workers have stopped
/// and the final population update has completed; reporting methods may be
/// called from inside it.
pub trait Monitor: Send + Sync {
    /// Notifies of the termination of the optimization with a
    /// human-readable reason.
    fn terminate(&self, reason: &str);

    /// Resets any per-run state; called when a new optimization starts on
    /// the same monitor.
    fn reset(&self) {}
}

/// A monitor that ignores every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct NopMonitor;

impl Monitor for NopMonitor {
    fn terminate(&self, _reason: &str) {}
}
