//! Progress reporting for sync operations.
//!
//! The library emits [`SyncProgress`] events; this module turns them into
//! structured `tracing` output for the `sync` command.

mod logging;

use cadence::sync::ProgressCallback;

pub use logging::LoggingReporter;

impl LoggingReporter {
    /// Convert to a [`ProgressCallback`] for the library.
    pub fn into_callback(self) -> ProgressCallback {
        Box::new(move |event| self.handle(event))
    }
}
