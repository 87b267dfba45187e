//! Progress-callback trait for submit/poll events.
//!
//! Inject an [`Arc<dyn PollProgressCallback>`] via
//! [`crate::config::AnalyzerConfigBuilder::progress_callback`] to observe a
//! job as the poller drives it. Callers forward events to a terminal
//! spinner, a log, or a UI status line without the library knowing how the
//! host application communicates.
//!
//! # Example
//!
//! ```rust
//! use dua_overlay::{AnalysisStatus, AnalyzerConfig, PollProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicU32, Ordering}};
//!
//! struct CountingCallback {
//!     polls: AtomicU32,
//! }
//!
//! impl PollProgressCallback for CountingCallback {
//!     fn on_poll(&self, attempt: u32, status: AnalysisStatus) {
//!         self.polls.store(attempt, Ordering::SeqCst);
//!         eprintln!("poll {attempt}: {status:?}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { polls: AtomicU32::new(0) });
//!
//! let config = AnalyzerConfig::builder()
//!     .progress_callback(counter as Arc<dyn PollProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::model::AnalysisStatus;
use std::sync::Arc;

/// Called by the poller as a job moves towards a terminal state.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait PollProgressCallback: Send + Sync {
    /// Called once the submit call returned an operation handle.
    fn on_submitted(&self, operation_handle: &str) {
        let _ = operation_handle;
    }

    /// Called after each successful status poll.
    ///
    /// # Arguments
    /// * `attempt` — 1-indexed poll number
    /// * `status`  — status reported by the service
    fn on_poll(&self, attempt: u32, status: AnalysisStatus) {
        let _ = (attempt, status);
    }

    /// Called before a status poll is retried after a transport error.
    ///
    /// # Arguments
    /// * `attempt` — poll number being retried
    /// * `retry`   — 1-indexed retry number
    /// * `error`   — human-readable error description
    fn on_transport_retry(&self, attempt: u32, retry: u32, error: &str) {
        let _ = (attempt, retry, error);
    }

    /// Called once when polling ends, successfully or not.
    fn on_complete(&self, attempts: u32, succeeded: bool) {
        let _ = (attempts, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PollProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalyzerConfig`].
pub type ProgressCallback = Arc<dyn PollProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        polls: AtomicU32,
        retries: AtomicU32,
        completed: AtomicU32,
    }

    impl PollProgressCallback for TrackingCallback {
        fn on_poll(&self, _attempt: u32, _status: AnalysisStatus) {
            self.polls.fetch_add(1, Ordering::SeqCst);
        }

        fn on_transport_retry(&self, _attempt: u32, _retry: u32, _error: &str) {
            self.retries.fetch_add(1, Ordering::SeqCst);
        }

        fn on_complete(&self, attempts: u32, _succeeded: bool) {
            self.completed.store(attempts, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_submitted("https://example.test/op/1");
        cb.on_poll(1, AnalysisStatus::Running);
        cb.on_transport_retry(1, 1, "reset");
        cb.on_complete(1, true);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_poll(1, AnalysisStatus::Running);
        tracker.on_transport_retry(2, 1, "timeout");
        tracker.on_poll(2, AnalysisStatus::Succeeded);
        tracker.on_complete(2, true);

        assert_eq!(tracker.polls.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.retries.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.completed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_poll(3, AnalysisStatus::Failed);
    }
}
