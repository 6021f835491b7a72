//! Progress-callback trait for per-record generation events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::GenerationConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through the CSV. The CLI drives its progress
//! bar from these; a UI can forward them anywhere it likes.
//!
//! # Example
//!
//! ```rust
//! use csv2qr::{GenerationConfig, GenerationProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl GenerationProgressCallback for CountingCallback {
//!     fn on_record_complete(&self, record: usize, total: usize, payload_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Record {}/{} done ({} byte payload)", record, total, payload_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = GenerationConfig::builder()
//!     .progress_callback(counter as Arc<dyn GenerationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the generation pipeline as it processes each record.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Records are processed one at a time, in input
/// order, so events for record `n` always finish before record `n + 1` starts.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called once after parsing, before the first record is encoded.
    ///
    /// # Arguments
    /// * `total_records` — number of records that will be processed
    fn on_generation_start(&self, total_records: usize) {
        let _ = total_records;
    }

    /// Called before the first encode attempt for a record.
    ///
    /// # Arguments
    /// * `record`        — 1-indexed record number
    /// * `total_records` — total records in the run
    fn on_record_start(&self, record: usize, total_records: usize) {
        let _ = (record, total_records);
    }

    /// Called when a record produced a verified QR raster.
    ///
    /// # Arguments
    /// * `record`        — 1-indexed record number
    /// * `total_records` — total records
    /// * `payload_len`   — byte length of the payload that was encoded
    fn on_record_complete(&self, record: usize, total_records: usize, payload_len: usize) {
        let _ = (record, total_records, payload_len);
    }

    /// Called when a record ends without a verified raster.
    ///
    /// # Arguments
    /// * `record`        — 1-indexed record number
    /// * `total_records` — total records
    /// * `error`         — human-readable error description
    fn on_record_failed(&self, record: usize, total_records: usize, error: &str) {
        let _ = (record, total_records, error);
    }

    /// Called once after every record has been attempted.
    ///
    /// # Arguments
    /// * `total_records` — total records in the run
    /// * `success_count` — records with a verified raster
    fn on_generation_complete(&self, total_records: usize, success_count: usize) {
        let _ = (total_records, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GenerationConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        failures: Mutex<Vec<(usize, String)>>,
        started_total: AtomicUsize,
        success_total: AtomicUsize,
    }

    impl GenerationProgressCallback for TrackingCallback {
        fn on_generation_start(&self, total_records: usize) {
            self.started_total.store(total_records, Ordering::SeqCst);
        }

        fn on_record_start(&self, _record: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_record_complete(&self, _record: usize, _total: usize, _payload_len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_record_failed(&self, record: usize, _total: usize, error: &str) {
            self.failures.lock().unwrap().push((record, error.to_string()));
        }

        fn on_generation_complete(&self, _total: usize, success_count: usize) {
            self.success_total.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_generation_start(5);
        cb.on_record_start(1, 5);
        cb.on_record_complete(1, 5, 42);
        cb.on_record_failed(2, 5, "blank raster");
        cb.on_generation_complete(5, 4);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_generation_start(3);
        assert_eq!(tracker.started_total.load(Ordering::SeqCst), 3);

        tracker.on_record_start(1, 3);
        tracker.on_record_complete(1, 3, 120);
        tracker.on_record_start(2, 3);
        tracker.on_record_complete(2, 3, 7);
        tracker.on_record_start(3, 3);
        tracker.on_record_failed(3, 3, "all attempts failed");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(
            *tracker.failures.lock().unwrap(),
            vec![(3, "all attempts failed".to_string())]
        );

        tracker.on_generation_complete(3, 2);
        assert_eq!(tracker.success_total.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_generation_start(10);
        cb.on_record_start(1, 10);
        cb.on_record_complete(1, 10, 512);
    }
}
