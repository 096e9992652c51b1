//! Progress-callback trait for per-page and per-chunk extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events while the pipeline walks the document. The pipeline is sequential,
//! so events arrive strictly in page order and, within a page, in chunk order.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2rows::{ExtractionProgressCallback, ExtractionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct RowCounter {
//!     rows: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for RowCounter {
//!     fn on_chunk_complete(&self, page_num: usize, chunk: usize, rows: usize) {
//!         let total = self.rows.fetch_add(rows, Ordering::SeqCst) + rows;
//!         eprintln!("page {page_num} chunk {chunk}: +{rows} (total {total})");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(RowCounter { rows: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the extraction pipeline as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync` so a config
/// holding one can be shared freely.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before the first page is acquired.
    ///
    /// # Arguments
    /// * `total_pages` — number of selected pages that will be visited
    fn on_extraction_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before a page's text is acquired.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page yields no text after every fallback.
    fn on_page_skipped(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called after one chunk's reply has been parsed.
    ///
    /// # Arguments
    /// * `page_num` — 1-indexed page number
    /// * `chunk`    — 1-indexed chunk number within the page
    /// * `rows`     — rows recovered from the reply (possibly 0)
    fn on_chunk_complete(&self, page_num: usize, chunk: usize, rows: usize) {
        let _ = (page_num, chunk, rows);
    }

    /// Called when a chunk's model call fails.
    fn on_chunk_error(&self, page_num: usize, chunk: usize, error: &str) {
        let _ = (page_num, chunk, error);
    }

    /// Called after every chunk of a page has been processed.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, rows: usize) {
        let _ = (page_num, total_pages, rows);
    }

    /// Called once after normalization and deduplication.
    ///
    /// # Arguments
    /// * `total_pages` — number of selected pages
    /// * `rows`        — rows in the final output table
    fn on_extraction_complete(&self, total_pages: usize, rows: usize) {
        let _ = (total_pages, rows);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        pages: AtomicUsize,
        skipped: AtomicUsize,
        rows: AtomicUsize,
        errors: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_page_start(&self, _page_num: usize, _total_pages: usize) {
            self.pages.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_skipped(&self, _page_num: usize, _total_pages: usize) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }

        fn on_chunk_complete(&self, _page_num: usize, _chunk: usize, rows: usize) {
            self.rows.fetch_add(rows, Ordering::SeqCst);
        }

        fn on_chunk_error(&self, _page_num: usize, _chunk: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_extraction_start(5);
        cb.on_page_start(1, 5);
        cb.on_chunk_complete(1, 1, 3);
        cb.on_chunk_error(1, 2, "timeout");
        cb.on_page_skipped(2, 5);
        cb.on_page_complete(1, 5, 3);
        cb.on_extraction_complete(5, 3);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_page_start(1, 2);
        tracker.on_chunk_complete(1, 1, 4);
        tracker.on_chunk_complete(1, 2, 0);
        tracker.on_page_start(2, 2);
        tracker.on_page_skipped(2, 2);
        tracker.on_chunk_error(1, 3, "503");

        assert_eq!(tracker.pages.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.skipped.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.rows.load(Ordering::SeqCst), 4);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_extraction_start(10);
        cb.on_page_complete(1, 10, 12);
    }
}
