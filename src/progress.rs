//! Progress-callback trait for per-file pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as each stage walks through its files. Both stages report through
//! the same trait; `stage` tells the two apart.
//!
//! # Example
//!
//! ```rust
//! use screenshot_ocr::{PipelineConfig, PipelineProgressCallback, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, stage: Stage, file: &str, index: usize, total: usize, lines: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         println!("[{stage}] {file} ({index}/{total}): {lines} lines");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(counter as Arc<dyn PipelineProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Which pipeline stage emitted an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Extraction,
    Normalization,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Extraction => f.write_str("extract"),
            Stage::Normalization => f.write_str("normalize"),
        }
    }
}

/// Called by the pipeline as it processes each file.
///
/// Files are processed one at a time, so events arrive strictly in order.
/// All methods have default no-op implementations so callers only override
/// what they care about. `index` is 1-based.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once before the first file of a stage.
    fn on_stage_start(&self, stage: Stage, total_files: usize) {
        let _ = (stage, total_files);
    }

    /// Called before OCR (extraction) or the LLM call (normalisation).
    fn on_file_start(&self, stage: Stage, file: &str, index: usize, total: usize) {
        let _ = (stage, file, index, total);
    }

    /// Called when a file produced its final line list.
    fn on_file_complete(&self, stage: Stage, file: &str, index: usize, total: usize, lines: usize) {
        let _ = (stage, file, index, total, lines);
    }

    /// Called when normalisation failed and the file kept its original lines.
    fn on_file_fallback(&self, file: &str, index: usize, total: usize, error: &str) {
        let _ = (file, index, total, error);
    }

    /// Called once after the last file of a stage.
    ///
    /// `success_count` is every file for extraction and the normalised
    /// (non-fallback) files for normalisation.
    fn on_stage_complete(&self, stage: Stage, total_files: usize, success_count: usize) {
        let _ = (stage, total_files, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
