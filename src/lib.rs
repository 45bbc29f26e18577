//! # screenshot-ocr
//!
//! Extract cleaned text lines from a folder of screenshots.
//!
//! Screenshots of apps and web pages mix scripts (English, Bengali,
//! Japanese), UI icons and decorative borders. Plain OCR output is full of
//! stray `O`/`Q` glyphs from search icons, bullets, and Japanese words broken
//! into spaced fragments. This crate runs Tesseract over each image, applies
//! an ordered table of cleaning rules, and can hand the result to an LLM for
//! a final deduplication pass.
//!
//! ## Pipeline Overview
//!
//! ```text
//! screenshots/
//!  │
//!  ├─ 1. Input     list .png/.jpg/.jpeg in filename order
//!  ├─ 2. OCR       tesseract -l eng+ben+jpn --oem 3 --psm 6 (spawn_blocking)
//!  ├─ 3. Clean     7-rule line cleaner + per-file dedup
//!  ├─ 4. Write     output.json            { "shot1.png": ["…", …], … }
//!  ├─ 5. LLM       one call per file, fallback to local lines on failure
//!  └─ 6. Write     normalized_output.json
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use screenshot_ocr::{extract_to_file, normalize_file, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default();
//!     let extracted = extract_to_file("screenshots", "output.json", &config).await?;
//!     eprintln!("{} lines kept", extracted.stats.kept_lines);
//!
//!     // Needs OPENAI_API_KEY
//!     let normalized = normalize_file("output.json", "normalized_output.json", &config).await?;
//!     eprintln!("{} files fell back", normalized.stats.fallback_files);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `shotocr` binary (clap + anyhow + tracing-subscriber + dotenvy) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{EngineMode, LanguageSet, PipelineConfig, PipelineConfigBuilder};
pub use edgequake_llm::CompletionOptions;
pub use error::{NormalizeError, ShotOcrError};
pub use extract::{
    extract_folder, extract_to_file, extract_to_file_with_engine, extract_with_engine,
};
pub use normalize::{normalize_file, normalize_file_with_client, normalize_results};
pub use output::{
    read_results, write_results, ExtractionReport, ExtractionStats, FileOutcome, ImageRecord,
    NormalizationReport, NormalizationState, NormalizationStats, ResultMap,
};
pub use pipeline::clean::{clean_line, CleaningRule, LineCleaner, RuleAction};
pub use pipeline::llm::{Completion, CompletionClient, ProviderClient, ServiceError};
pub use pipeline::ocr::{OcrEngine, TesseractEngine};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback, Stage};
