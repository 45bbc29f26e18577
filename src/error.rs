//! Error types for the screenshot-ocr library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ShotOcrError`] — **Fatal**: the stage cannot proceed at all (missing
//!   folder, unreadable or corrupt image, tesseract not installed, output not
//!   writable, provider not configured). Returned as `Err(ShotOcrError)` from
//!   the top-level `extract*` / `normalize*` functions.
//!
//! * [`NormalizeError`] — **Non-fatal**: the LLM call for one file failed or
//!   answered with something that is not a JSON array. The file falls back to
//!   its locally cleaned lines and the error is kept in
//!   [`crate::output::FileOutcome`] so callers can report it.
//!
//! Extraction has no non-fatal variant: one bad image aborts the run.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the screenshot-ocr library.
#[derive(Debug, Error)]
pub enum ShotOcrError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The screenshot folder does not exist.
    #[error("Input folder not found: '{path}'\nCheck the path exists and is readable.")]
    InputDirNotFound { path: PathBuf },

    /// The input path exists but is a regular file.
    #[error("Input path '{path}' is not a directory")]
    NotADirectory { path: PathBuf },

    /// An image (or the folder listing) could not be read from disk.
    #[error("Failed to read '{path}': {source}")]
    ImageReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The image bytes were read but could not be decoded.
    #[error("Image '{path}' could not be decoded: {detail}")]
    ImageDecodeFailed { path: PathBuf, detail: String },

    // ── OCR errors ────────────────────────────────────────────────────────
    /// No tesseract executable on PATH or at `TESSERACT_PATH`.
    #[error(
        "tesseract executable not found: {detail}\n\n\
Install Tesseract OCR with the language packs you need, e.g.:\n\
  • Debian/Ubuntu: apt install tesseract-ocr tesseract-ocr-jpn tesseract-ocr-ben\n\
  • macOS:         brew install tesseract tesseract-lang\n\
Or set TESSERACT_PATH=/path/to/tesseract.\n"
    )]
    TesseractNotFound { detail: String },

    /// tesseract ran but reported a failure (missing language pack etc.).
    #[error("OCR failed for '{path}': {detail}")]
    OcrFailed { path: PathBuf, detail: String },

    // ── Result file errors ────────────────────────────────────────────────
    /// The intermediate results file could not be read.
    #[error("Failed to read results file '{path}': {source}")]
    ResultsReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The intermediate results file is not a filename → lines JSON object.
    #[error("Results file '{path}' is not a JSON object of string arrays: {source}")]
    ResultsParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Could not create or write an output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal normalisation error for a single file.
///
/// The file keeps its original lines when one of these occurs. The message
/// leaves out the file name; callers print it next to the error.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum NormalizeError {
    /// The provider call itself failed (network, auth, quota, …).
    #[error("LLM call failed: {detail}")]
    ServiceFailed { file: String, detail: String },

    /// The provider did not answer within the configured timeout.
    #[error("LLM call timed out after {secs}s")]
    Timeout { file: String, secs: u64 },

    /// The answer was not a JSON array of strings.
    #[error("response is not a JSON array of strings: {detail}")]
    MalformedResponse { file: String, detail: String },
}

impl NormalizeError {
    /// Name of the file the error belongs to.
    pub fn file(&self) -> &str {
        match self {
            NormalizeError::ServiceFailed { file, .. }
            | NormalizeError::Timeout { file, .. }
            | NormalizeError::MalformedResponse { file, .. } => file,
        }
    }
}
