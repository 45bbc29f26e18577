//! Result types and the JSON files that hand results between stages.
//!
//! Both `output.json` and `normalized_output.json` have the same shape: a
//! JSON object from image filename to an array of line strings. A
//! [`ResultMap`] is a `BTreeMap`, so keys always serialise in lexicographic
//! order and two runs over the same folder produce byte-identical files.

use crate::error::{NormalizeError, ShotOcrError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Filename → cleaned lines, in first-occurrence order.
pub type ResultMap = BTreeMap<String, Vec<String>>;

/// One screenshot after OCR and local cleaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub filename: String,
    /// Text exactly as tesseract returned it.
    pub raw_text: String,
    /// Cleaned, deduplicated lines.
    pub lines: Vec<String>,
    /// Non-blank raw lines the cleaner rejected.
    pub discarded: usize,
    /// Cleaned lines dropped because an identical line came earlier.
    pub duplicates: usize,
}

/// Aggregate counters for an extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub files: usize,
    pub raw_lines: usize,
    pub kept_lines: usize,
    pub discarded_lines: usize,
    pub duplicate_lines: usize,
    pub total_duration_ms: u64,
}

/// Everything an extraction run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub results: ResultMap,
    pub records: Vec<ImageRecord>,
    pub stats: ExtractionStats,
}

/// Where a file ended up after the normalisation stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizationState {
    /// The model's answer replaced the local lines.
    Normalized,
    /// The call failed; the local lines were kept unchanged.
    FallbackOriginal { reason: NormalizeError },
}

/// Per-file normalisation outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub filename: String,
    pub state: NormalizationState,
    pub lines_in: usize,
    pub lines_out: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
}

impl FileOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self.state, NormalizationState::FallbackOriginal { .. })
    }
}

/// Aggregate counters for a normalisation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationStats {
    pub files: usize,
    pub normalized_files: usize,
    pub fallback_files: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
}

/// Everything a normalisation run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationReport {
    pub results: ResultMap,
    pub outcomes: Vec<FileOutcome>,
    pub stats: NormalizationStats,
}

/// Serialise a result map as pretty JSON (2-space indent, UTF-8, trailing newline).
///
/// `serde_json` writes non-ASCII characters verbatim, so Japanese and
/// Bengali text stays readable in the file.
pub fn to_json(results: &ResultMap) -> Result<String, ShotOcrError> {
    let mut json = serde_json::to_string_pretty(results)
        .map_err(|e| ShotOcrError::Internal(format!("serialise results: {e}")))?;
    json.push('\n');
    Ok(json)
}

/// Read a results file written by either stage.
pub async fn read_results(path: impl AsRef<Path>) -> Result<ResultMap, ShotOcrError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ShotOcrError::ResultsReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    let map: ResultMap =
        serde_json::from_str(&text).map_err(|e| ShotOcrError::ResultsParseFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    debug!("Read {} entries from {}", map.len(), path.display());
    Ok(map)
}

/// Write a results file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_results(
    path: impl AsRef<Path>,
    results: &ResultMap,
) -> Result<(), ShotOcrError> {
    let path = path.as_ref();
    let json = to_json(results)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ShotOcrError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| ShotOcrError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| ShotOcrError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    debug!("Wrote {} entries to {}", results.len(), path.display());
    Ok(())
}
