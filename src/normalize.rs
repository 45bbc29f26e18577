//! Normalisation stage: `output.json` → `normalized_output.json`.
//!
//! Every file passes through exactly one transition,
//! `Pending → {Normalized | FallbackOriginal}`. Service problems never abort
//! the stage; only reading the input, resolving the provider and writing the
//! output are fatal.

use crate::config::PipelineConfig;
use crate::error::ShotOcrError;
use crate::output::{
    read_results, write_results, NormalizationReport, NormalizationState, NormalizationStats,
    ResultMap,
};
use crate::pipeline::llm::{self, CompletionClient, ProviderClient};
use crate::progress::Stage;
use std::path::Path;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::info;

/// Normalise every entry of `results` through `client`.
///
/// Calls are sequential, with `config.request_delay_ms` between two
/// consecutive calls.
pub async fn normalize_results<C: CompletionClient>(
    results: &ResultMap,
    client: &C,
    config: &PipelineConfig,
) -> NormalizationReport {
    let total_start = Instant::now();
    let total = results.len();
    info!("Starting normalization of {} files", total);

    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(Stage::Normalization, total);
    }

    let mut normalized = ResultMap::new();
    let mut outcomes = Vec::with_capacity(total);
    let mut called_before = false;

    for (i, (filename, lines)) in results.iter().enumerate() {
        let index = i + 1;

        if called_before && config.request_delay_ms > 0 && !lines.is_empty() {
            sleep(Duration::from_millis(config.request_delay_ms)).await;
        }

        info!("Normalizing {}...", filename);
        if let Some(ref cb) = config.progress_callback {
            cb.on_file_start(Stage::Normalization, filename, index, total);
        }

        let (out, outcome) = llm::normalize_lines(client, filename, lines, config).await;
        called_before |= !lines.is_empty();

        if let Some(ref cb) = config.progress_callback {
            match &outcome.state {
                NormalizationState::Normalized => {
                    cb.on_file_complete(Stage::Normalization, filename, index, total, out.len())
                }
                NormalizationState::FallbackOriginal { reason } => {
                    cb.on_file_fallback(filename, index, total, &reason.to_string())
                }
            }
        }

        normalized.insert(filename.clone(), out);
        outcomes.push(outcome);
    }

    let fallback_files = outcomes.iter().filter(|o| o.is_fallback()).count();
    let stats = NormalizationStats {
        files: total,
        normalized_files: total - fallback_files,
        fallback_files,
        total_input_tokens: outcomes.iter().map(|o| o.input_tokens as u64).sum(),
        total_output_tokens: outcomes.iter().map(|o| o.output_tokens as u64).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Normalization complete: {}/{} files normalized, {} kept original lines, {}ms",
        stats.normalized_files, total, fallback_files, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(Stage::Normalization, total, stats.normalized_files);
    }

    NormalizationReport {
        results: normalized,
        outcomes,
        stats,
    }
}

/// Read `input_path`, normalise it with the configured provider and write `output_path`.
///
/// # Errors
/// Fatal only when the input cannot be read or parsed, the provider cannot be
/// constructed (e.g. no API key), or the output cannot be written.
pub async fn normalize_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<NormalizationReport, ShotOcrError> {
    let results = read_results(input_path.as_ref()).await?;
    let client = ProviderClient::from_config(config)?;
    normalize_map_to_file(&results, output_path, &client, config).await
}

/// Like [`normalize_file`] but with a caller-supplied client.
pub async fn normalize_file_with_client<C: CompletionClient>(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    client: &C,
    config: &PipelineConfig,
) -> Result<NormalizationReport, ShotOcrError> {
    let results = read_results(input_path.as_ref()).await?;
    normalize_map_to_file(&results, output_path, client, config).await
}

async fn normalize_map_to_file<C: CompletionClient>(
    results: &ResultMap,
    output_path: impl AsRef<Path>,
    client: &C,
    config: &PipelineConfig,
) -> Result<NormalizationReport, ShotOcrError> {
    let report = normalize_results(results, client, config).await;
    write_results(output_path.as_ref(), &report.results).await?;
    info!("Normalized data saved to {}", output_path.as_ref().display());
    Ok(report)
}
