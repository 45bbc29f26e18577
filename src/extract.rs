//! Extraction stage: screenshot folder → `output.json`.
//!
//! Files are processed strictly one after another in filename order. Any
//! error while reading, decoding or recognising an image aborts the whole
//! stage; nothing is written until every file succeeded.

use crate::config::PipelineConfig;
use crate::error::ShotOcrError;
use crate::output::{write_results, ExtractionReport, ExtractionStats, ImageRecord, ResultMap};
use crate::pipeline::clean::LineCleaner;
use crate::pipeline::input::list_images;
use crate::pipeline::ocr::{self, OcrEngine, TesseractEngine};
use crate::progress::Stage;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// OCR every image in `dir` with tesseract and clean the lines.
///
/// # Errors
/// Returns `Err(ShotOcrError)` for a missing folder, a missing tesseract,
/// and the first image that cannot be read or recognised. A folder without
/// images gives an empty report.
pub async fn extract_folder(
    dir: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<ExtractionReport, ShotOcrError> {
    let engine: Arc<dyn OcrEngine> = Arc::new(TesseractEngine::from_config(config)?);
    extract_with_engine(dir, engine, config).await
}

/// Run the extraction stage with any [`OcrEngine`].
pub async fn extract_with_engine(
    dir: impl AsRef<Path>,
    engine: Arc<dyn OcrEngine>,
    config: &PipelineConfig,
) -> Result<ExtractionReport, ShotOcrError> {
    let total_start = Instant::now();
    let dir = dir.as_ref();
    info!(
        "Starting extraction: {} (languages {}, {})",
        dir.display(),
        config.languages,
        config.engine_mode.config_string()
    );

    let images = list_images(dir).await?;
    let total = images.len();
    let cleaner = LineCleaner::from_config(config);

    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(Stage::Extraction, total);
    }

    let mut results = ResultMap::new();
    let mut records = Vec::with_capacity(total);
    let mut stats = ExtractionStats {
        files: total,
        ..Default::default()
    };

    for (i, image) in images.iter().enumerate() {
        let index = i + 1;
        info!("Processing {}...", image.filename);
        if let Some(ref cb) = config.progress_callback {
            cb.on_file_start(Stage::Extraction, &image.filename, index, total);
        }

        let raw_text = ocr::recognize(&engine, &image.path).await?;
        let cleaned = cleaner.clean_text(&raw_text);
        debug!(
            "{}: {} raw lines → {} kept ({} discarded, {} duplicates)",
            image.filename,
            cleaned.raw_lines,
            cleaned.lines.len(),
            cleaned.discarded,
            cleaned.duplicates
        );

        stats.raw_lines += cleaned.raw_lines;
        stats.kept_lines += cleaned.lines.len();
        stats.discarded_lines += cleaned.discarded;
        stats.duplicate_lines += cleaned.duplicates;

        if let Some(ref cb) = config.progress_callback {
            cb.on_file_complete(
                Stage::Extraction,
                &image.filename,
                index,
                total,
                cleaned.lines.len(),
            );
        }

        results.insert(image.filename.clone(), cleaned.lines.clone());
        records.push(ImageRecord {
            filename: image.filename.clone(),
            raw_text,
            lines: cleaned.lines,
            discarded: cleaned.discarded,
            duplicates: cleaned.duplicates,
        });
    }

    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Extraction complete: {} files, {} lines kept, {}ms",
        total, stats.kept_lines, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(Stage::Extraction, total, total);
    }

    Ok(ExtractionReport {
        results,
        records,
        stats,
    })
}

/// Run the extraction stage and write `output_path` once every file is done.
pub async fn extract_to_file(
    dir: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<ExtractionReport, ShotOcrError> {
    let engine: Arc<dyn OcrEngine> = Arc::new(TesseractEngine::from_config(config)?);
    extract_to_file_with_engine(dir, output_path, engine, config).await
}

/// Like [`extract_to_file`] but with a caller-supplied [`OcrEngine`].
pub async fn extract_to_file_with_engine(
    dir: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    engine: Arc<dyn OcrEngine>,
    config: &PipelineConfig,
) -> Result<ExtractionReport, ShotOcrError> {
    let report = extract_with_engine(dir, engine, config).await?;
    write_results(output_path.as_ref(), &report.results).await?;
    info!("Results saved in {}", output_path.as_ref().display());
    Ok(report)
}
