//! OCR: turn one screenshot into raw multi-line text.
//!
//! The stage talks to OCR through the [`OcrEngine`] trait so the orchestration
//! can be tested with canned text. [`TesseractEngine`] is the real
//! implementation and shells out to the `tesseract` CLI:
//!
//! ```text
//! tesseract <staged.png> stdout -l eng+ben+jpn --oem 3 --psm 6 [--tessdata-dir DIR]
//! ```
//!
//! ## Why decode first?
//!
//! The image is decoded with the `image` crate and re-encoded as a temporary
//! PNG before tesseract sees it. A truncated or mislabelled file then fails
//! with [`ShotOcrError::ImageDecodeFailed`] naming the file, instead of a
//! leptonica message on stderr.
//!
//! ## Why spawn_blocking?
//!
//! Decoding and the tesseract process are both blocking. [`recognize`] moves
//! the work onto tokio's blocking pool; the stage still awaits one file at a
//! time.

use crate::config::{EngineMode, LanguageSet, PipelineConfig};
use crate::error::ShotOcrError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Environment variable that overrides the tesseract executable location.
pub const TESSERACT_PATH_ENV: &str = "TESSERACT_PATH";

/// Anything that can read the text out of an image file.
pub trait OcrEngine: Send + Sync {
    /// Return the raw recognised text of `image`, lines separated by `\n`.
    fn recognize(&self, image: &Path) -> Result<String, ShotOcrError>;
}

/// Run `engine` on `image` inside `spawn_blocking`.
pub async fn recognize(
    engine: &Arc<dyn OcrEngine>,
    image: &Path,
) -> Result<String, ShotOcrError> {
    let engine = Arc::clone(engine);
    let path = image.to_path_buf();
    tokio::task::spawn_blocking(move || engine.recognize(&path))
        .await
        .map_err(|e| ShotOcrError::Internal(format!("OCR task panicked: {}", e)))?
}

/// OCR through the `tesseract` command-line tool.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    executable: PathBuf,
    languages: LanguageSet,
    mode: EngineMode,
    tessdata_dir: Option<PathBuf>,
}

impl TesseractEngine {
    /// Locate tesseract and capture the OCR settings of `config`.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ShotOcrError> {
        let executable = locate_tesseract(config.tesseract_path.as_deref())?;
        debug!("Using tesseract at {}", executable.display());
        Ok(Self {
            executable,
            languages: config.languages.clone(),
            mode: config.engine_mode,
            tessdata_dir: config.tessdata_dir.clone(),
        })
    }

    /// Build an engine around a known executable without probing the system.
    pub fn with_executable(
        executable: impl Into<PathBuf>,
        languages: LanguageSet,
        mode: EngineMode,
    ) -> Self {
        Self {
            executable: executable.into(),
            languages,
            mode,
            tessdata_dir: None,
        }
    }

    pub fn tessdata_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tessdata_dir = Some(dir.into());
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Command-line arguments for recognising `input` to stdout.
    pub fn command_args(&self, input: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            input.as_os_str().to_owned(),
            "stdout".into(),
            "-l".into(),
            self.languages.as_tesseract_arg().into(),
        ];
        args.extend(self.mode.to_args().into_iter().map(OsString::from));
        if let Some(ref dir) = self.tessdata_dir {
            args.push("--tessdata-dir".into());
            args.push(dir.as_os_str().to_owned());
        }
        args
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &Path) -> Result<String, ShotOcrError> {
        let staged = stage_image(image)?;

        let output = Command::new(&self.executable)
            .args(self.command_args(staged.path()))
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ShotOcrError::TesseractNotFound {
                    detail: format!("{}: {}", self.executable.display(), e),
                },
                _ => ShotOcrError::OcrFailed {
                    path: image.to_path_buf(),
                    detail: format!("could not start tesseract: {e}"),
                },
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(ShotOcrError::OcrFailed {
                path: image.to_path_buf(),
                detail: stderr.trim().to_string(),
            });
        }
        if !stderr.trim().is_empty() {
            // tesseract prints resolution estimates and similar notes on success
            debug!("tesseract: {}", stderr.trim());
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(
            "OCR {} → {} bytes, {} lines",
            image.display(),
            text.len(),
            text.lines().count()
        );
        Ok(text)
    }
}

/// Find the tesseract executable: explicit path, then `TESSERACT_PATH`, then `PATH`.
pub fn locate_tesseract(explicit: Option<&Path>) -> Result<PathBuf, ShotOcrError> {
    if let Some(path) = explicit {
        return which::which(path).map_err(|e| ShotOcrError::TesseractNotFound {
            detail: format!("{}: {}", path.display(), e),
        });
    }

    if let Ok(env_path) = std::env::var(TESSERACT_PATH_ENV) {
        if !env_path.is_empty() {
            return which::which(&env_path).map_err(|e| ShotOcrError::TesseractNotFound {
                detail: format!("{TESSERACT_PATH_ENV}={env_path}: {e}"),
            });
        }
    }

    which::which("tesseract").map_err(|e| ShotOcrError::TesseractNotFound {
        detail: e.to_string(),
    })
}

/// Decode `image` and write it back out as a temporary PNG.
fn stage_image(image: &Path) -> Result<NamedTempFile, ShotOcrError> {
    let read_failed = |source| ShotOcrError::ImageReadFailed {
        path: image.to_path_buf(),
        source,
    };
    // Sniff the content so a JPEG saved as .png still decodes.
    let decoded = image::ImageReader::open(image)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(read_failed)?
        .decode()
        .map_err(|e| match e {
            image::ImageError::IoError(source) => read_failed(source),
            other => ShotOcrError::ImageDecodeFailed {
                path: image.to_path_buf(),
                detail: other.to_string(),
            },
        })?;
    debug!(
        "Decoded {} → {}x{} px",
        image.display(),
        decoded.width(),
        decoded.height()
    );

    let staged = NamedTempFile::with_suffix(".png")
        .map_err(|e| ShotOcrError::Internal(format!("tempfile: {e}")))?;
    decoded
        .save_with_format(staged.path(), image::ImageFormat::Png)
        .map_err(|e| {
            warn!("Could not stage {} for OCR: {}", image.display(), e);
            ShotOcrError::OcrFailed {
                path: image.to_path_buf(),
                detail: format!("could not stage image: {e}"),
            }
        })?;
    Ok(staged)
}
