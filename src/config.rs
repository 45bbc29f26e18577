//! Configuration types for the extraction and normalisation stages.
//!
//! Every knob of a run lives in [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. The config is created once per run and passed by
//! reference into both stages; nothing reads the environment or global state
//! after it has been built.

use crate::error::ShotOcrError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Default model for the normalisation stage.
pub const DEFAULT_MODEL: &str = "gpt-4";

/// Default provider for the normalisation stage.
pub const DEFAULT_PROVIDER: &str = "openai";

/// Configuration for a screenshot OCR run.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use screenshot_ocr::{LanguageSet, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .languages(LanguageSet::JapaneseOnly)
///     .psm(11)
///     .request_delay_ms(500)
///     .build()
///     .unwrap();
/// assert_eq!(config.languages.as_tesseract_arg(), "jpn");
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Tesseract language packs to load. Default: [`LanguageSet::Multilingual`].
    pub languages: LanguageSet,

    /// OCR engine and page-segmentation mode. Default: `--oem 3 --psm 6`.
    ///
    /// PSM 6 ("single uniform block of text") keeps short UI labels from
    /// being dropped by the layout analysis that PSM 3 runs on screenshots.
    pub engine_mode: EngineMode,

    /// Explicit tesseract executable. Falls back to `TESSERACT_PATH`, then `PATH`.
    pub tesseract_path: Option<PathBuf>,

    /// Passed to tesseract as `--tessdata-dir` when set.
    pub tessdata_dir: Option<PathBuf>,

    /// Lines shorter than this many characters are discarded. Default: 3.
    pub min_line_chars: usize,

    /// LLM model identifier. If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None, uses [`DEFAULT_PROVIDER`].
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the normalisation call. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the model may generate per file. Default: 2048.
    pub max_tokens: usize,

    /// Pause between two successive normalisation calls, in milliseconds. Default: 1000.
    ///
    /// A flat delay keeps a sequential run under typical per-minute request
    /// limits. There is no backoff: a failed call falls back immediately.
    pub request_delay_ms: u64,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Custom normalisation instructions. If None, uses
    /// [`crate::prompts::DEFAULT_NORMALIZE_PROMPT`].
    pub instructions: Option<String>,

    /// Optional progress callback for per-file events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            languages: LanguageSet::default(),
            engine_mode: EngineMode::default(),
            tesseract_path: None,
            tessdata_dir: None,
            min_line_chars: 3,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 2048,
            request_delay_ms: 1000,
            api_timeout_secs: 60,
            instructions: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("languages", &self.languages)
            .field("engine_mode", &self.engine_mode)
            .field("tesseract_path", &self.tesseract_path)
            .field("tessdata_dir", &self.tessdata_dir)
            .field("min_line_chars", &self.min_line_chars)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_delay_ms", &self.request_delay_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Model id used for normalisation.
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Provider name used for normalisation.
    pub fn provider_name_or_default(&self) -> &str {
        self.provider_name.as_deref().unwrap_or(DEFAULT_PROVIDER)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn languages(mut self, languages: LanguageSet) -> Self {
        self.config.languages = languages;
        self
    }

    pub fn engine_mode(mut self, mode: EngineMode) -> Self {
        self.config.engine_mode = mode;
        self
    }

    pub fn oem(mut self, oem: u8) -> Self {
        self.config.engine_mode.oem = oem;
        self
    }

    pub fn psm(mut self, psm: u8) -> Self {
        self.config.engine_mode.psm = psm;
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_path = Some(path.into());
        self
    }

    pub fn tessdata_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.tessdata_dir = Some(dir.into());
        self
    }

    pub fn min_line_chars(mut self, n: usize) -> Self {
        self.config.min_line_chars = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t;
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn request_delay_ms(mut self, ms: u64) -> Self {
        self.config.request_delay_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn instructions(mut self, text: impl Into<String>) -> Self {
        self.config.instructions = Some(text.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, ShotOcrError> {
        let c = &self.config;
        if c.engine_mode.oem > 3 {
            return Err(ShotOcrError::InvalidConfig(format!(
                "OCR engine mode must be 0–3, got {}",
                c.engine_mode.oem
            )));
        }
        if c.engine_mode.psm > 13 {
            return Err(ShotOcrError::InvalidConfig(format!(
                "Page segmentation mode must be 0–13, got {}",
                c.engine_mode.psm
            )));
        }
        if c.min_line_chars == 0 {
            return Err(ShotOcrError::InvalidConfig(
                "Minimum line length must be ≥ 1".into(),
            ));
        }
        if c.languages.as_tesseract_arg().trim().is_empty() {
            return Err(ShotOcrError::InvalidConfig(
                "Language set must not be empty".into(),
            ));
        }
        if !(0.0..=2.0).contains(&c.temperature) {
            return Err(ShotOcrError::InvalidConfig(format!(
                "Temperature must be 0.0–2.0, got {}",
                c.temperature
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(ShotOcrError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Tesseract language packs loaded for recognition.
///
/// | Preset | Tesseract `-l` | Use case |
/// |--------|----------------|----------|
/// | `Multilingual` | `eng+ben+jpn` | Mixed English / Bengali / Japanese screenshots (default) |
/// | `JapaneseOnly` | `jpn` | Japanese UI captures, avoids Latin false positives |
/// | `Custom(s)` | `s` | Any `+`-joined combination of installed packs |
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LanguageSet {
    #[default]
    Multilingual,
    JapaneseOnly,
    Custom(String),
}

impl LanguageSet {
    /// The value passed to tesseract's `-l` flag.
    pub fn as_tesseract_arg(&self) -> &str {
        match self {
            LanguageSet::Multilingual => "eng+ben+jpn",
            LanguageSet::JapaneseOnly => "jpn",
            LanguageSet::Custom(s) => s,
        }
    }
}

impl fmt::Display for LanguageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tesseract_arg())
    }
}

impl FromStr for LanguageSet {
    type Err = ShotOcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "" => Err(ShotOcrError::InvalidConfig(
                "Language set must not be empty".into(),
            )),
            "multilingual" | "eng+ben+jpn" => Ok(LanguageSet::Multilingual),
            "japanese" | "jpn" => Ok(LanguageSet::JapaneseOnly),
            _ => Ok(LanguageSet::Custom(s.to_string())),
        }
    }
}

/// OCR engine mode (`--oem`) and page segmentation mode (`--psm`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineMode {
    /// 0 legacy, 1 LSTM, 2 both, 3 default for the installed traineddata.
    pub oem: u8,
    /// 0–13, see `tesseract --help-psm`.
    pub psm: u8,
}

impl Default for EngineMode {
    fn default() -> Self {
        Self { oem: 3, psm: 6 }
    }
}

impl EngineMode {
    /// Arguments appended to the tesseract command line.
    pub fn to_args(self) -> [String; 4] {
        [
            "--oem".to_string(),
            self.oem.to_string(),
            "--psm".to_string(),
            self.psm.to_string(),
        ]
    }

    /// Configuration string in tesseract's own flag syntax.
    pub fn config_string(self) -> String {
        format!("--oem {} --psm {}", self.oem, self.psm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_pipeline() {
        let c = PipelineConfig::default();
        assert_eq!(c.languages.as_tesseract_arg(), "eng+ben+jpn");
        assert_eq!(c.min_line_chars, 3);
        assert_eq!(c.temperature, 0.0);
        assert_eq!(c.request_delay_ms, 1000);
        assert_eq!(c.model_or_default(), "gpt-4");
        assert_eq!(c.provider_name_or_default(), "openai");
    }

    #[test]
    fn builder_rejects_bad_psm() {
        let err = PipelineConfig::builder().psm(14).build().unwrap_err();
        assert!(err.to_string().contains("0–13"));
    }

    #[test]
    fn builder_rejects_bad_oem() {
        assert!(PipelineConfig::builder().oem(4).build().is_err());
    }

    #[test]
    fn builder_rejects_zero_min_chars() {
        assert!(PipelineConfig::builder().min_line_chars(0).build().is_err());
    }

    #[test]
    fn builder_rejects_out_of_range_temperature() {
        assert!(PipelineConfig::builder().temperature(2.5).build().is_err());
        assert!(PipelineConfig::builder().temperature(-0.1).build().is_err());
    }

    #[test]
    fn builder_rejects_empty_custom_languages() {
        let err = PipelineConfig::builder()
            .languages(LanguageSet::Custom("  ".into()))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Language set"));
    }

    #[test]
    fn language_set_parsing() {
        assert_eq!(
            "eng+ben+jpn".parse::<LanguageSet>().unwrap(),
            LanguageSet::Multilingual
        );
        assert_eq!(
            "JPN".parse::<LanguageSet>().unwrap(),
            LanguageSet::JapaneseOnly
        );
        assert_eq!(
            "eng+kor".parse::<LanguageSet>().unwrap(),
            LanguageSet::Custom("eng+kor".into())
        );
        assert!("".parse::<LanguageSet>().is_err());
    }

    #[test]
    fn engine_mode_strings() {
        let mode = EngineMode { oem: 1, psm: 11 };
        assert_eq!(mode.config_string(), "--oem 1 --psm 11");
        assert_eq!(mode.to_args(), ["--oem", "1", "--psm", "11"].map(String::from));
    }

    #[test]
    fn debug_hides_provider() {
        let dbg = format!("{:?}", PipelineConfig::default());
        assert!(dbg.contains("PipelineConfig"));
        assert!(dbg.contains("eng+ben+jpn") || dbg.contains("Multilingual"));
    }
}
