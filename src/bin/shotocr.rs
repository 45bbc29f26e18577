//! CLI binary for screenshot-ocr.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints per-file progress.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use screenshot_ocr::{
    extract_to_file, normalize_file, LanguageSet, PipelineConfig, PipelineProgressCallback,
    ProgressCallback, Stage,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback ────────────────────────────────────────────────────

/// Prints one stdout line per file and, when enabled, keeps an indicatif bar
/// on stderr. Per-file lines go through `bar.suspend` so they never tear the
/// bar.
struct CliProgressCallback {
    bar: Option<ProgressBar>,
    fallbacks: AtomicUsize,
}

impl CliProgressCallback {
    fn new(with_bar: bool) -> Arc<Self> {
        let bar = with_bar.then(|| {
            let bar = ProgressBar::new(0);
            let style = ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} files  \
                 ⏱ {elapsed_precise}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
            bar.set_style(style);
            bar
        });
        Arc::new(Self {
            bar,
            fallbacks: AtomicUsize::new(0),
        })
    }

    fn say(&self, line: String) {
        match self.bar {
            Some(ref bar) => bar.suspend(|| println!("{line}")),
            None => println!("{line}"),
        }
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage, total_files: usize) {
        self.fallbacks.store(0, Ordering::SeqCst);
        if let Some(ref bar) = self.bar {
            bar.reset();
            bar.set_length(total_files as u64);
            bar.set_position(0);
            bar.set_prefix(match stage {
                Stage::Extraction => "OCR",
                Stage::Normalization => "LLM",
            });
            bar.enable_steady_tick(Duration::from_millis(80));
        }
    }

    fn on_file_start(&self, stage: Stage, file: &str, _index: usize, _total: usize) {
        let verb = match stage {
            Stage::Extraction => "Processing",
            Stage::Normalization => "Normalizing",
        };
        self.say(format!("{verb} {file}..."));
        if let Some(ref bar) = self.bar {
            bar.set_message(file.to_string());
        }
    }

    fn on_file_complete(&self, _stage: Stage, file: &str, index: usize, total: usize, lines: usize) {
        self.say(format!(
            "  {} {:>3}/{:<3} {}  {}",
            green("✓"),
            index,
            total,
            file,
            dim(&format!("{lines} lines")),
        ));
        if let Some(ref bar) = self.bar {
            bar.inc(1);
        }
    }

    fn on_file_fallback(&self, file: &str, index: usize, total: usize, error: &str) {
        self.fallbacks.fetch_add(1, Ordering::SeqCst);

        // Truncate very long provider messages to keep output tidy.
        let msg: String = if error.chars().count() > 100 {
            format!("{}\u{2026}", error.chars().take(99).collect::<String>())
        } else {
            error.to_string()
        };

        self.say(format!(
            "  {} {:>3}/{:<3} {}  {}  {}",
            red("✗"),
            index,
            total,
            file,
            red(&msg),
            dim("(kept original lines)"),
        ));
        if let Some(ref bar) = self.bar {
            bar.inc(1);
        }
    }

    fn on_stage_complete(&self, stage: Stage, total_files: usize, success_count: usize) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
        match stage {
            Stage::Extraction => eprintln!(
                "{} {} files processed",
                green("✔"),
                bold(&success_count.to_string())
            ),
            Stage::Normalization => {
                let fallbacks = self.fallbacks.load(Ordering::SeqCst);
                if fallbacks == 0 {
                    eprintln!(
                        "{} {} files normalized",
                        green("✔"),
                        bold(&success_count.to_string())
                    );
                } else {
                    eprintln!(
                        "{} {}/{} files normalized  ({} kept original lines)",
                        cyan("⚠"),
                        bold(&success_count.to_string()),
                        total_files,
                        red(&fallbacks.to_string()),
                    );
                }
            }
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Both stages with the default file names
  shotocr

  # OCR only, Japanese screenshots, sparse-text segmentation
  shotocr extract --languages jpn --psm 11

  # LLM pass over an existing output.json
  shotocr normalize --model gpt-4o-mini --delay-ms 500

  # Custom folders and files
  shotocr run --input ~/Pictures/captures --intermediate ocr.json --output clean.json

FILES:
  screenshots/             input images (.png, .jpg, .jpeg; any case)
  output.json              extraction result: { "file.png": ["line", …], … }
  normalized_output.json   normalization result, same shape

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY     OpenAI API key (a .env file in the working directory is loaded)
  SHOTOCR_PROVIDER   LLM provider (openai, anthropic, gemini, ollama, …)
  SHOTOCR_MODEL      LLM model ID (default gpt-4)
  TESSERACT_PATH     tesseract executable to use instead of the one on PATH
  TESSDATA_PREFIX    tesseract language data directory
  RUST_LOG           tracing filter, overrides --verbose / --quiet

SETUP:
  1. Install tesseract with the language packs you need:
       apt install tesseract-ocr tesseract-ocr-jpn tesseract-ocr-ben
  2. Put screenshots in ./screenshots and run: shotocr extract
  3. Optional LLM pass: echo OPENAI_API_KEY=sk-... > .env && shotocr normalize
"#;

/// Extract and clean text lines from screenshots with Tesseract OCR.
#[derive(Parser, Debug)]
#[command(
    name = "shotocr",
    version,
    about = "Extract and clean text lines from screenshots with Tesseract OCR",
    long_about = "Run Tesseract OCR over a folder of screenshots, clean OCR noise with \
heuristic line rules, and optionally let an LLM deduplicate and tidy the lines. \
Without a subcommand both stages run with the default file names.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "SHOTOCR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "SHOTOCR_QUIET")]
    quiet: bool,

    /// Disable the progress bar (per-file lines are still printed).
    #[arg(long, global = true, env = "SHOTOCR_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// OCR a screenshot folder into output.json.
    Extract(ExtractArgs),
    /// Send output.json through the LLM into normalized_output.json.
    Normalize(NormalizeArgs),
    /// Run extract, then normalize.
    Run(RunArgs),
}

/// OCR settings shared by `extract` and `run`.
#[derive(Args, Debug)]
struct OcrArgs {
    /// Folder with .png / .jpg / .jpeg screenshots.
    #[arg(short, long, env = "SHOTOCR_INPUT", default_value = "screenshots")]
    input: PathBuf,

    /// Tesseract languages: multilingual (eng+ben+jpn), jpn, or any `+`-joined list.
    #[arg(short, long, env = "SHOTOCR_LANGUAGES", default_value = "eng+ben+jpn")]
    languages: String,

    /// Tesseract OCR engine mode (0–3).
    #[arg(long, env = "SHOTOCR_OEM", default_value_t = 3,
          value_parser = clap::value_parser!(u8).range(0..=3))]
    oem: u8,

    /// Tesseract page segmentation mode (0–13).
    #[arg(long, env = "SHOTOCR_PSM", default_value_t = 6,
          value_parser = clap::value_parser!(u8).range(0..=13))]
    psm: u8,

    /// Discard cleaned lines shorter than this many characters.
    #[arg(long, env = "SHOTOCR_MIN_CHARS", default_value_t = 3)]
    min_chars: usize,

    /// Tesseract language data directory.
    #[arg(long, env = "TESSDATA_PREFIX")]
    tessdata_dir: Option<PathBuf>,

    /// Tesseract executable.
    #[arg(long, env = "TESSERACT_PATH")]
    tesseract: Option<PathBuf>,
}

/// LLM settings shared by `normalize` and `run`.
#[derive(Args, Debug)]
struct LlmArgs {
    /// LLM model ID.
    #[arg(long, env = "SHOTOCR_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, …
    #[arg(long, env = "SHOTOCR_PROVIDER")]
    provider: Option<String>,

    /// Pause between two LLM calls, in milliseconds.
    #[arg(long, env = "SHOTOCR_DELAY_MS", default_value_t = 1000)]
    delay_ms: u64,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "SHOTOCR_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Max LLM output tokens per file.
    #[arg(long, env = "SHOTOCR_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// Per-file LLM call timeout in seconds.
    #[arg(long, env = "SHOTOCR_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Path to a text file with custom cleaning instructions.
    #[arg(long, env = "SHOTOCR_INSTRUCTIONS")]
    instructions: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    #[command(flatten)]
    ocr: OcrArgs,

    /// Where to write the extraction result.
    #[arg(short, long, default_value = "output.json")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct NormalizeArgs {
    /// Extraction result to normalize.
    #[arg(short, long, default_value = "output.json")]
    input: PathBuf,

    /// Where to write the normalized result.
    #[arg(short, long, default_value = "normalized_output.json")]
    output: PathBuf,

    #[command(flatten)]
    llm: LlmArgs,
}

#[derive(Parser, Debug)]
struct RunArgs {
    #[command(flatten)]
    ocr: OcrArgs,

    /// Where to write the extraction result.
    #[arg(long, default_value = "output.json")]
    intermediate: PathBuf,

    /// Where to write the normalized result.
    #[arg(short, long, default_value = "normalized_output.json")]
    output: PathBuf,

    #[command(flatten)]
    llm: LlmArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before parsing so env-backed flags and OPENAI_API_KEY see it.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar and per-file lines cover what the user needs.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress: Option<ProgressCallback> = if cli.quiet {
        None
    } else {
        Some(CliProgressCallback::new(show_progress) as Arc<dyn PipelineProgressCallback>)
    };

    let command = cli
        .command
        .unwrap_or_else(|| Command::Run(RunArgs::parse_from(["shotocr"])));

    match command {
        Command::Extract(args) => {
            let config = build_config(Some(&args.ocr), None, progress).await?;
            run_extract(&args.ocr.input, &args.output, &config, cli.quiet).await?;
        }
        Command::Normalize(args) => {
            let config = build_config(None, Some(&args.llm), progress).await?;
            run_normalize(&args.input, &args.output, &config, cli.quiet).await?;
        }
        Command::Run(args) => {
            let config = build_config(Some(&args.ocr), Some(&args.llm), progress).await?;
            run_extract(&args.ocr.input, &args.intermediate, &config, cli.quiet).await?;
            run_normalize(&args.intermediate, &args.output, &config, cli.quiet).await?;
        }
    }

    Ok(())
}

async fn run_extract(
    input: &Path,
    output: &Path,
    config: &PipelineConfig,
    quiet: bool,
) -> Result<()> {
    let report = extract_to_file(input, output, config)
        .await
        .context("Extraction failed")?;

    if !quiet {
        eprintln!(
            "{}  {} files  {} lines kept  {}  {}ms  →  {}",
            green("✔"),
            report.stats.files,
            report.stats.kept_lines,
            dim(&format!(
                "({} discarded, {} duplicates)",
                report.stats.discarded_lines, report.stats.duplicate_lines
            )),
            report.stats.total_duration_ms,
            bold(&output.display().to_string()),
        );
    }
    Ok(())
}

async fn run_normalize(
    input: &Path,
    output: &Path,
    config: &PipelineConfig,
    quiet: bool,
) -> Result<()> {
    let report = normalize_file(input, output, config)
        .await
        .context("Normalization failed")?;

    if !quiet {
        eprintln!(
            "{}  {}/{} files normalized  {}ms  →  {}",
            if report.stats.fallback_files == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            report.stats.normalized_files,
            report.stats.files,
            report.stats.total_duration_ms,
            bold(&output.display().to_string()),
        );
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&report.stats.total_input_tokens.to_string()),
            dim(&report.stats.total_output_tokens.to_string()),
        );
    }
    Ok(())
}

/// Map CLI args to `PipelineConfig`.
async fn build_config(
    ocr: Option<&OcrArgs>,
    llm: Option<&LlmArgs>,
    progress: Option<ProgressCallback>,
) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder();

    if let Some(ocr) = ocr {
        let languages: LanguageSet = ocr.languages.parse().context("Invalid --languages")?;
        builder = builder
            .languages(languages)
            .oem(ocr.oem)
            .psm(ocr.psm)
            .min_line_chars(ocr.min_chars);
        if let Some(ref dir) = ocr.tessdata_dir {
            builder = builder.tessdata_dir(dir);
        }
        if let Some(ref exe) = ocr.tesseract {
            builder = builder.tesseract_path(exe);
        }
    }

    if let Some(llm) = llm {
        builder = builder
            .request_delay_ms(llm.delay_ms)
            .temperature(llm.temperature)
            .max_tokens(llm.max_tokens)
            .api_timeout_secs(llm.api_timeout);
        if let Some(ref model) = llm.model {
            builder = builder.model(model);
        }
        if let Some(ref provider) = llm.provider {
            builder = builder.provider_name(provider);
        }
        if let Some(ref path) = llm.instructions {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read instructions from {:?}", path))?;
            builder = builder.instructions(text);
        }
    }

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
