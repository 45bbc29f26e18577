//! LLM interaction: ask the model to tidy one file's line list.
//!
//! The stage talks to the model through [`CompletionClient`]; the production
//! [`ProviderClient`] wraps an `edgequake_llm` provider. All prompt text lives
//! in [`crate::prompts`].
//!
//! ## Failure Strategy
//!
//! There is no retry. A provider error, a timeout or an answer that is not a
//! JSON array of strings each end in
//! [`NormalizationState::FallbackOriginal`]: the file keeps the lines it came
//! in with and the run moves on to the next file.

use crate::config::PipelineConfig;
use crate::error::{NormalizeError, ShotOcrError};
use crate::output::{FileOutcome, NormalizationState};
use crate::pipeline::clean::dedup_lines;
use crate::prompts::normalize_prompt;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

/// One completion returned by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Error text reported by a [`CompletionClient`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ServiceError(pub String);

/// A text-completion service: prompt in, completion out.
pub trait CompletionClient: Send + Sync {
    fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> impl Future<Output = Result<Completion, ServiceError>> + Send;
}

/// [`CompletionClient`] backed by an `edgequake_llm` provider.
#[derive(Clone)]
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
}

impl ProviderClient {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }

    /// Resolve the provider described by `config`.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ShotOcrError> {
        resolve_provider(config).map(Self::new)
    }
}

impl CompletionClient for ProviderClient {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<Completion, ServiceError> {
        let messages = vec![ChatMessage::user(prompt)];
        let response = self
            .provider
            .chat(&messages, Some(options))
            .await
            .map_err(|e| ServiceError(e.to_string()))?;
        Ok(Completion {
            content: response.content,
            input_tokens: response.prompt_tokens as usize,
            output_tokens: response.completion_tokens as usize,
        })
    }
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — used as-is.
/// 2. **Named provider + model** (`config.provider_name`, default `openai`
///    and `gpt-4`) — built by [`ProviderFactory::create_llm_provider`], which
///    reads the provider's API key from the environment.
///
/// A missing `OPENAI_API_KEY` for the OpenAI provider is reported here,
/// before the first file, rather than as one failed call per file.
pub fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, ShotOcrError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let name = config.provider_name_or_default();
    let model = config.model_or_default();

    if name.eq_ignore_ascii_case("openai") {
        let key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        if key.trim().is_empty() {
            return Err(ShotOcrError::ProviderNotConfigured {
                provider: name.to_string(),
                hint: "Set OPENAI_API_KEY in the environment or in a .env file.".to_string(),
            });
        }
    }

    debug!("Creating LLM provider {} / {}", name, model);
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        ShotOcrError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Normalise one file's lines.
///
/// Returns the lines to store for the file and the outcome record. On any
/// failure the returned lines are exactly `lines`.
pub async fn normalize_lines<C: CompletionClient>(
    client: &C,
    filename: &str,
    lines: &[String],
    config: &PipelineConfig,
) -> (Vec<String>, FileOutcome) {
    let start = Instant::now();

    if lines.is_empty() {
        debug!("{}: no lines, skipping LLM call", filename);
        return (
            Vec::new(),
            FileOutcome {
                filename: filename.to_string(),
                state: NormalizationState::Normalized,
                lines_in: 0,
                lines_out: 0,
                input_tokens: 0,
                output_tokens: 0,
                duration_ms: 0,
            },
        );
    }

    let prompt = normalize_prompt(config.instructions.as_deref(), lines);
    let options = build_options(config);

    let result = match timeout(
        Duration::from_secs(config.api_timeout_secs),
        client.complete(&prompt, &options),
    )
    .await
    {
        Err(_) => Err((
            NormalizeError::Timeout {
                file: filename.to_string(),
                secs: config.api_timeout_secs,
            },
            (0, 0),
        )),
        Ok(Err(e)) => Err((
            NormalizeError::ServiceFailed {
                file: filename.to_string(),
                detail: e.to_string(),
            },
            (0, 0),
        )),
        Ok(Ok(completion)) => {
            let tokens = (completion.input_tokens, completion.output_tokens);
            match parse_line_array(&completion.content) {
                Ok(parsed) => Ok((parsed, tokens)),
                Err(detail) => Err((
                    NormalizeError::MalformedResponse {
                        file: filename.to_string(),
                        detail,
                    },
                    tokens,
                )),
            }
        }
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok((parsed, (input_tokens, output_tokens))) => {
            debug!(
                "{}: {} → {} lines, {} input tokens, {} output tokens, {}ms",
                filename,
                lines.len(),
                parsed.len(),
                input_tokens,
                output_tokens,
                duration_ms
            );
            let outcome = FileOutcome {
                filename: filename.to_string(),
                state: NormalizationState::Normalized,
                lines_in: lines.len(),
                lines_out: parsed.len(),
                input_tokens,
                output_tokens,
                duration_ms,
            };
            (parsed, outcome)
        }
        Err((reason, (input_tokens, output_tokens))) => {
            warn!("Error normalizing {}: {}", filename, reason);
            let outcome = FileOutcome {
                filename: filename.to_string(),
                state: NormalizationState::FallbackOriginal { reason },
                lines_in: lines.len(),
                lines_out: lines.len(),
                input_tokens,
                output_tokens,
                duration_ms,
            };
            (lines.to_vec(), outcome)
        }
    }
}

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\s*\n(.*?)\n?```$").unwrap());

/// Parse the model's answer as a JSON array of strings.
///
/// Accepts surrounding whitespace and an outer ```` ```json ```` fence (models
/// add one despite the prompt). Entries are trimmed; empty entries and
/// repeats are dropped so the result keeps the same guarantees as `output.json`.
pub fn parse_line_array(content: &str) -> Result<Vec<String>, String> {
    let trimmed = content.trim();
    let body = match RE_JSON_FENCE.captures(trimmed) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()).trim(),
        None => trimmed,
    };

    let parsed: Vec<String> = serde_json::from_str(body).map_err(|e| e.to_string())?;
    let (lines, _) = dedup_lines(
        parsed
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty()),
    );
    Ok(lines)
}

/// Build `CompletionOptions` from the pipeline config.
fn build_options(config: &PipelineConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replies with a fixed result and records every prompt it was sent.
    struct FixedClient {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl FixedClient {
        fn ok(content: &str) -> Self {
            Self {
                reply: Ok(content.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn err(detail: &str) -> Self {
            Self {
                reply: Err(detail.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl CompletionClient for FixedClient {
        async fn complete(
            &self,
            prompt: &str,
            _options: &CompletionOptions,
        ) -> Result<Completion, ServiceError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(content) => Ok(Completion {
                    content: content.clone(),
                    input_tokens: 120,
                    output_tokens: 12,
                }),
                Err(detail) => Err(ServiceError(detail.clone())),
            }
        }
    }

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn build_options_defaults() {
        let config = PipelineConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(2048));
    }

    #[test]
    fn parse_plain_array() {
        assert_eq!(
            parse_line_array(" [\"Hello\", \"ブランドクラウド\"]\n").unwrap(),
            ["Hello", "ブランドクラウド"]
        );
    }

    #[test]
    fn parse_fenced_array() {
        let content = "```json\n[\"Marketing Tips\", \"Hello\"]\n```";
        assert_eq!(parse_line_array(content).unwrap(), ["Marketing Tips", "Hello"]);
    }

    #[test]
    fn parse_enforces_line_invariants() {
        let content = r#"["  Hello ", "", "Hello", "   ", "World"]"#;
        assert_eq!(parse_line_array(content).unwrap(), ["Hello", "World"]);
    }

    #[test]
    fn parse_rejects_non_arrays() {
        assert!(parse_line_array("Here are the cleaned lines: [\"a\"]").is_err());
        assert!(parse_line_array(r#"{"lines": ["a"]}"#).is_err());
        assert!(parse_line_array("[1, 2, 3]").is_err());
        assert!(parse_line_array("").is_err());
    }

    #[test]
    fn service_error_falls_back_to_original() {
        let client = FixedClient::err("401 Unauthorized");
        let input = lines(&["Hello", "Hello", "##@@", "foo"]);
        let (out, outcome) = tokio_test::block_on(normalize_lines(
            &client,
            "shot1.png",
            &input,
            &PipelineConfig::default(),
        ));
        assert_eq!(out, input);
        assert!(outcome.is_fallback());
        match outcome.state {
            NormalizationState::FallbackOriginal {
                reason: NormalizeError::ServiceFailed { ref file, ref detail },
            } => {
                assert_eq!(file, "shot1.png");
                assert!(detail.contains("401"));
            }
            ref other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn fallback_message_names_the_file_once() {
        let client = FixedClient::err("503 Service Unavailable");
        let input = lines(&["Hello"]);
        let (_, outcome) = tokio_test::block_on(normalize_lines(
            &client,
            "shot1.png",
            &input,
            &PipelineConfig::default(),
        ));
        let NormalizationState::FallbackOriginal { reason } = outcome.state else {
            panic!("expected fallback");
        };
        let logged = format!("Error normalizing {}: {}", reason.file(), reason);
        assert_eq!(logged.matches("shot1.png").count(), 1, "{logged}");
        assert_eq!(reason.to_string(), "LLM call failed: 503 Service Unavailable");
    }

    #[test]
    fn malformed_reply_falls_back_to_original() {
        let client = FixedClient::ok("Sure! Here is your list.");
        let input = lines(&["Hello", "Marketing Tips"]);
        let (out, outcome) = tokio_test::block_on(normalize_lines(
            &client,
            "shot2.png",
            &input,
            &PipelineConfig::default(),
        ));
        assert_eq!(out, input);
        assert!(matches!(
            outcome.state,
            NormalizationState::FallbackOriginal {
                reason: NormalizeError::MalformedResponse { .. }
            }
        ));
        assert_eq!(outcome.input_tokens, 120);
    }

    #[test]
    fn successful_reply_replaces_lines() {
        let client = FixedClient::ok(r#"["Marketing Tips"]"#);
        let input = lines(&["Marketing Tips", "xqz7!"]);
        let (out, outcome) = tokio_test::block_on(normalize_lines(
            &client,
            "shot3.png",
            &input,
            &PipelineConfig::default(),
        ));
        assert_eq!(out, ["Marketing Tips"]);
        assert_eq!(outcome.state, NormalizationState::Normalized);
        assert_eq!((outcome.lines_in, outcome.lines_out), (2, 1));

        let prompts = client.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].ends_with(r#"Input: ["Marketing Tips","xqz7!"]"#));
    }

    #[test]
    fn empty_list_skips_the_call() {
        let client = FixedClient::err("must not be called");
        let (out, outcome) = tokio_test::block_on(normalize_lines(
            &client,
            "blank.png",
            &[],
            &PipelineConfig::default(),
        ));
        assert!(out.is_empty());
        assert_eq!(outcome.state, NormalizationState::Normalized);
        assert!(client.prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn custom_instructions_are_sent() {
        let client = FixedClient::ok("[]");
        let config = PipelineConfig::builder()
            .instructions("Drop everything.")
            .build()
            .unwrap();
        let input = lines(&["Hello"]);
        let (out, _) =
            tokio_test::block_on(normalize_lines(&client, "a.png", &input, &config));
        assert!(out.is_empty());
        assert!(client.prompts.lock().unwrap()[0].starts_with("Drop everything."));
    }
}
