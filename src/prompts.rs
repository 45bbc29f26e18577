//! Prompts for the LLM normalisation stage.
//!
//! Callers can override the instructions via
//! [`crate::config::PipelineConfig::instructions`]; the line list is always
//! appended by [`normalize_prompt`] so an override cannot forget it.

/// Default instructions sent ahead of each file's line list.
pub const DEFAULT_NORMALIZE_PROMPT: &str = r#"You are an expert text cleaner for OCR-extracted data. The input is a list of text lines extracted from screenshots via OCR. These lines may contain duplicates, random characters, misrecognized symbols, or irrelevant content.

Your task:
1. Remove all lines that are clearly garbage, nonsense, or unreadable.
2. Remove duplicates.
3. Remove any random OCR artifacts (e.g., repeated characters, stray symbols).
4. Keep meaningful words, phrases, or proper names intact.
5. Strip leading and trailing whitespace from each line.
6. Return the cleaned list in the same language as the original (do not translate).
7. Return output ONLY as a JSON array of strings, with no extra text, explanation, or commentary.

You must be strict: discard anything that looks like an OCR artifact or repeated characters."#;

/// Build the full prompt for one file: instructions followed by the lines as JSON.
///
/// The lines are embedded with `serde_json`, which leaves non-ASCII text
/// unescaped so the model sees the original script.
pub fn normalize_prompt(instructions: Option<&str>, lines: &[String]) -> String {
    let instructions = instructions.unwrap_or(DEFAULT_NORMALIZE_PROMPT);
    let payload = serde_json::to_string(lines).unwrap_or_else(|_| "[]".to_string());
    format!("{instructions}\n\nInput: {payload}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_lines_as_json() {
        let lines = vec!["Hello".to_string(), "ブランドクラウド".to_string()];
        let prompt = normalize_prompt(None, &lines);
        assert!(prompt.starts_with("You are an expert text cleaner"));
        assert!(prompt.ends_with(r#"Input: ["Hello","ブランドクラウド"]"#));
    }

    #[test]
    fn prompt_override_keeps_payload() {
        let prompt = normalize_prompt(Some("Only dedupe."), &["a\"b".to_string()]);
        assert_eq!(prompt, "Only dedupe.\n\nInput: [\"a\\\"b\"]");
    }

    #[test]
    fn default_prompt_demands_json_array() {
        assert!(DEFAULT_NORMALIZE_PROMPT.contains("JSON array of strings"));
        assert!(DEFAULT_NORMALIZE_PROMPT.contains("do not translate"));
    }
}
