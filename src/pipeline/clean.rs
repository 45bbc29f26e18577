//! Line cleaning: deterministic heuristics for OCR noise on screenshots.
//!
//! Tesseract on UI screenshots produces three recurring kinds of junk:
//!
//! - Japanese text over-segmented into spaced glyph groups
//!   (`"ブラ ンド クラ ウド"` instead of `"ブランドクラウド"`)
//! - UI icons read as letters: a magnifying glass becomes `O`, `Q` or `G`,
//!   a radio button becomes `●` or `©`
//! - bullets, box-drawing borders and arrows glued to the start or end of
//!   otherwise good lines
//!
//! Each heuristic is a named [`CleaningRule`] in an ordered table held by
//! [`LineCleaner`]. Rules are either transforms (`&str → String`) or reject
//! predicates. A line that becomes empty at any step is discarded on the spot.
//!
//! ## Rule Order
//!
//! CJK spacing is joined first so the later length check counts the joined
//! line. Icon and symbol rejection see the line before any marker is
//! stripped, and the length check always runs last on the final text.

use crate::config::PipelineConfig;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;

/// Default minimum number of characters a cleaned line must keep.
pub const DEFAULT_MIN_CHARS: usize = 3;

/// What a [`CleaningRule`] does to a line.
#[derive(Clone, Copy)]
pub enum RuleAction {
    /// Rewrite the line.
    Transform(fn(&str) -> String),
    /// Discard the line when the predicate holds.
    Reject(fn(&str) -> bool),
    /// Discard the line when it has fewer characters than this.
    MinChars(usize),
}

impl fmt::Debug for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleAction::Transform(_) => f.write_str("Transform"),
            RuleAction::Reject(_) => f.write_str("Reject"),
            RuleAction::MinChars(n) => write!(f, "MinChars({n})"),
        }
    }
}

/// One named step of the cleaning table.
#[derive(Debug, Clone, Copy)]
pub struct CleaningRule {
    pub name: &'static str,
    pub action: RuleAction,
}

impl CleaningRule {
    pub const fn transform(name: &'static str, f: fn(&str) -> String) -> Self {
        Self {
            name,
            action: RuleAction::Transform(f),
        }
    }

    pub const fn reject(name: &'static str, f: fn(&str) -> bool) -> Self {
        Self {
            name,
            action: RuleAction::Reject(f),
        }
    }

    pub const fn min_chars(n: usize) -> Self {
        Self {
            name: "min_length",
            action: RuleAction::MinChars(n),
        }
    }

    /// Apply this rule alone. `None` means the line is discarded.
    pub fn apply(&self, line: &str) -> Option<String> {
        let out = match self.action {
            RuleAction::Transform(f) => f(line),
            RuleAction::Reject(f) => {
                if f(line) {
                    return None;
                }
                line.to_string()
            }
            RuleAction::MinChars(n) => {
                if line.chars().count() < n {
                    return None;
                }
                line.to_string()
            }
        };
        if out.trim().is_empty() {
            None
        } else {
            Some(out)
        }
    }
}

/// The default rule table, in application order.
///
/// 1. `join_cjk_spacing` — remove whitespace between two kana/kanji characters
/// 2. `reject_icon_noise` — drop lines made only of icon-like glyphs
/// 3. `reject_symbols_only` — drop lines with no letter at all
/// 4. `strip_leading_markers` — remove bullets, borders and icon prefixes
/// 5. `strip_trailing_markers` — remove bullets, borders and arrows at the end
/// 6. `collapse_whitespace` — single spaces, trimmed
/// 7. `min_length` — drop lines shorter than the minimum
pub fn default_rules(min_chars: usize) -> Vec<CleaningRule> {
    vec![
        CleaningRule::transform("join_cjk_spacing", join_cjk_spacing),
        CleaningRule::reject("reject_icon_noise", is_icon_noise),
        CleaningRule::reject("reject_symbols_only", is_symbols_only),
        CleaningRule::transform("strip_leading_markers", strip_leading_markers),
        CleaningRule::transform("strip_trailing_markers", strip_trailing_markers),
        CleaningRule::transform("collapse_whitespace", collapse_whitespace),
        CleaningRule::min_chars(min_chars),
    ]
}

/// An ordered table of cleaning rules.
#[derive(Debug, Clone)]
pub struct LineCleaner {
    rules: Vec<CleaningRule>,
}

impl Default for LineCleaner {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CHARS)
    }
}

impl LineCleaner {
    /// The default table with the given minimum line length.
    pub fn new(min_chars: usize) -> Self {
        Self {
            rules: default_rules(min_chars),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.min_line_chars)
    }

    /// Replace the minimum length of every `MinChars` rule.
    pub fn with_min_chars(mut self, n: usize) -> Self {
        for rule in &mut self.rules {
            if let RuleAction::MinChars(_) = rule.action {
                rule.action = RuleAction::MinChars(n);
            }
        }
        self
    }

    /// Insert `rule` before the rule called `before`, or append it when no
    /// rule has that name.
    pub fn insert_rule_before(mut self, before: &str, rule: CleaningRule) -> Self {
        match self.rules.iter().position(|r| r.name == before) {
            Some(i) => self.rules.insert(i, rule),
            None => self.rules.push(rule),
        }
        self
    }

    /// Append a rule at the end of the table.
    pub fn push_rule(mut self, rule: CleaningRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[CleaningRule] {
        &self.rules
    }

    /// Clean one OCR line. `None` means discard.
    pub fn clean_line(&self, line: &str) -> Option<String> {
        if line.trim().is_empty() {
            return None;
        }
        let mut current = line.to_string();
        for rule in &self.rules {
            current = rule.apply(&current)?;
        }
        Some(current)
    }

    /// Split raw OCR text into lines, clean each one and drop repeats.
    pub fn clean_text(&self, raw: &str) -> CleanedText {
        let mut raw_lines = 0;
        let mut discarded = 0;
        let mut cleaned = Vec::new();

        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            raw_lines += 1;
            match self.clean_line(line) {
                Some(c) => cleaned.push(c),
                None => discarded += 1,
            }
        }

        let (lines, duplicates) = dedup_lines(cleaned);
        CleanedText {
            lines,
            raw_lines,
            discarded,
            duplicates,
        }
    }
}

/// Output of [`LineCleaner::clean_text`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanedText {
    pub lines: Vec<String>,
    /// Non-blank input lines.
    pub raw_lines: usize,
    /// Lines a rule rejected.
    pub discarded: usize,
    /// Cleaned lines dropped as repeats.
    pub duplicates: usize,
}

static DEFAULT_CLEANER: Lazy<LineCleaner> = Lazy::new(LineCleaner::default);

/// Clean one line with the default rule table.
pub fn clean_line(line: &str) -> Option<String> {
    DEFAULT_CLEANER.clean_line(line)
}

/// Keep the first occurrence of every line, preserving order.
///
/// Returns the kept lines and how many repeats were dropped.
pub fn dedup_lines<I>(lines: I) -> (Vec<String>, usize)
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    let mut dropped = 0;
    for line in lines {
        if seen.insert(line.clone()) {
            kept.push(line);
        } else {
            dropped += 1;
        }
    }
    (kept, dropped)
}

// ── Rule 1: Join spaced-out kana / kanji ─────────────────────────────────────

/// Hiragana + Katakana, and CJK Unified Ideographs.
pub fn is_cjk_joinable(c: char) -> bool {
    matches!(c, '\u{3040}'..='\u{30FF}' | '\u{4E00}'..='\u{9FFF}')
}

/// Remove whitespace runs whose neighbours are both joinable characters.
pub fn join_cjk_spacing(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut i = 0;

    while i < chars.len() {
        if !chars[i].is_whitespace() {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        let start = i;
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        let prev = start.checked_sub(1).map(|p| chars[p]);
        let next = chars.get(i).copied();
        let joined = matches!(
            (prev, next),
            (Some(p), Some(n)) if is_cjk_joinable(p) && is_cjk_joinable(n)
        );
        if !joined {
            out.extend(&chars[start..i]);
        }
    }

    out
}

// ── Rule 2: Icon noise ───────────────────────────────────────────────────────
//
// Search boxes, avatars and radio buttons are round; tesseract reads them as
// O / 0 / Q / G or as one of the circle symbols.

static RE_ICON_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\sOo0QG@©®●○◯◎◉⊙•·]+$").unwrap());

fn is_icon_noise(line: &str) -> bool {
    RE_ICON_NOISE.is_match(line)
}

// ── Rule 3: No letters at all ────────────────────────────────────────────────

fn is_symbols_only(line: &str) -> bool {
    !line.trim().chars().any(char::is_alphabetic)
}

// ── Rule 4: Leading markers ──────────────────────────────────────────────────

static RE_LEADING_MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:[\s\-–—•‣⁃·*+>»|✓✔➤\x{2190}-\x{21FF}\x{2500}-\x{257F}\x{25A0}-\x{25FF}⊙]+|[OoQG0@©®][.):：]\s+)+",
    )
    .unwrap()
});

// A bare glyph counts as an icon only when a word follows it: "Q Search",
// but not "Q & A" or "G Suite".
static RE_BARE_ICON_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[OoQ@©®]\s+(\p{L})").unwrap());

fn strip_leading_markers(line: &str) -> String {
    let mut current = line.to_string();
    loop {
        let stripped = RE_LEADING_MARKERS.replace(&current, "");
        let stripped = RE_BARE_ICON_PREFIX.replace(&stripped, "$1").into_owned();
        if stripped == current {
            return current;
        }
        current = stripped;
    }
}

// ── Rule 5: Trailing markers ─────────────────────────────────────────────────

static RE_TRAILING_MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:[\s\-–—•‣⁃·<>«»|_~\x{2190}-\x{21FF}\x{2500}-\x{257F}\x{25A0}-\x{25FF}⊙]|\s[*+]+)+$",
    )
    .unwrap()
});

fn strip_trailing_markers(line: &str) -> String {
    RE_TRAILING_MARKERS.replace(line, "").into_owned()
}

// ── Rule 6: Whitespace ───────────────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn collapse_whitespace(line: &str) -> String {
    RE_WHITESPACE.replace_all(line.trim(), " ").into_owned()
}

// ── Tests ────────────────────────────────────────────────────────────────────
