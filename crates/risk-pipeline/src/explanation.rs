//! Explanation Composer
//!
//! Turns an optional generated narrative plus the rule engine's reasons and
//! actions into a structured explanation. Generated text is only ever an
//! enrichment: anything unparseable, empty or vague falls back to a
//! deterministic template built from the rules alone.

use regex::{Captures, Regex};
use risk_core::RiskLevel;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

pub const MIN_ITEMS: usize = 2;
pub const MAX_ITEMS: usize = 4;

/// Jargon and its plain-language replacement, matched case-insensitively
/// on word boundaries.
static GLOSSARY: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)\bEMIs\b", "loan payments"),
        (r"(?i)\bEMI\b", "loan payment"),
        (r"(?i)\breceivables\b", "pending customer payments"),
        (r"(?i)\bliquidity\b", "cash reserves"),
        (r"(?i)\bburn rate\b", "monthly cash loss"),
        (r"(?i)\bcash runway\b", "months of cash left"),
        (r"(?i)\bopex\b", "running costs"),
        (r"(?i)\boperating expenses\b", "running costs"),
        (r"(?i)\brevenue\b", "sales"),
    ]
    .into_iter()
    .map(|(pattern, plain)| (Regex::new(pattern).expect("valid glossary pattern"), plain))
    .collect()
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Generic phrases that say nothing about this particular business
const VAGUE_PHRASES: &[&str] = &[
    "elevated risk based on the financial indicators",
    "based on the financial indicators provided",
    "your business shows elevated risk",
    "overall financial health",
    "various factors",
    "several factors",
    "multiple factors",
    "it is important to",
    "monitor your finances",
    "consider improving your finances",
    "financial situation needs attention",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplanationSource {
    Generated,
    Template,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub summary: String,
    pub key_drivers: Vec<String>,
    pub immediate_actions: Vec<String>,
    pub source: ExplanationSource,
}

/// Fields pulled out of a generated JSON object
#[derive(Debug, Default, PartialEq)]
struct GeneratedFields {
    summary: Option<String>,
    key_drivers: Vec<String>,
    immediate_actions: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExplanationComposer;

impl ExplanationComposer {
    pub fn new() -> Self {
        Self
    }

    pub fn compose<R: AsRef<str>, A: AsRef<str>>(
        &self,
        generated: Option<&str>,
        score: u8,
        level: RiskLevel,
        reasons: &[R],
        actions: &[A],
    ) -> Explanation {
        let Some(fields) = generated.and_then(parse_generated) else {
            return self.template(score, level, reasons, actions);
        };

        let drivers = merge(&fields.key_drivers, reasons);
        let next_steps = merge(&fields.immediate_actions, actions);
        let summary = fields
            .summary
            .map(|s| collapse_whitespace(&s))
            .filter(|s| !s.is_empty());

        let summary = match summary {
            Some(s) if !drivers.is_empty() && !next_steps.is_empty() => s,
            _ => return self.template(score, level, reasons, actions),
        };

        let summary = if is_vague(&summary) {
            tracing::debug!("Generated summary too generic, using template summary");
            template_summary(score, level, &drivers, &next_steps)
        } else {
            simplify(&summary)
        };

        Explanation {
            summary,
            key_drivers: pad(drivers, driver_filler(score, level)),
            immediate_actions: pad(next_steps, action_filler(level)),
            source: ExplanationSource::Generated,
        }
    }

    /// Explanation built from rule output only
    pub fn template<R: AsRef<str>, A: AsRef<str>>(
        &self,
        score: u8,
        level: RiskLevel,
        reasons: &[R],
        actions: &[A],
    ) -> Explanation {
        let no_extra: [&str; 0] = [];
        let drivers = merge(&no_extra, reasons);
        let next_steps = merge(&no_extra, actions);

        Explanation {
            summary: template_summary(score, level, &drivers, &next_steps),
            key_drivers: pad(drivers, driver_filler(score, level)),
            immediate_actions: pad(next_steps, action_filler(level)),
            source: ExplanationSource::Template,
        }
    }
}

/// Replace jargon. Only a sentence-initial match keeps its capital.
pub fn simplify(text: &str) -> String {
    let mut out = collapse_whitespace(text);
    for (pattern, plain) in GLOSSARY.iter() {
        out = pattern
            .replace_all(&out, |caps: &Captures| {
                let at_start = caps.get(0).is_some_and(|m| m.start() == 0);
                if at_start && caps[0].starts_with(char::is_uppercase) {
                    capitalize(plain)
                } else {
                    plain.to_string()
                }
            })
            .into_owned();
    }
    out
}

pub fn is_vague(summary: &str) -> bool {
    if summary.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    let lower = summary.to_lowercase();
    VAGUE_PHRASES.iter().any(|p| lower.contains(p))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// Simplified entries of `primary` then `secondary`, deduplicated
/// case-insensitively, capped at `MAX_ITEMS`.
fn merge<P: AsRef<str>, S: AsRef<str>>(primary: &[P], secondary: &[S]) -> Vec<String> {
    let candidates = primary
        .iter()
        .map(|p| p.as_ref())
        .chain(secondary.iter().map(|s| s.as_ref()));

    let mut merged: Vec<String> = Vec::new();
    for raw in candidates {
        let item = simplify(raw);
        if item.is_empty() {
            continue;
        }
        let key = item.to_lowercase();
        if merged.iter().any(|m| m.to_lowercase() == key) {
            continue;
        }
        merged.push(item);
        if merged.len() == MAX_ITEMS {
            break;
        }
    }
    merged
}

fn pad(mut items: Vec<String>, filler: [String; 2]) -> Vec<String> {
    for extra in filler {
        if items.len() >= MIN_ITEMS {
            break;
        }
        let key = extra.to_lowercase();
        if !items.iter().any(|i| i.to_lowercase() == key) {
            items.push(extra);
        }
    }
    items
}

fn driver_filler(score: u8, level: RiskLevel) -> [String; 2] {
    [
        format!("Overall risk score is {}/100 ({})", score, level),
        "No single warning sign dominates the current figures".to_string(),
    ]
}

fn action_filler(level: RiskLevel) -> [String; 2] {
    let first = match level {
        RiskLevel::High => "Review cash inflows and outflows every week until the score drops",
        RiskLevel::Medium => "Track sales, expenses and collections every week",
        RiskLevel::Low => "Keep submitting daily check-ins to spot changes early",
        RiskLevel::InsufficientData => "Please fill all fields to analyze financial risk",
    };
    [
        first.to_string(),
        "Keep at least one month of expenses as a cash reserve".to_string(),
    ]
}

fn template_summary(score: u8, level: RiskLevel, drivers: &[String], actions: &[String]) -> String {
    let mut summary = if level == RiskLevel::InsufficientData {
        "Risk could not be scored yet.".to_string()
    } else {
        format!("Risk score is {}/100 ({}).", score, level)
    };

    let top_drivers: Vec<&str> = drivers.iter().take(2).map(String::as_str).collect();
    if top_drivers.is_empty() {
        summary.push_str(" No warning signs were triggered by the current figures.");
    } else {
        summary.push_str(&format!(" Main concerns: {}.", top_drivers.join("; ")));
    }

    let top_actions: Vec<&str> = actions.iter().take(2).map(String::as_str).collect();
    if !top_actions.is_empty() {
        summary.push_str(&format!(" Start with: {}.", top_actions.join("; ")));
    }
    summary
}

fn parse_generated(text: &str) -> Option<GeneratedFields> {
    let value = serde_json::from_str::<Value>(text.trim())
        .ok()
        .filter(Value::is_object)
        .or_else(|| {
            first_json_object(text).and_then(|span| serde_json::from_str::<Value>(span).ok())
        })?;
    let obj = value.as_object()?;

    let strings = |keys: &[&str]| -> Vec<String> {
        keys.iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_array))
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };

    Some(GeneratedFields {
        summary: obj.get("summary").and_then(Value::as_str).map(str::to_string),
        key_drivers: strings(&["key_drivers", "drivers", "reasons"]),
        immediate_actions: strings(&["immediate_actions", "actions"]),
    })
}

/// First balanced `{...}` span, skipping braces inside JSON strings.
fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
