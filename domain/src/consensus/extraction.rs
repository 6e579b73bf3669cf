//! Structured payload extraction from free-form agent output
//!
//! Agents return anything from pure JSON to JSON buried under tool
//! banners and timestamped log lines, to plain prose. Recovery runs in
//! order of confidence:
//!
//! 1. strip leading metadata lines (timestamp brackets, banners, short
//!    `key: value` headers) and try the remainder directly
//! 2. locate a fenced code block and parse its body
//! 3. scan for the first balanced top-level JSON object
//! 4. search for sentinel markers (`BEGIN_PAYLOAD` / `END_PAYLOAD`)
//!
//! A failure of every strategy yields a `Failed` extraction with an empty
//! payload; it never aborts the stage, it just does not count toward
//! quorum.

use serde_json::Value;

use crate::pipeline::stage::Stage;

/// Sentinel markers some agents emit around their payload
pub const PAYLOAD_BEGIN: &str = "BEGIN_PAYLOAD";
pub const PAYLOAD_END: &str = "END_PAYLOAD";

/// How much of the payload survived extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    /// Structured payload recovered intact
    Clean,
    /// Payload recovered but lossy: sentinel text wrap, or the stage's
    /// expected field is absent
    Partial,
    /// Nothing salvageable; payload is empty
    Failed,
}

impl ExtractionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionStatus::Clean => "clean",
            ExtractionStatus::Partial => "partial",
            ExtractionStatus::Failed => "failed",
        }
    }

    /// Whether the artifact counts toward quorum content
    pub fn is_usable(self) -> bool {
        !matches!(self, ExtractionStatus::Failed)
    }
}

impl std::str::FromStr for ExtractionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clean" => Ok(ExtractionStatus::Clean),
            "partial" => Ok(ExtractionStatus::Partial),
            "failed" => Ok(ExtractionStatus::Failed),
            other => Err(format!("unknown extraction status: {other}")),
        }
    }
}

/// Result of one extraction attempt
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub payload: Value,
    pub status: ExtractionStatus,
}

impl Extraction {
    fn clean(payload: Value) -> Self {
        Self {
            payload,
            status: ExtractionStatus::Clean,
        }
    }

    fn partial(payload: Value) -> Self {
        Self {
            payload,
            status: ExtractionStatus::Partial,
        }
    }

    fn failed() -> Self {
        Self {
            payload: Value::Null,
            status: ExtractionStatus::Failed,
        }
    }
}

/// Extract a structured payload from raw agent output
pub fn extract_payload(raw: &str) -> Extraction {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Extraction::failed();
    }

    // Strategy 1: strip incidental metadata lines, then try the remainder
    let body = strip_metadata_head(trimmed);
    if let Ok(value) = serde_json::from_str::<Value>(body.trim()) {
        if value.is_object() {
            return Extraction::clean(value);
        }
    }

    // Strategy 2: fenced code block
    if let Some(inner) = find_fenced_block(body) {
        if let Ok(value) = serde_json::from_str::<Value>(inner.trim()) {
            if value.is_object() {
                return Extraction::clean(value);
            }
        }
    }

    // Strategy 3: first balanced top-level object
    if let Some(candidate) = find_balanced_object(body) {
        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
            if value.is_object() {
                return Extraction::clean(value);
            }
        }
    }

    // Strategy 4: sentinel markers
    if let Some(inner) = find_sentinel_block(body) {
        let inner = inner.trim();
        match serde_json::from_str::<Value>(inner) {
            Ok(value) if value.is_object() => return Extraction::clean(value),
            _ if !inner.is_empty() => {
                return Extraction::partial(serde_json::json!({ "content": inner }));
            }
            _ => {}
        }
    }

    Extraction::failed()
}

/// Extract a payload and check it against a stage's expected shape
///
/// A structurally clean payload missing the stage's required field is
/// downgraded to `Partial`: it still counts toward quorum, but the
/// synthesizer treats it as unverified content.
pub fn extract_stage_payload(stage: Stage, raw: &str) -> Extraction {
    let mut extraction = extract_payload(raw);
    if extraction.status == ExtractionStatus::Clean {
        let has_field = extraction
            .payload
            .as_object()
            .map(|obj| obj.contains_key(stage.required_field()) || obj.contains_key("content"))
            .unwrap_or(false);
        if !has_field {
            extraction.status = ExtractionStatus::Partial;
        }
    }
    extraction
}

/// Drop leading lines that are recognizably not payload
///
/// Stops at the first line that could open a structure or fence. The
/// heuristics are deliberately cheap: timestamp brackets, banner rules,
/// log-level prefixes and short `key: value` headers.
fn strip_metadata_head(text: &str) -> &str {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        if is_metadata_line(content) {
            offset += line.len();
        } else {
            break;
        }
    }
    &text[offset..]
}

fn is_metadata_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return true;
    }
    // Payload openers always end the metadata head
    if trimmed.starts_with('{') || trimmed.starts_with("```") || trimmed.starts_with(PAYLOAD_BEGIN)
    {
        return false;
    }
    // Timestamp bracket: "[2025-01-01T00:00:00Z] ..." or "[12:00:01] ...".
    // A lone "[...]" with nothing after it is treated as payload (JSON array).
    if trimmed.starts_with('[') {
        if let Some(end) = trimmed.find(']') {
            let inside = &trimmed[1..end];
            let after = trimmed[end + 1..].trim();
            if inside.chars().any(|c| c.is_ascii_digit()) && !after.is_empty() {
                return true;
            }
        }
        return false;
    }
    // Banner rules and log-level prefixes
    let banners = ["===", "---", "***", "INFO", "WARN", "DEBUG", "TRACE", "ERROR", "$ ", "> "];
    if banners.iter().any(|b| trimmed.starts_with(b)) {
        return true;
    }
    // Short "key: value" header such as "model: gpt-pro" or "Ran for: 32s"
    if trimmed.len() <= 64 && !trimmed.contains('{') && !trimmed.contains('}') {
        if let Some(colon) = trimmed.find(": ") {
            let key = &trimmed[..colon];
            if !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == ' ') {
                return true;
            }
        }
    }
    false
}

/// Body of the first fenced code block, if any
fn find_fenced_block(text: &str) -> Option<&str> {
    // Prefer an explicit json fence
    for opener in ["```json", "```"] {
        if let Some(start) = text.find(opener) {
            let body_start = text[start + opener.len()..].find('\n')? + start + opener.len() + 1;
            if let Some(end) = text[body_start..].find("```") {
                return Some(&text[body_start..body_start + end]);
            }
        }
    }
    None
}

/// First balanced top-level `{...}` region, honoring strings and escapes
fn find_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Content between sentinel markers, if both are present in order
fn find_sentinel_block(text: &str) -> Option<&str> {
    let begin = text.find(PAYLOAD_BEGIN)?;
    let after = begin + PAYLOAD_BEGIN.len();
    let end = text[after..].find(PAYLOAD_END)?;
    Some(&text[after..after + end])
}
