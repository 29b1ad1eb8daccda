//! Response salvaging: best-effort recovery of a JSON record from model text.
//!
//! ## Why is salvaging necessary?
//!
//! Even when told to return "ONLY a JSON object", vision models regularly
//! wrap it in prose or ```` ```json ```` fences, double their quotes, switch to
//! Python-style single quotes, or break long values across lines. Rejecting
//! all of that would throw away most otherwise-usable extractions.
//!
//! ## Stages
//!
//! Each stage runs only when the previous one did not yield a record:
//!
//! 1. Delimiter extraction: first `{` through last `}` (inclusive). No such
//!    pair means there is nothing to salvage.
//! 2. Normalisation of the candidate: `""` → `"`, `\\` → `\`, drop newlines,
//!    `'` → `"`.
//! 3. Strict parse of the normalised candidate.
//! 4. Secondary repair of the *raw* text: `\'` → `'`, drop a backslash
//!    that precedes a newline, then parse again.
//!
//! Both textual repairs are lossy. A name such as `O'Brien` is corrupted by
//! stage 2, and an empty string value `""` collapses into a lone quote. These
//! are known limitations kept for compatibility with existing consumers.
//!
//! Every non-null value of a salvaged record is coerced to a string, so
//! downstream code never sees numbers, booleans or nested JSON. The string is
//! the value's JSON text: numbers keep every digit as written (serde_json's
//! `arbitrary_precision`), and booleans become lowercase `"true"` /
//! `"false"`. Consumers matching on capitalised `"True"` / `"False"` will
//! not see those spellings.

use crate::schema::ExtractedRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Result of running the salvager over one model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Salvage {
    /// The normalised `{…}` payload parsed on the first attempt.
    Parsed(ExtractedRecord),
    /// Only the secondary repair of the raw text parsed.
    Repaired(ExtractedRecord),
    /// The text holds no `{` that precedes a `}`.
    NoPayload,
    /// A payload was found but neither parse attempt succeeded.
    Unparseable,
}

impl Salvage {
    /// `true` when no record could be recovered.
    pub fn is_failure(&self) -> bool {
        matches!(self, Salvage::NoPayload | Salvage::Unparseable)
    }

    /// The recovered record, or an empty record on failure.
    pub fn into_record(self) -> ExtractedRecord {
        match self {
            Salvage::Parsed(record) | Salvage::Repaired(record) => record,
            Salvage::NoPayload | Salvage::Unparseable => ExtractedRecord::empty(),
        }
    }
}

/// Turn raw model text into a record, returning an empty record on failure.
///
/// Never panics and never returns an error: callers that need to tell
/// "nothing extracted" apart from "all fields null" should use
/// [`salvage_outcome`] instead.
pub fn salvage(raw: &str) -> ExtractedRecord {
    salvage_outcome(raw).into_record()
}

/// Run all salvaging stages and report which one succeeded.
pub fn salvage_outcome(raw: &str) -> Salvage {
    let Some(candidate) = extract_braced_payload(raw) else {
        warn!("No JSON object delimiters found in model output: {:?}", raw);
        return Salvage::NoPayload;
    };

    let normalised = normalise_payload(candidate);
    match serde_json::from_str::<Map<String, Value>>(&normalised) {
        Ok(map) => {
            debug!("Parsed model output with {} keys", map.len());
            return Salvage::Parsed(coerce_values(map));
        }
        Err(e) => {
            warn!("JSON parse failed after normalisation: {}", e);
            warn!("Attempting secondary repair of: {:?}", raw);
        }
    }

    let repaired = repair_escapes(raw);
    match serde_json::from_str::<Map<String, Value>>(&repaired) {
        Ok(map) => {
            debug!("Secondary repair recovered {} keys", map.len());
            Salvage::Repaired(coerce_values(map))
        }
        Err(e) => {
            warn!("Secondary repair failed ({}), returning empty record", e);
            Salvage::Unparseable
        }
    }
}

// ── Stage 1: Delimiter extraction ────────────────────────────────────────────

fn extract_braced_payload(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if start < end {
        Some(&raw[start..=end])
    } else {
        None
    }
}

// ── Stage 2: Normalisation ───────────────────────────────────────────────────

fn normalise_payload(candidate: &str) -> String {
    candidate
        .replace("\"\"", "\"")
        .replace("\\\\", "\\")
        .replace('\n', "")
        .replace('\'', "\"")
}

// ── Stage 4: Secondary repair ────────────────────────────────────────────────

static RE_ESCAPED_APOSTROPHE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\'").unwrap());

static RE_ESCAPED_NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\\n").unwrap());

fn repair_escapes(raw: &str) -> String {
    let s = RE_ESCAPED_APOSTROPHE.replace_all(raw, "'");
    RE_ESCAPED_NEWLINE.replace_all(&s, "").into_owned()
}

// ── Value coercion ───────────────────────────────────────────────────────────

fn coerce_values(map: Map<String, Value>) -> ExtractedRecord {
    map.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Null => Value::Null,
                Value::String(s) => Value::String(s),
                other => Value::String(other.to_string()),
            };
            (key, value)
        })
        .collect::<Map<String, Value>>()
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field_names;
    use serde_json::json;

    fn record(value: Value) -> ExtractedRecord {
        ExtractedRecord::from(value.as_object().cloned().unwrap())
    }

    #[test]
    fn test_preamble_discarded() {
        let out = salvage(r#"Sure! {"country": "UAE", "name": "Jane Doe", "id_number": null}"#);
        assert_eq!(
            out,
            record(json!({"country": "UAE", "name": "Jane Doe", "id_number": null}))
        );
    }

    #[test]
    fn test_single_quotes_normalised() {
        let out = salvage("{'country': 'UAE', 'name': 'Jane Doe'}");
        assert_eq!(out, record(json!({"country": "UAE", "name": "Jane Doe"})));
    }

    #[test]
    fn test_doubled_quotes_collapsed() {
        let out = salvage(r#"{"country": ""UAE""}"#);
        assert_eq!(out, record(json!({"country": "UAE"})));
    }

    #[test]
    fn test_not_json_at_all() {
        assert!(salvage("not json at all").is_empty());
        assert_eq!(salvage_outcome("not json at all"), Salvage::NoPayload);
    }

    #[test]
    fn test_empty_input() {
        assert!(salvage("").is_empty());
    }

    #[test]
    fn test_closing_brace_before_opening() {
        assert_eq!(salvage_outcome("} nothing here {"), Salvage::NoPayload);
    }

    #[test]
    fn test_markdown_fence_stripped_by_delimiters() {
        let raw = "```json\n{\n  \"country\": \"UAE\",\n  \"place_of_issue\": \"DUBAI\"\n}\n```";
        let out = salvage(raw);
        assert_eq!(out.get_str("country"), Some("UAE"));
        assert_eq!(out.get_str("place_of_issue"), Some("DUBAI"));
    }

    #[test]
    fn test_newline_inside_value_removed() {
        let raw = "{\"company\": \"ACME GENERAL\nTRADING LLC\"}";
        let out = salvage(raw);
        assert_eq!(out.get_str("company"), Some("ACME GENERALTRADING LLC"));
    }

    #[test]
    fn test_non_string_values_coerced() {
        let out = salvage(r#"{"id_number": 784199012345678, "country": true, "company": null}"#);
        assert_eq!(out.get_str("id_number"), Some("784199012345678"));
        assert_eq!(out.get_str("country"), Some("true"));
        assert_eq!(out.get("company"), Some(&Value::Null));
    }

    #[test]
    fn test_booleans_coerced_lowercase() {
        let out = salvage(r#"{"residence_status": false, "country": true}"#);
        assert_eq!(out.get_str("residence_status"), Some("false"));
        assert_eq!(out.get_str("country"), Some("true"));
    }

    #[test]
    fn test_long_unquoted_numbers_keep_every_digit() {
        let out = salvage(
            r#"{"id_number": 784199012345678901234, "file_number": 20120201234567890123.50}"#,
        );
        assert_eq!(out.get_str("id_number"), Some("784199012345678901234"));
        assert_eq!(out.get_str("file_number"), Some("20120201234567890123.50"));
    }

    #[test]
    fn test_nested_values_coerced_to_json_text() {
        let out = salvage(r#"{"name": ["Jane", "Doe"]}"#);
        assert_eq!(out.get_str("name"), Some(r#"["Jane","Doe"]"#));
    }

    #[test]
    fn test_secondary_repair_recovers_empty_strings() {
        // Normalisation collapses `""` into `"`, breaking the payload; the
        // raw text is still valid once repaired.
        let raw = r#"{"company": "", "name": "Jane Doe"}"#;
        match salvage_outcome(raw) {
            Salvage::Repaired(out) => {
                assert_eq!(out.get_str("company"), Some(""));
                assert_eq!(out.get_str("name"), Some("Jane Doe"));
            }
            other => panic!("expected Repaired, got {other:?}"),
        }
    }

    #[test]
    fn test_secondary_repair_unescapes_apostrophe() {
        let raw = "{\"company\": \"\", \"name\": \"O\\'Brien\"}";
        let out = salvage(raw);
        assert_eq!(out.get_str("name"), Some("O'Brien"));
    }

    #[test]
    fn test_unparseable_payload() {
        let raw = r#"{"name": "Jane}"#;
        assert_eq!(salvage_outcome(raw), Salvage::Unparseable);
        assert!(salvage(raw).is_empty());
    }

    #[test]
    fn test_full_schema_keys_preserved() {
        let body: Vec<String> = field_names().map(|f| format!("\"{f}\": null")).collect();
        let raw = format!("Here you go:\n{{{}}}", body.join(",\n"));
        let out = salvage(&raw);
        assert!(out.missing_fields().is_empty());
        assert_eq!(out.len(), 13);
        assert!(out.iter().all(|(_, v)| v.is_null()));
    }

    #[test]
    fn test_idempotent_on_own_output() {
        let first = salvage(
            r#"Result: {"country": "UNITED ARAB EMIRATES", "name": "Jane Doe", "id_number": 42, "company": null}"#,
        );
        let reserialised = serde_json::to_string(&first).unwrap();
        assert_eq!(salvage(&reserialised), first);
    }

    #[test]
    fn test_outcome_failure_flags() {
        assert!(Salvage::NoPayload.is_failure());
        assert!(Salvage::Unparseable.is_failure());
        assert!(!Salvage::Parsed(ExtractedRecord::empty()).is_failure());
    }
}
