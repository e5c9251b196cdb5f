//! Lenient interpretation of generation output.
//!
//! Providers are asked for strict JSON but do not reliably produce it, so
//! every entry point here is total: parse failures fall back to the
//! caller-supplied defaults instead of erroring.

use serde_json::Value;

use crate::catalog::model::{Book, BookStatus};
use crate::catalog::query::SearchFilters;

/// Explanation used when the provider supplies none.
pub const DEFAULT_EXPLANATION: &str = "Search results based on your query.";

/// Keys that identify the structured filter shape. `genre` and `year`
/// appear in both shapes and carry no signal.
const STRUCTURED_KEYS: &[&str] = &["title", "author", "isbn", "tags", "availability"];

/// Parse `text` as JSON, repairing the common case of prose around the
/// object: strict parse first, then retry the span between the first and
/// last brace (or bracket). Returns `default` if nothing parses to an
/// object or array.
pub fn parse_json_or_default(text: &str, default: Value) -> Value {
    let trimmed = text.trim();
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        if v.is_object() || v.is_array() {
            return v;
        }
        return default;
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) {
            if end > start {
                if let Ok(v) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                    if v.is_object() || v.is_array() {
                        return v;
                    }
                }
            }
        }
    }

    default
}

/// Interpreted search output: filters plus a human-readable explanation.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub filters: SearchFilters,
    pub explanation: String,
}

/// Interpret search-translation output.
///
/// Accepts either the structured per-field shape or the simplified mock
/// shape; the presence of any structured-only key routes to structured
/// handling, so fields from the two shapes are never mixed. Unparseable
/// text yields `fallback` with the default explanation.
pub fn interpret_search(text: &str, fallback: SearchFilters) -> SearchOutcome {
    let parsed = parse_json_or_default(text, Value::Null);
    let Some(root) = parsed.as_object() else {
        return SearchOutcome {
            filters: fallback,
            explanation: DEFAULT_EXPLANATION.to_string(),
        };
    };

    let explanation = root
        .get("explanation")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_EXPLANATION)
        .to_string();

    // The structured prompt nests filters under a "filters" key; the
    // simplified shape is flat.
    let fields = root
        .get("filters")
        .and_then(Value::as_object)
        .unwrap_or(root);

    let structured = STRUCTURED_KEYS
        .iter()
        .any(|k| fields.get(*k).is_some_and(|v| !v.is_null()));

    let filters = if structured {
        SearchFilters::Structured {
            title: str_field(fields, "title"),
            author: str_field(fields, "author"),
            isbn: str_field(fields, "isbn"),
            genre: str_field(fields, "genre"),
            tags: string_array(fields.get("tags")),
            year: int_field(fields, "year"),
            availability: str_field(fields, "availability")
                .as_deref()
                .and_then(BookStatus::parse),
        }
    } else {
        SearchFilters::Simplified {
            q: str_field(fields, "q"),
            status: str_field(fields, "status")
                .as_deref()
                .and_then(BookStatus::parse),
            genre: str_field(fields, "genre"),
            year: int_field(fields, "year"),
        }
    };

    SearchOutcome {
        filters,
        explanation,
    }
}

/// Interpreted enrichment output. `genre`/`summary` keep the book's
/// existing values when absent or blank, never overwriting with empty.
#[derive(Debug, Clone)]
pub struct Enrichment {
    pub tags: Vec<String>,
    pub genre: Option<String>,
    pub summary: Option<String>,
}

pub fn interpret_enrichment(text: &str, book: &Book) -> Enrichment {
    let parsed = parse_json_or_default(text, Value::Null);
    let fields = parsed.as_object();

    let tags = string_array(fields.and_then(|o| o.get("tags")));

    let genre = fields
        .and_then(|o| str_field(o, "genre"))
        .or_else(|| book.genre.clone());
    let summary = fields
        .and_then(|o| str_field(o, "summary"))
        .or_else(|| book.summary.clone());

    Enrichment {
        tags,
        genre,
        summary,
    }
}

fn str_field(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn int_field(obj: &serde_json::Map<String, Value>, key: &str) -> Option<i32> {
    match obj.get(key) {
        Some(Value::Number(n)) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
        // Providers sometimes quote numbers.
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Accept only an array of strings; anything else yields empty.
fn string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
