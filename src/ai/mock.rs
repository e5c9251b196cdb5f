//! Deterministic offline generator used as the fallback provider.
//!
//! Produces the same JSON shapes a live provider would, computed locally
//! from the user's words. No network, no failure mode: every input yields
//! valid JSON, which is what lets the gateway degrade gracefully.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::json;

/// Words carrying no filter signal, removed before keyword extraction.
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "of", "and", "or", "for", "from", "with", "about", "books", "book", "show",
    "me", "find", "all", "that", "are", "in", "on", "to",
];

/// Availability directives, consumed rather than treated as keywords.
const STATUS_WORDS: &[&str] = &["available", "borrowed", "checked", "out"];

/// Keyword buckets for coarse genre classification, first hit wins.
const GENRE_BUCKETS: &[(&[&str], &str)] = &[
    (&["space", "planet", "galaxy", "alien"], "Science Fiction"),
    (&["recipe", "cooking", "cook", "food"], "Cooking"),
    (&["history", "historical", "war"], "History"),
    (&["business", "startup", "finance"], "Business"),
    (&["fantasy", "dragon", "magic"], "Fantasy"),
];

const MAX_QUERY_KEYWORDS: usize = 3;
const MAX_ENRICH_TAGS: usize = 6;
const SUMMARY_DESCRIPTION_CAP: usize = 220;

/// Lowercase, strip non-alphanumerics, split on whitespace, drop stop
/// words, and de-duplicate preserving first occurrence.
fn keywords(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut seen = Vec::new();
    for word in cleaned.split_whitespace() {
        if word.len() > 50 || STOP_WORDS.contains(&word) {
            continue;
        }
        if !seen.iter().any(|s| s == word) {
            seen.push(word.to_string());
        }
    }
    seen
}

/// 4-digit years in 1900..=2099.
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").expect("year pattern is valid"));

/// First 4-digit year in 1900..=2099, if any.
fn extract_year(text: &str) -> Option<i32> {
    YEAR_RE.find(text).and_then(|m| m.as_str().parse().ok())
}

/// Classify a coarse genre from keywords. Returns the genre and the
/// matched word so the caller can consume it.
fn classify_genre(words: &[String]) -> Option<(&'static str, String)> {
    for (bucket, genre) in GENRE_BUCKETS {
        // Prefix match so plural forms ("planets", "dragons") still hit.
        if let Some(hit) = words
            .iter()
            .find(|w| bucket.iter().any(|b| w.starts_with(b)))
        {
            return Some((genre, hit.clone()));
        }
    }
    None
}

/// Translate a natural-language query into the simplified filter shape.
///
/// Returns JSON text: `{"q"?, "status"?, "genre"?, "year"?, "explanation"}`
/// with absent filters omitted.
pub fn smart_search(query: &str) -> String {
    let lower = query.to_lowercase();

    let status = if lower.contains("available") {
        Some("AVAILABLE")
    } else if lower.contains("borrowed") || lower.contains("checked") {
        Some("BORROWED")
    } else {
        None
    };

    let year = extract_year(query);

    let mut words = keywords(query);
    words.retain(|w| !STATUS_WORDS.contains(&w.as_str()));
    if let Some(y) = year {
        words.retain(|w| w != &y.to_string());
    }

    let genre = classify_genre(&words).map(|(genre, matched)| {
        words.retain(|w| w != &matched);
        genre
    });

    words.truncate(MAX_QUERY_KEYWORDS);
    let q = if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    };

    let mut pieces = Vec::new();
    match status {
        Some("AVAILABLE") => pieces.push("available".to_string()),
        Some("BORROWED") => pieces.push("borrowed".to_string()),
        _ => {}
    }
    if let Some(genre) = genre {
        pieces.push(genre.to_string());
    }
    let mut explanation = if pieces.is_empty() {
        "Showing books".to_string()
    } else {
        format!("Showing {} books", pieces.join(" "))
    };
    if let Some(y) = year {
        explanation.push_str(&format!(" from {y}"));
    }
    if let Some(ref q) = q {
        explanation.push_str(&format!(" matching \"{q}\""));
    }
    explanation.push('.');

    let mut out = json!({ "explanation": explanation });
    if let Some(q) = q {
        out["q"] = json!(q);
    }
    if let Some(status) = status {
        out["status"] = json!(status);
    }
    if let Some(genre) = genre {
        out["genre"] = json!(genre);
    }
    if let Some(year) = year {
        out["year"] = json!(year);
    }
    out.to_string()
}

/// Produce enrichment metadata from whatever the record already carries.
///
/// Returns JSON text: `{"tags": [...], "genre": ..., "summary": ...}`.
pub fn enrich_book(title: &str, author: &str, description: Option<&str>) -> String {
    let description = description.unwrap_or("").trim();
    let combined = format!("{title} {author} {description}");

    let mut tags = keywords(&combined);
    tags.truncate(MAX_ENRICH_TAGS);

    let genre = classify_genre(&keywords(&combined))
        .map(|(g, _)| g)
        .unwrap_or("General");

    let author_label = if author.trim().is_empty() {
        "an unknown author"
    } else {
        author
    };

    let summary = if !description.is_empty() {
        let short = crate::ai::prompt::truncate_chars(description, SUMMARY_DESCRIPTION_CAP);
        format!("This book, \"{title}\" by {author_label}, is about {short}.")
    } else if !title.trim().is_empty() || !author.trim().is_empty() {
        format!(
            "\"{title}\" by {author_label} is a {} book.",
            genre.to_lowercase()
        )
    } else {
        "A book with limited metadata available.".to_string()
    };

    json!({ "tags": tags, "genre": genre, "summary": summary }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn parse(text: &str) -> Value {
        serde_json::from_str(text).expect("mock output is valid JSON")
    }

    #[test]
    fn literal_year_becomes_year_filter() {
        let out = parse(&smart_search("books from 1965"));
        assert_eq!(out["year"], 1965);
        // The year token is not also a keyword.
        assert!(out.get("q").is_none());
    }

    #[test]
    fn year_outside_range_is_ignored() {
        let out = parse(&smart_search("books from 1850"));
        assert!(out.get("year").is_none());
        assert_eq!(out["q"], "1850");
    }

    #[test]
    fn available_keyword_sets_status() {
        let out = parse(&smart_search("available books"));
        assert_eq!(out["status"], "AVAILABLE");
    }

    #[test]
    fn checked_out_sets_borrowed_status() {
        let out = parse(&smart_search("checked out books"));
        assert_eq!(out["status"], "BORROWED");
        let out = parse(&smart_search("borrowed books"));
        assert_eq!(out["status"], "BORROWED");
    }

    #[test]
    fn space_keyword_classifies_science_fiction() {
        let out = parse(&smart_search("books about space"));
        assert_eq!(out["genre"], "Science Fiction");
        // The bucket word is consumed, not echoed as a keyword.
        assert!(out.get("q").is_none());
    }

    #[test]
    fn stop_words_never_become_keywords() {
        let out = parse(&smart_search("show me all the books that are about wizards"));
        assert_eq!(out["q"], "wizards");
    }

    #[test]
    fn combined_query_extracts_every_filter() {
        let out = parse(&smart_search(
            "Available sci-fi books from 1965 about desert planets",
        ));
        assert_eq!(out["status"], "AVAILABLE");
        assert_eq!(out["genre"], "Science Fiction"); // via "planets"
        assert_eq!(out["year"], 1965);
        assert!(out["explanation"].as_str().unwrap().contains("1965"));
    }

    #[test]
    fn keywords_are_capped_at_three() {
        let out = parse(&smart_search("dusty ancient forgotten mysterious tomes"));
        let q = out["q"].as_str().unwrap();
        assert_eq!(q.split_whitespace().count(), 3);
    }

    #[test]
    fn explanation_is_always_present() {
        let out = parse(&smart_search(""));
        assert!(out["explanation"].as_str().unwrap().ends_with('.'));
    }

    #[test]
    fn enrich_without_description_uses_genre_template() {
        let out = parse(&enrich_book("Space Odyssey", "Arthur Clarke", None));
        assert_eq!(
            out["summary"],
            "\"Space Odyssey\" by Arthur Clarke is a science fiction book."
        );
        assert_eq!(out["genre"], "Science Fiction");
    }

    #[test]
    fn enrich_general_fallback_genre() {
        let out = parse(&enrich_book("Dune", "Frank Herbert", Some("")));
        assert_eq!(out["genre"], "General");
        assert_eq!(out["summary"], "\"Dune\" by Frank Herbert is a general book.");
        let tags: Vec<&str> = out["tags"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t.as_str().unwrap())
            .collect();
        assert_eq!(tags, vec!["dune", "frank", "herbert"]);
    }

    #[test]
    fn enrich_with_description_embeds_truncated_text() {
        let long = "d".repeat(300);
        let out = parse(&enrich_book("Dune", "Frank Herbert", Some(&long)));
        let summary = out["summary"].as_str().unwrap();
        assert!(summary.starts_with("This book, \"Dune\" by Frank Herbert, is about"));
        assert!(summary.contains(&"d".repeat(220)));
        assert!(!summary.contains(&"d".repeat(221)));
    }

    #[test]
    fn enrich_missing_author_uses_unknown_author_label() {
        let out = parse(&enrich_book("Nameless", "", None));
        assert_eq!(out["summary"], "\"Nameless\" by an unknown author is a general book.");
    }

    #[test]
    fn enrich_with_nothing_reports_limited_metadata() {
        let out = parse(&enrich_book("", "", None));
        assert_eq!(out["summary"], "A book with limited metadata available.");
    }

    #[test]
    fn enrich_tags_deduplicate_and_cap_at_six() {
        let out = parse(&enrich_book(
            "Dragons Dragons Dragons",
            "Anne McCaffrey",
            Some("dragons flying over misty ancient mountain keeps"),
        ));
        let tags = out["tags"].as_array().unwrap();
        assert!(tags.len() <= 6);
        let names: Vec<&str> = tags.iter().map(|t| t.as_str().unwrap()).collect();
        assert_eq!(
            names.iter().filter(|t| **t == "dragons").count(),
            1,
            "tags must be distinct: {names:?}"
        );
    }
}
