//! Prompt builders for the generation gateway.
//!
//! Pure functions, no I/O. The gateway is responsible for the outbound
//! prompt-length cap; these builders only cap the embedded user query.

/// Maximum characters of the user query embedded into the search prompt.
pub const QUERY_CAP: usize = 500;

/// Build the instruction prompt translating a natural-language query into
/// structured JSON filters.
pub fn build_search_prompt(query: &str) -> String {
    let query = truncate_chars(query.trim(), QUERY_CAP);
    format!(
        r#"You are an assistant that converts natural language library search queries into strict JSON filters.

User query: "{query}"

Return ONLY a JSON object with this structure, no extra text:
{{
  "filters": {{
    "title": string | null,
    "author": string | null,
    "isbn": string | null,
    "genre": string | null,
    "tags": string[] | null,
    "year": number | null,
    "availability": "AVAILABLE" | "BORROWED" | null
  }},
  "explanation": string
}}

Use partial strings where appropriate (for fuzzy match). If a field is not specified, set it to null.
"#
    )
}

/// Build the instruction prompt asking for enrichment metadata for a book.
pub fn build_enrich_prompt(title: &str, author: &str, description: Option<&str>) -> String {
    let description = match description {
        Some(d) if !d.trim().is_empty() => d,
        _ => "N/A",
    };
    format!(
        r#"You are helping a librarian enrich book metadata.

Book:
- Title: {title}
- Author: {author}
- Description: {description}

Return ONLY a JSON object with this structure, no extra text:
{{
  "tags": string[],
  "genre": string,
  "summary": string
}}

Tags should be 3-8 short keywords. Summary should be 2-4 sentences.
"#
    )
}

/// Truncate to at most `max` characters on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_prompt_embeds_trimmed_query() {
        let prompt = build_search_prompt("  dune books  ");
        assert!(prompt.contains("User query: \"dune books\""));
        assert!(prompt.contains("\"availability\""));
    }

    #[test]
    fn search_prompt_caps_query_at_500_chars() {
        let long = "x".repeat(800);
        let prompt = build_search_prompt(&long);
        assert!(prompt.contains(&"x".repeat(QUERY_CAP)));
        assert!(!prompt.contains(&"x".repeat(QUERY_CAP + 1)));
    }

    #[test]
    fn enrich_prompt_defaults_missing_description() {
        let prompt = build_enrich_prompt("Dune", "Frank Herbert", None);
        assert!(prompt.contains("- Description: N/A"));

        let blank = build_enrich_prompt("Dune", "Frank Herbert", Some("  "));
        assert!(blank.contains("- Description: N/A"));

        let given = build_enrich_prompt("Dune", "Frank Herbert", Some("A desert planet"));
        assert!(given.contains("- Description: A desert planet"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
