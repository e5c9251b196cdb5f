//! Filter compilation: interpreted search filters → book predicates, plus
//! the plain listing query.
//!
//! Two historical filter shapes exist: the structured per-field shape the
//! strict-JSON prompt asks for, and the simplified `{q, status, genre,
//! year}` shape the mock generator emits. They are kept as a tagged union
//! so one query never mixes fields from both shapes.

use serde::Serialize;

use crate::catalog::model::{Book, BookStatus};

/// Hard cap on smart-search results.
pub const SEARCH_RESULT_CAP: usize = 20;

/// Interpreted search filters, in one of the two historical shapes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SearchFilters {
    Structured {
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        author: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        isbn: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        genre: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        tags: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        year: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        availability: Option<BookStatus>,
    },
    Simplified {
        #[serde(skip_serializing_if = "Option::is_none")]
        q: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<BookStatus>,
        #[serde(skip_serializing_if = "Option::is_none")]
        genre: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        year: Option<i32>,
    },
}

impl Default for SearchFilters {
    /// The match-everything fallback used when generation output cannot be
    /// interpreted.
    fn default() -> Self {
        Self::Simplified {
            q: None,
            status: None,
            genre: None,
            year: None,
        }
    }
}

impl SearchFilters {
    /// Whether a book satisfies these filters.
    pub fn matches(&self, book: &Book) -> bool {
        match self {
            Self::Structured {
                title,
                author,
                isbn,
                genre,
                tags,
                year,
                availability,
            } => {
                if let Some(t) = title {
                    if !contains_ci(&book.title, t) {
                        return false;
                    }
                }
                if let Some(a) = author {
                    if !contains_ci(&book.author, a) {
                        return false;
                    }
                }
                if let Some(i) = isbn {
                    if !book.isbn.as_deref().is_some_and(|v| contains_ci(v, i)) {
                        return false;
                    }
                }
                if let Some(g) = genre {
                    if !book.genre.as_deref().is_some_and(|v| contains_ci(v, g)) {
                        return false;
                    }
                }
                // Every requested tag must match some book tag.
                for wanted in tags {
                    if !book.tags.iter().any(|t| contains_ci(t, wanted)) {
                        return false;
                    }
                }
                if let Some(y) = year {
                    if book.year != Some(*y) {
                        return false;
                    }
                }
                if let Some(status) = availability {
                    if book.status != *status {
                        return false;
                    }
                }
                true
            }
            Self::Simplified {
                q,
                status,
                genre,
                year,
            } => {
                if let Some(q) = q.as_deref().filter(|q| !q.is_empty()) {
                    if !matches_free_text(book, q) {
                        return false;
                    }
                }
                if let Some(status) = status {
                    if book.status != *status {
                        return false;
                    }
                }
                if let Some(g) = genre {
                    if !book.genre.as_deref().is_some_and(|v| eq_ci(v, g)) {
                        return false;
                    }
                }
                if let Some(y) = year {
                    if book.year != Some(*y) {
                        return false;
                    }
                }
                true
            }
        }
    }
}

/// Free-text match across title, author, isbn, genre, and tags. A hit on
/// any field matches.
fn matches_free_text(book: &Book, q: &str) -> bool {
    // Any space-separated term may hit any field.
    q.split_whitespace().any(|term| {
        contains_ci(&book.title, term)
            || contains_ci(&book.author, term)
            || book.isbn.as_deref().is_some_and(|v| contains_ci(v, term))
            || book.genre.as_deref().is_some_and(|v| contains_ci(v, term))
            || book.tags.iter().any(|t| contains_ci(t, term))
    })
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn eq_ci(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Sortable fields for the listing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    Title,
    Author,
    Year,
}

impl SortField {
    pub fn parse(s: &str) -> Self {
        match s {
            "title" => Self::Title,
            "author" => Self::Author,
            "year" => Self::Year,
            _ => Self::CreatedAt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("asc") {
            Self::Asc
        } else {
            Self::Desc
        }
    }
}

/// Parameters for the plain listing endpoint (`GET /books`).
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub q: Option<String>,
    pub availability: Option<BookStatus>,
    /// Exact genre match, unlike the substring semantics of search filters.
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub sort: SortField,
    pub order: SortOrder,
}

impl ListQuery {
    pub fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(10).clamp(1, 100)
    }

    /// Whether a book passes the listing filters.
    pub fn matches(&self, book: &Book) -> bool {
        if let Some(q) = self.q.as_deref().filter(|q| !q.is_empty()) {
            if !matches_free_text(book, q) {
                return false;
            }
        }
        if let Some(status) = self.availability {
            if book.status != status {
                return false;
            }
        }
        if let Some(ref g) = self.genre {
            if !book.genre.as_deref().is_some_and(|v| eq_ci(v, g)) {
                return false;
            }
        }
        if let Some(y) = self.year {
            if book.year != Some(y) {
                return false;
            }
        }
        true
    }

    /// Sort books in place according to `sort`/`order`.
    pub fn sort_books(&self, books: &mut [Book]) {
        books.sort_by(|a, b| {
            let ord = match self.sort {
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
                SortField::Author => a.author.to_lowercase().cmp(&b.author.to_lowercase()),
                SortField::Year => a.year.cmp(&b.year),
            };
            // Ties fall back to id so pagination is stable.
            let ord = ord.then(a.id.cmp(&b.id));
            match self.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
    }
}

/// One page of listing results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::model::{BookId, NewBook, UserId};
    use chrono::Utc;

    fn book(title: &str, author: &str, genre: Option<&str>, tags: &[&str], year: i32) -> Book {
        let mut b = NewBook {
            title: title.into(),
            author: author.into(),
            genre: genre.map(String::from),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            year: Some(year),
            ..Default::default()
        }
        .into_book(BookId(1), UserId(1), Utc::now());
        b.isbn = Some("978-0441013593".into());
        b
    }

    fn dune() -> Book {
        book(
            "Dune",
            "Frank Herbert",
            Some("Science Fiction"),
            &["sci-fi", "epic"],
            1965,
        )
    }

    #[test]
    fn structured_title_is_substring_and_case_insensitive() {
        let f = SearchFilters::Structured {
            title: Some("dUn".into()),
            author: None,
            isbn: None,
            genre: None,
            tags: vec![],
            year: None,
            availability: None,
        };
        assert!(f.matches(&dune()));
    }

    #[test]
    fn structured_requires_every_tag_to_hit() {
        let hit = SearchFilters::Structured {
            title: None,
            author: None,
            isbn: None,
            genre: None,
            tags: vec!["SCI".into(), "epic".into()],
            year: None,
            availability: None,
        };
        assert!(hit.matches(&dune()));

        let miss = SearchFilters::Structured {
            title: None,
            author: None,
            isbn: None,
            genre: None,
            tags: vec!["sci".into(), "romance".into()],
            year: None,
            availability: None,
        };
        assert!(!miss.matches(&dune()));
    }

    #[test]
    fn structured_year_and_availability_are_exact() {
        let f = SearchFilters::Structured {
            title: None,
            author: None,
            isbn: None,
            genre: None,
            tags: vec![],
            year: Some(1965),
            availability: Some(BookStatus::Available),
        };
        assert!(f.matches(&dune()));

        let wrong_year = SearchFilters::Structured {
            title: None,
            author: None,
            isbn: None,
            genre: None,
            tags: vec![],
            year: Some(1966),
            availability: None,
        };
        assert!(!wrong_year.matches(&dune()));
    }

    #[test]
    fn simplified_q_hits_any_field() {
        let by_tag = SearchFilters::Simplified {
            q: Some("epic".into()),
            status: None,
            genre: None,
            year: None,
        };
        assert!(by_tag.matches(&dune()));

        let by_author = SearchFilters::Simplified {
            q: Some("herbert".into()),
            status: None,
            genre: None,
            year: None,
        };
        assert!(by_author.matches(&dune()));

        let miss = SearchFilters::Simplified {
            q: Some("cooking".into()),
            status: None,
            genre: None,
            year: None,
        };
        assert!(!miss.matches(&dune()));
    }

    #[test]
    fn simplified_genre_is_exact_match() {
        let exact = SearchFilters::Simplified {
            q: None,
            status: None,
            genre: Some("science fiction".into()),
            year: None,
        };
        assert!(exact.matches(&dune()));

        let partial = SearchFilters::Simplified {
            q: None,
            status: None,
            genre: Some("science".into()),
            year: None,
        };
        assert!(!partial.matches(&dune()));
    }

    #[test]
    fn default_filters_match_everything() {
        assert!(SearchFilters::default().matches(&dune()));
    }

    #[test]
    fn serialized_filters_omit_absent_fields() {
        let json = serde_json::to_value(SearchFilters::Simplified {
            q: Some("dune".into()),
            status: None,
            genre: None,
            year: Some(1965),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"q": "dune", "year": 1965}));
    }

    #[test]
    fn list_query_defaults_and_clamps() {
        let q = ListQuery::default();
        assert_eq!(q.page(), 1);
        assert_eq!(q.limit(), 10);

        let q = ListQuery {
            page: Some(0),
            limit: Some(1000),
            ..Default::default()
        };
        assert_eq!(q.page(), 1);
        assert_eq!(q.limit(), 100);
    }

    #[test]
    fn list_sort_by_year_descending() {
        let mut books = vec![
            book("A", "x", None, &[], 1990),
            book("B", "y", None, &[], 2010),
            book("C", "z", None, &[], 2000),
        ];
        let q = ListQuery {
            sort: SortField::Year,
            order: SortOrder::Desc,
            ..Default::default()
        };
        q.sort_books(&mut books);
        let years: Vec<_> = books.iter().map(|b| b.year.unwrap()).collect();
        assert_eq!(years, vec![2010, 2000, 1990]);
    }
}
