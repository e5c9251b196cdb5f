//! Core data types for the catalog: books, users, and audit records.
//!
//! Ids are numeric newtypes assigned by the store, starting at 1 and never
//! reused. All timestamps are UTC.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Identifier for a book record. Valid ids are nonzero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(pub u64);

impl BookId {
    /// Parse a user-supplied id string. Rejects zero and non-numeric input.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().parse::<u64>() {
            Ok(n) if n > 0 => Some(Self(n)),
            _ => None,
        }
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a user record. Valid ids are nonzero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl UserId {
    /// Parse a user-supplied id string. Rejects zero and non-numeric input.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().parse::<u64>() {
            Ok(n) if n > 0 => Some(Self(n)),
            _ => None,
        }
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Availability of a book. New books are always AVAILABLE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookStatus {
    Available,
    Borrowed,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::Borrowed => "BORROWED",
        }
    }

    /// Parse a status label case-insensitively. `ALL` and unknown labels
    /// yield `None` (no filter).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "AVAILABLE" => Some(Self::Available),
            "BORROWED" => Some(Self::Borrowed),
            _ => None,
        }
    }
}

impl std::fmt::Display for BookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access role. Role is never client-supplied; it comes from the stored
/// user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Librarian,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Librarian => "LIBRARIAN",
            Self::Member => "MEMBER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ADMIN" => Some(Self::Admin),
            "LIBRARIAN" => Some(Self::Librarian),
            "MEMBER" => Some(Self::Member),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistent record for a book in the catalog.
///
/// Invariant: `borrower`, `borrowed_at`, and `due_at` are all present iff
/// `status` is BORROWED, and all absent otherwise. The lifecycle functions
/// in [`crate::catalog::lifecycle`] are the only code that sets them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub status: BookStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub borrower: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub borrowed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    /// Enrichment summary produced by the generation gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating a book.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub year: Option<i32>,
}

impl NewBook {
    /// Validate field bounds. Returns the full list of issues, not just the
    /// first one.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), Vec<String>> {
        let mut issues = Vec::new();
        check_title(&self.title, &mut issues);
        check_author(&self.author, &mut issues);
        check_optional_fields(
            self.isbn.as_deref(),
            self.description.as_deref(),
            self.genre.as_deref(),
            &self.tags,
            self.year,
            now,
            &mut issues,
        );
        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }

    /// Materialize a book record. The caller supplies the id (from the
    /// store) and the creating user.
    pub fn into_book(self, id: BookId, created_by: UserId, now: DateTime<Utc>) -> Book {
        Book {
            id,
            title: self.title,
            author: self.author,
            isbn: none_if_blank(self.isbn),
            description: none_if_blank(self.description),
            genre: none_if_blank(self.genre),
            tags: self.tags,
            year: self.year,
            status: BookStatus::Available,
            borrower: None,
            borrowed_at: None,
            due_at: None,
            summary: None,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for a book. Lifecycle fields are not writable here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub year: Option<i32>,
}

impl BookPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.isbn.is_none()
            && self.description.is_none()
            && self.genre.is_none()
            && self.tags.is_none()
            && self.year.is_none()
    }

    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), Vec<String>> {
        let mut issues = Vec::new();
        if self.is_empty() {
            issues.push("update must change at least one field".into());
        }
        if let Some(ref title) = self.title {
            check_title(title, &mut issues);
        }
        if let Some(ref author) = self.author {
            check_author(author, &mut issues);
        }
        check_optional_fields(
            self.isbn.as_deref(),
            self.description.as_deref(),
            self.genre.as_deref(),
            self.tags.as_deref().unwrap_or(&[]),
            self.year,
            now,
            &mut issues,
        );
        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }

    /// Apply the patch to an existing book, bumping `updated_at`.
    pub fn apply(self, book: &mut Book, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            book.title = title;
        }
        if let Some(author) = self.author {
            book.author = author;
        }
        if let Some(isbn) = self.isbn {
            book.isbn = none_if_blank(Some(isbn));
        }
        if let Some(description) = self.description {
            book.description = none_if_blank(Some(description));
        }
        if let Some(genre) = self.genre {
            book.genre = none_if_blank(Some(genre));
        }
        if let Some(tags) = self.tags {
            book.tags = tags;
        }
        if let Some(year) = self.year {
            book.year = Some(year);
        }
        book.updated_at = now;
    }
}

fn check_title(title: &str, issues: &mut Vec<String>) {
    if title.trim().is_empty() {
        issues.push("title is required".into());
    } else if title.len() > 255 {
        issues.push("title must be at most 255 characters".into());
    }
}

fn check_author(author: &str, issues: &mut Vec<String>) {
    if author.trim().is_empty() {
        issues.push("author is required".into());
    } else if author.len() > 255 {
        issues.push("author must be at most 255 characters".into());
    }
}

fn check_optional_fields(
    isbn: Option<&str>,
    description: Option<&str>,
    genre: Option<&str>,
    tags: &[String],
    year: Option<i32>,
    now: DateTime<Utc>,
    issues: &mut Vec<String>,
) {
    if let Some(isbn) = isbn {
        if isbn.len() > 50 {
            issues.push("isbn must be at most 50 characters".into());
        }
    }
    if let Some(description) = description {
        if description.len() > 5000 {
            issues.push("description must be at most 5000 characters".into());
        }
    }
    if let Some(genre) = genre {
        if genre.len() > 100 {
            issues.push("genre must be at most 100 characters".into());
        }
    }
    for tag in tags {
        if tag.len() > 50 {
            issues.push(format!("tag \"{tag}\" exceeds 50 characters"));
        }
    }
    if let Some(year) = year {
        let max = now.year() + 1;
        if year < 0 || year > max {
            issues.push(format!("year must be between 0 and {max}"));
        }
    }
}

fn none_if_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Persistent record for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Stored lowercase; unique across the store.
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Public view of a user, attached to book detail responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Direction of a lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutAction {
    Checkout,
    Checkin,
}

impl std::fmt::Display for CheckoutAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Checkout => "CHECKOUT",
            Self::Checkin => "CHECKIN",
        })
    }
}

/// Append-only audit record for a checkout or checkin. Never updated or
/// deleted; exactly one per successful transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRecord {
    pub id: u64,
    pub book_id: BookId,
    /// The borrower, not necessarily the actor.
    pub user_id: UserId,
    /// Who performed the action.
    pub actor_id: UserId,
    pub action: CheckoutAction,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub override_used: bool,
}

/// Which operation drove a generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationKind {
    SmartSearch,
    EnrichBook,
}

impl std::fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::SmartSearch => "smart-search",
            Self::EnrichBook => "enrich-book",
        })
    }
}

/// Append-only audit record for a generation call. Written best-effort:
/// a failed write never blocks or reverses the primary operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub kind: GenerationKind,
    /// Which provider actually produced the output ("mock" after fallback).
    pub provider: String,
    pub model: String,
    pub prompt_len: usize,
    pub response_len: usize,
    pub duration_ms: u64,
    pub fallback_used: bool,
    pub at: DateTime<Utc>,
}
