//! Catalog engine: the top-level API for the biblion system.
//!
//! The [`Catalog`] owns the store, the generation gateway, and the audit
//! sink, and implements every operation the CLI and HTTP surfaces expose:
//! book CRUD, the checkout/checkin lifecycle, smart search, enrichment,
//! and user administration.

pub mod lifecycle;
pub mod model;
pub mod policy;
pub mod query;

use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, Utc};
use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

use crate::ai::interpret::{self, SearchOutcome};
use crate::ai::{Gateway, GenerationRequest, prompt};
use crate::audit::Auditor;
use crate::catalog::model::{
    Book, BookId, BookPatch, CheckoutAction, CheckoutRecord, GenerationKind, NewBook, PublicUser,
    Role, User, UserId,
};
use crate::catalog::policy::Action;
use crate::catalog::query::{ListQuery, Page, SEARCH_RESULT_CAP, SearchFilters};
use crate::config::ServiceConfig;
use crate::error::{BiblionResult, StoreError};
use crate::paths::BiblionPaths;
use crate::store::{CatalogStore, DurableStore, MemoryStore};

/// Errors from catalog operations.
#[derive(Debug, Error, Diagnostic)]
pub enum CatalogError {
    #[error("validation failed: {}", issues.join("; "))]
    #[diagnostic(
        code(biblion::catalog::validation),
        help("Fix the listed fields and retry.")
    )]
    Validation { issues: Vec<String> },

    #[error("authentication required")]
    #[diagnostic(code(biblion::catalog::unauthenticated))]
    Unauthenticated,

    #[error("not allowed to {action}")]
    #[diagnostic(
        code(biblion::catalog::forbidden),
        help("This operation requires a higher role.")
    )]
    Forbidden { action: &'static str },

    #[error("book {id} not found")]
    #[diagnostic(code(biblion::catalog::book_not_found))]
    BookNotFound { id: BookId },

    #[error("user {id} not found")]
    #[diagnostic(code(biblion::catalog::user_not_found))]
    UserNotFound { id: UserId },

    #[error("{message}")]
    #[diagnostic(code(biblion::catalog::invalid_state))]
    InvalidState { message: String },

    #[error("a user with email \"{email}\" already exists")]
    #[diagnostic(code(biblion::catalog::duplicate_email))]
    DuplicateEmail { email: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Parameters for a checkout.
#[derive(Debug, Clone, Default)]
pub struct CheckoutRequest {
    /// Explicit borrower; honoured only for staff actors, otherwise the
    /// actor borrows for themselves.
    pub user_id: Option<UserId>,
    /// Displace an existing loan; honoured only for staff actors.
    pub override_loan: bool,
}

/// Result of a smart search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub books: Vec<Book>,
    pub filters: SearchFilters,
    pub explanation: String,
    /// Which provider actually produced the filters ("mock" after a
    /// fallback).
    pub provider: String,
}

/// Result of an enrichment.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichResponse {
    pub book: Book,
    pub provider: String,
}

/// Book detail with the borrower attached as a public view.
#[derive(Debug, Clone, Serialize)]
pub struct BookDetail {
    #[serde(flatten)]
    pub book: Book,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub borrowed_by: Option<PublicUser>,
}

/// What `seed_demo` created.
#[derive(Debug, Clone, Serialize)]
pub struct SeedReport {
    pub users_created: usize,
    pub books_created: usize,
}

/// The biblion catalog engine.
pub struct Catalog {
    store: Arc<dyn CatalogStore>,
    gateway: Gateway,
    auditor: Auditor,
    loan_period: Duration,
}

impl Catalog {
    /// Build a catalog over an explicit store and gateway.
    pub fn new(store: Arc<dyn CatalogStore>, gateway: Gateway, config: &ServiceConfig) -> Self {
        let auditor = Auditor::new(Arc::clone(&store));
        Self {
            store,
            gateway,
            auditor,
            loan_period: Duration::days(config.loan_days.max(1)),
        }
    }

    /// Open the durable catalog under the resolved data directory.
    pub fn open(paths: &BiblionPaths, config: &ServiceConfig) -> BiblionResult<Self> {
        let store = Arc::new(DurableStore::open(&paths.catalog_dir())?);
        Ok(Self::new(store, Gateway::new(&config.ai), config))
    }

    /// Memory-only catalog, mainly for tests and ephemeral servers.
    pub fn in_memory(config: &ServiceConfig) -> BiblionResult<Self> {
        let store = Arc::new(MemoryStore::new());
        Ok(Self::new(store, Gateway::new(&config.ai), config))
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    // ── Books ────────────────────────────────────────────────────────

    pub fn create_book(&self, actor: &User, draft: NewBook) -> CatalogResult<Book> {
        policy::authorize(actor.role, Action::CreateBook)?;
        let now = Utc::now();
        draft
            .validate(now)
            .map_err(|issues| CatalogError::Validation { issues })?;

        let book = self
            .store
            .create_book(draft.into_book(BookId(0), actor.id, now))?;
        tracing::info!(book_id = %book.id, title = %book.title, "book created");
        Ok(book)
    }

    pub fn get_book(&self, id: BookId) -> CatalogResult<Book> {
        self.store
            .get_book(id)?
            .ok_or(CatalogError::BookNotFound { id })
    }

    /// Book detail with the borrower resolved to a public user view.
    pub fn book_detail(&self, id: BookId) -> CatalogResult<BookDetail> {
        let book = self.get_book(id)?;
        let borrowed_by = match book.borrower {
            Some(user_id) => self.store.get_user(user_id)?.as_ref().map(PublicUser::from),
            None => None,
        };
        Ok(BookDetail { book, borrowed_by })
    }

    pub fn list_books(&self, query: &ListQuery) -> CatalogResult<Page<Book>> {
        let mut books: Vec<Book> = self
            .store
            .all_books()?
            .into_iter()
            .filter(|b| query.matches(b))
            .collect();
        let total = books.len();
        query.sort_books(&mut books);

        let page = query.page();
        let limit = query.limit();
        let data = books
            .into_iter()
            .skip((page - 1) * limit)
            .take(limit)
            .collect();

        Ok(Page {
            data,
            total,
            page,
            limit,
        })
    }

    pub fn update_book(&self, actor: &User, id: BookId, patch: BookPatch) -> CatalogResult<Book> {
        policy::authorize(actor.role, Action::UpdateBook)?;
        let now = Utc::now();
        patch
            .validate(now)
            .map_err(|issues| CatalogError::Validation { issues })?;

        let mut book = self.get_book(id)?;
        patch.apply(&mut book, now);
        self.store.put_book(&book)?;
        Ok(book)
    }

    pub fn delete_book(&self, actor: &User, id: BookId) -> CatalogResult<()> {
        policy::authorize(actor.role, Action::DeleteBook)?;
        if !self.store.delete_book(id)? {
            return Err(CatalogError::BookNotFound { id });
        }
        tracing::info!(book_id = %id, "book deleted");
        Ok(())
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Check a book out. See [`lifecycle::checkout`] for the transition
    /// rules; this method adds authorization, borrower resolution, the
    /// guarded store write, and the audit record.
    pub fn checkout(&self, actor: &User, id: BookId, req: &CheckoutRequest) -> CatalogResult<Book> {
        policy::authorize(actor.role, Action::Checkout)?;

        let staff = policy::allows(actor.role, Action::CheckoutForOther);
        let borrower = match req.user_id {
            Some(user_id) if staff => user_id,
            _ => actor.id,
        };
        let override_loan = req.override_loan && policy::allows(actor.role, Action::OverrideLoan);

        if self.store.get_user(borrower)?.is_none() {
            return Err(CatalogError::UserNotFound { id: borrower });
        }

        let book = self.get_book(id)?;
        let now = Utc::now();
        let transition = lifecycle::checkout(&book, borrower, now, self.loan_period, override_loan)?;

        self.store
            .put_book_guarded(&transition.book, book.status)
            .map_err(conflict_to_invalid_state)?;

        self.auditor.record_checkout(
            id,
            borrower,
            actor.id,
            CheckoutAction::Checkout,
            now,
            transition.book.due_at,
            transition.override_used,
        );

        tracing::info!(
            book_id = %id,
            borrower = %borrower,
            actor = %actor.id,
            override_used = transition.override_used,
            "book checked out"
        );
        Ok(transition.book)
    }

    /// Return a book to the shelf. Staff only.
    pub fn checkin(&self, actor: &User, id: BookId) -> CatalogResult<Book> {
        policy::authorize(actor.role, Action::Checkin)?;

        let book = self.get_book(id)?;
        let now = Utc::now();
        let transition = lifecycle::checkin(&book, now)?;

        self.store
            .put_book_guarded(&transition.book, book.status)
            .map_err(conflict_to_invalid_state)?;

        // Legacy records may be BORROWED without a borrower; the checkin
        // still succeeds but there is nobody to attribute it to.
        if let Some(prior) = transition.prior_borrower {
            self.auditor.record_checkout(
                id,
                prior,
                actor.id,
                CheckoutAction::Checkin,
                now,
                None,
                false,
            );
        }

        tracing::info!(book_id = %id, actor = %actor.id, "book checked in");
        Ok(transition.book)
    }

    pub fn history(&self, actor: &User, id: BookId) -> CatalogResult<Vec<CheckoutRecord>> {
        policy::authorize(actor.role, Action::ViewHistory)?;
        // 404 for a missing book, not an empty trail.
        self.get_book(id)?;
        Ok(self.store.checkout_history(id)?)
    }

    // ── AI operations ────────────────────────────────────────────────

    /// Translate a natural-language query into filters and run the search.
    ///
    /// Never fails on provider trouble: the gateway substitutes the mock
    /// generator, so a valid query always yields a result set.
    pub fn smart_search(&self, user: Option<&User>, raw_query: &str) -> CatalogResult<SearchResponse> {
        let query = prompt::truncate_chars(raw_query.trim(), prompt::QUERY_CAP);
        if query.is_empty() {
            return Err(CatalogError::Validation {
                issues: vec!["query is required".into()],
            });
        }

        let request = GenerationRequest::search(query);
        let started = Instant::now();
        let (generation, fallback_used) = self.gateway.generate_or_fallback(&request);

        let SearchOutcome {
            filters,
            explanation,
        } = interpret::interpret_search(&generation.text, SearchFilters::default());

        let mut books: Vec<Book> = self
            .store
            .all_books()?
            .into_iter()
            .filter(|b| filters.matches(b))
            .collect();
        books.sort_by_key(|b| b.id);
        books.truncate(SEARCH_RESULT_CAP);

        self.auditor.record_generation(
            user.map(|u| u.id),
            GenerationKind::SmartSearch,
            &generation.provider,
            &generation.model,
            request.prompt.len(),
            generation.text.len(),
            started.elapsed().as_millis() as u64,
            fallback_used,
        );

        tracing::debug!(
            provider = %generation.provider,
            fallback_used,
            results = books.len(),
            "smart search completed"
        );

        Ok(SearchResponse {
            books,
            filters,
            explanation,
            provider: generation.provider,
        })
    }

    /// Fill in tags, genre, and a summary via the generation gateway.
    pub fn enrich_book(&self, actor: &User, id: BookId) -> CatalogResult<EnrichResponse> {
        policy::authorize(actor.role, Action::EnrichBook)?;

        let mut book = self.get_book(id)?;
        let request =
            GenerationRequest::enrich(&book.title, &book.author, book.description.as_deref());
        let started = Instant::now();
        let (generation, fallback_used) = self.gateway.generate_or_fallback(&request);

        let enrichment = interpret::interpret_enrichment(&generation.text, &book);
        if !enrichment.tags.is_empty() {
            book.tags = enrichment.tags;
        }
        book.genre = enrichment.genre;
        book.summary = enrichment.summary;
        book.updated_at = Utc::now();
        self.store.put_book(&book)?;

        self.auditor.record_generation(
            Some(actor.id),
            GenerationKind::EnrichBook,
            &generation.provider,
            &generation.model,
            request.prompt.len(),
            generation.text.len(),
            started.elapsed().as_millis() as u64,
            fallback_used,
        );

        tracing::info!(book_id = %id, provider = %generation.provider, "book enriched");
        Ok(EnrichResponse {
            book,
            provider: generation.provider,
        })
    }

    // ── Users ────────────────────────────────────────────────────────

    /// Find a user by verified email, creating a MEMBER on first contact.
    /// This backs the session exchange: identity verification happens
    /// upstream.
    pub fn login_or_create_user(&self, email: &str, name: &str) -> CatalogResult<User> {
        let email = email.trim().to_lowercase();
        let name = name.trim();
        if email.is_empty() || !email.contains('@') || name.is_empty() {
            return Err(CatalogError::Validation {
                issues: vec!["email and name are required".into()],
            });
        }

        if let Some(user) = self.store.find_user_by_email(&email)? {
            return Ok(user);
        }

        let user = self.create_user_record(&email, name, Role::Member)?;
        tracing::info!(user_id = %user.id, %user.email, "user created on first login");
        Ok(user)
    }

    /// Create a user with an explicit role. Admin only.
    pub fn create_user(
        &self,
        actor: &User,
        email: &str,
        name: &str,
        role: Role,
    ) -> CatalogResult<User> {
        policy::authorize(actor.role, Action::ManageUsers)?;
        self.create_user_record(&email.trim().to_lowercase(), name.trim(), role)
    }

    /// Create the bootstrap admin if no user owns the email yet. Used by
    /// `biblion init`, before any actor exists.
    pub fn ensure_admin(&self, email: &str, name: &str) -> CatalogResult<User> {
        let email = email.trim().to_lowercase();
        if let Some(existing) = self.store.find_user_by_email(&email)? {
            return Ok(existing);
        }
        self.create_user_record(&email, name.trim(), Role::Admin)
    }

    fn create_user_record(&self, email: &str, name: &str, role: Role) -> CatalogResult<User> {
        if email.is_empty() || !email.contains('@') || name.is_empty() {
            return Err(CatalogError::Validation {
                issues: vec!["email and name are required".into()],
            });
        }
        let user = User {
            id: UserId(0),
            email: email.to_string(),
            name: name.to_string(),
            role,
            created_at: Utc::now(),
        };
        self.store.create_user(user).map_err(|e| match e {
            StoreError::Conflict { .. } => CatalogError::DuplicateEmail {
                email: email.to_string(),
            },
            other => other.into(),
        })
    }

    pub fn set_user_role(&self, actor: &User, id: UserId, role: Role) -> CatalogResult<User> {
        policy::authorize(actor.role, Action::ManageUsers)?;
        let mut user = self
            .store
            .get_user(id)?
            .ok_or(CatalogError::UserNotFound { id })?;
        user.role = role;
        self.store.put_user(&user)?;
        tracing::info!(user_id = %id, role = %role, "user role changed");
        Ok(user)
    }

    pub fn list_users(&self, actor: &User) -> CatalogResult<Vec<User>> {
        policy::authorize(actor.role, Action::ManageUsers)?;
        let mut users = self.store.all_users()?;
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    pub fn find_user_by_email(&self, email: &str) -> CatalogResult<Option<User>> {
        Ok(self.store.find_user_by_email(email)?)
    }

    // ── Seeding ──────────────────────────────────────────────────────

    /// Load the demo roster: four users and a small fixed catalog.
    /// Existing users are kept; books are only added when the shelf is
    /// empty.
    pub fn seed_demo(&self, actor: &User) -> CatalogResult<SeedReport> {
        policy::authorize(actor.role, Action::ManageUsers)?;

        let mut users_created = 0;
        let roster = [
            ("admin@example.com", "Admin User", Role::Admin),
            ("librarian@example.com", "Librarian User", Role::Librarian),
            ("member1@example.com", "Member One", Role::Member),
            ("member2@example.com", "Member Two", Role::Member),
        ];
        let mut librarian_id = actor.id;
        for (email, name, role) in roster {
            match self.store.find_user_by_email(email)? {
                Some(existing) => {
                    if existing.role == Role::Librarian {
                        librarian_id = existing.id;
                    }
                }
                None => {
                    let user = self.create_user_record(email, name, role)?;
                    if role == Role::Librarian {
                        librarian_id = user.id;
                    }
                    users_created += 1;
                }
            }
        }

        let mut books_created = 0;
        if self.store.all_books()?.is_empty() {
            for (title, author, genre, tags, year) in DEMO_BOOKS {
                let draft = NewBook {
                    title: (*title).into(),
                    author: (*author).into(),
                    genre: Some((*genre).into()),
                    tags: tags.iter().map(|t| t.to_string()).collect(),
                    year: Some(*year),
                    ..Default::default()
                };
                let now = Utc::now();
                self.store
                    .create_book(draft.into_book(BookId(0), librarian_id, now))?;
                books_created += 1;
            }
        }

        tracing::info!(users_created, books_created, "demo data seeded");
        Ok(SeedReport {
            users_created,
            books_created,
        })
    }
}

fn conflict_to_invalid_state(e: StoreError) -> CatalogError {
    match e {
        StoreError::Conflict { .. } => CatalogError::InvalidState {
            message: "book was modified concurrently, retry".into(),
        },
        other => other.into(),
    }
}

/// Demo catalog matching the historical seed roster.
const DEMO_BOOKS: &[(&str, &str, &str, &[&str], i32)] = &[
    ("The Pragmatic Programmer", "Andrew Hunt", "Technology", &["programming", "software"], 1999),
    ("Clean Code", "Robert C. Martin", "Technology", &["programming", "best practices"], 2008),
    ("To Kill a Mockingbird", "Harper Lee", "Fiction", &["classic", "justice"], 1960),
    ("1984", "George Orwell", "Fiction", &["dystopia", "politics"], 1949),
    ("The Great Gatsby", "F. Scott Fitzgerald", "Fiction", &["classic", "american"], 1925),
    ("Sapiens", "Yuval Noah Harari", "History", &["history", "evolution"], 2011),
    ("The Lean Startup", "Eric Ries", "Business", &["startup", "business"], 2011),
    ("Thinking, Fast and Slow", "Daniel Kahneman", "Psychology", &["behavior", "cognition"], 2011),
    ("The Hobbit", "J.R.R. Tolkien", "Fantasy", &["fantasy", "adventure"], 1937),
    ("The Lord of the Rings", "J.R.R. Tolkien", "Fantasy", &["fantasy", "epic"], 1954),
    ("Dune", "Frank Herbert", "Science Fiction", &["sci-fi", "epic"], 1965),
    ("The Phoenix Project", "Gene Kim", "Business", &["devops", "it"], 2013),
    ("Deep Work", "Cal Newport", "Productivity", &["focus", "productivity"], 2016),
    ("Atomic Habits", "James Clear", "Self-help", &["habits", "self-improvement"], 2018),
    ("Designing Data-Intensive Applications", "Martin Kleppmann", "Technology", &["databases", "systems"], 2017),
];
