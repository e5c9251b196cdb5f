//! Persistence for the catalog.
//!
//! Two backends share one trait:
//!
//! - [`MemoryStore`] — concurrent hashmaps (DashMap), nothing survives
//!   process exit; used by tests and ephemeral servers.
//! - [`DurableStore`] — ACID transactions on redb with JSON-encoded
//!   values; used by the CLI and daemon.
//!
//! Stores assign ids (monotonic from 1, never reused) and apply lifecycle
//! writes with a status guard so two concurrent checkouts of the same
//! book cannot both succeed.

pub mod durable;
pub mod mem;

pub use durable::DurableStore;
pub use mem::MemoryStore;

use crate::catalog::model::{
    Book, BookId, BookStatus, CheckoutRecord, GenerationRecord, User, UserId,
};
pub use crate::error::{StoreError, StoreResult};

/// Persistence operations the catalog engine needs.
///
/// Implementations must be safe to share across request-handling threads.
pub trait CatalogStore: Send + Sync {
    /// Insert a book, assigning its id. The id field of `book` is ignored.
    fn create_book(&self, book: Book) -> StoreResult<Book>;

    fn get_book(&self, id: BookId) -> StoreResult<Option<Book>>;

    /// Replace an existing book unconditionally.
    fn put_book(&self, book: &Book) -> StoreResult<()>;

    /// Replace a book only if its stored status still equals `expected`.
    ///
    /// Returns [`StoreError::Conflict`] when another writer changed the
    /// status first (or the book vanished). This is the compare-and-set
    /// closing the checkout race.
    fn put_book_guarded(&self, book: &Book, expected: BookStatus) -> StoreResult<()>;

    /// Delete a book. Returns whether it existed.
    fn delete_book(&self, id: BookId) -> StoreResult<bool>;

    fn all_books(&self) -> StoreResult<Vec<Book>>;

    /// Insert a user, assigning its id. The id field of `user` is ignored.
    /// Fails with [`StoreError::Conflict`] if the email is already taken.
    fn create_user(&self, user: User) -> StoreResult<User>;

    fn get_user(&self, id: UserId) -> StoreResult<Option<User>>;

    /// Look up by email (stored lowercase; the argument is lowercased).
    fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Replace an existing user unconditionally.
    fn put_user(&self, user: &User) -> StoreResult<()>;

    fn all_users(&self) -> StoreResult<Vec<User>>;

    /// Append a checkout audit record, assigning its id.
    fn append_checkout(&self, record: CheckoutRecord) -> StoreResult<CheckoutRecord>;

    /// Checkout trail for one book, oldest first.
    fn checkout_history(&self, book_id: BookId) -> StoreResult<Vec<CheckoutRecord>>;

    /// Append a generation audit record, assigning its id.
    fn append_generation(&self, record: GenerationRecord) -> StoreResult<GenerationRecord>;
}
