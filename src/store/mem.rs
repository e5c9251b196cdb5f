//! In-memory store backed by DashMap. All data is lost on process exit.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::catalog::model::{
    Book, BookId, BookStatus, CheckoutRecord, GenerationRecord, User, UserId,
};
use crate::error::{StoreError, StoreResult};
use crate::store::CatalogStore;

/// Concurrent in-memory store using sharded hashmaps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    books: DashMap<u64, Book>,
    users: DashMap<u64, User>,
    users_by_email: DashMap<String, u64>,
    checkouts: Mutex<Vec<CheckoutRecord>>,
    generations: Mutex<Vec<GenerationRecord>>,
    next_book_id: AtomicU64,
    next_user_id: AtomicU64,
    next_checkout_id: AtomicU64,
    next_generation_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all generation records, for tests and diagnostics.
    pub fn generation_records(&self) -> Vec<GenerationRecord> {
        self.generations.lock().expect("generation log poisoned").clone()
    }
}

fn next(counter: &AtomicU64) -> u64 {
    counter.fetch_add(1, Ordering::Relaxed) + 1
}

impl CatalogStore for MemoryStore {
    fn create_book(&self, mut book: Book) -> StoreResult<Book> {
        book.id = BookId(next(&self.next_book_id));
        self.books.insert(book.id.get(), book.clone());
        Ok(book)
    }

    fn get_book(&self, id: BookId) -> StoreResult<Option<Book>> {
        Ok(self.books.get(&id.get()).map(|b| b.clone()))
    }

    fn put_book(&self, book: &Book) -> StoreResult<()> {
        self.books.insert(book.id.get(), book.clone());
        Ok(())
    }

    fn put_book_guarded(&self, book: &Book, expected: BookStatus) -> StoreResult<()> {
        // get_mut holds the shard lock for the entry, making the
        // compare-and-set atomic.
        match self.books.get_mut(&book.id.get()) {
            Some(mut entry) if entry.status == expected => {
                *entry = book.clone();
                Ok(())
            }
            _ => Err(StoreError::Conflict {
                entity: "book",
                id: book.id.get(),
            }),
        }
    }

    fn delete_book(&self, id: BookId) -> StoreResult<bool> {
        Ok(self.books.remove(&id.get()).is_some())
    }

    fn all_books(&self) -> StoreResult<Vec<Book>> {
        Ok(self.books.iter().map(|e| e.value().clone()).collect())
    }

    fn create_user(&self, mut user: User) -> StoreResult<User> {
        user.id = UserId(next(&self.next_user_id));
        user.email = user.email.to_lowercase();
        // entry() holds the email shard lock, so duplicate emails cannot
        // race past each other.
        match self.users_by_email.entry(user.email.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(StoreError::Conflict {
                    entity: "user",
                    id: user.id.get(),
                });
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(user.id.get());
            }
        }
        self.users.insert(user.id.get(), user.clone());
        Ok(user)
    }

    fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.users.get(&id.get()).map(|u| u.clone()))
    }

    fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let id = match self.users_by_email.get(&email.to_lowercase()) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    fn put_user(&self, user: &User) -> StoreResult<()> {
        self.users.insert(user.id.get(), user.clone());
        Ok(())
    }

    fn all_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.users.iter().map(|e| e.value().clone()).collect())
    }

    fn append_checkout(&self, mut record: CheckoutRecord) -> StoreResult<CheckoutRecord> {
        record.id = next(&self.next_checkout_id);
        let mut log = self.checkouts.lock().expect("checkout log poisoned");
        log.push(record.clone());
        Ok(record)
    }

    fn checkout_history(&self, book_id: BookId) -> StoreResult<Vec<CheckoutRecord>> {
        let log = self.checkouts.lock().expect("checkout log poisoned");
        Ok(log.iter().filter(|r| r.book_id == book_id).cloned().collect())
    }

    fn append_generation(&self, mut record: GenerationRecord) -> StoreResult<GenerationRecord> {
        record.id = next(&self.next_generation_id);
        let mut log = self.generations.lock().expect("generation log poisoned");
        log.push(record.clone());
        Ok(record)
    }
}
