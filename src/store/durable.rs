//! ACID-durable catalog store backed by redb.
//!
//! All writes go through transactions; reads use MVCC snapshots. Records
//! are JSON-encoded values keyed by their numeric id, with a counters
//! table providing monotonic id assignment inside the same write
//! transaction as the insert.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::catalog::model::{
    Book, BookId, BookStatus, CheckoutRecord, GenerationRecord, User, UserId,
};
use crate::error::{StoreError, StoreResult};
use crate::store::CatalogStore;

const BOOKS: TableDefinition<u64, &[u8]> = TableDefinition::new("books");
const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");
const USERS_BY_EMAIL: TableDefinition<&str, u64> = TableDefinition::new("users_by_email");
const CHECKOUT_LOG: TableDefinition<u64, &[u8]> = TableDefinition::new("checkout_log");
const GENERATION_LOG: TableDefinition<u64, &[u8]> = TableDefinition::new("generation_log");
const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

/// Durable store using redb.
pub struct DurableStore {
    db: Arc<Database>,
}

impl DurableStore {
    /// Open or create a durable store in the given directory.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join("biblion.redb");
        let db = Database::create(&db_path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;

        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        Ok(store)
    }

    /// Create every table up front so read transactions never observe a
    /// missing table.
    fn ensure_tables(&self) -> StoreResult<()> {
        let txn = begin_write(&self.db)?;
        {
            txn.open_table(BOOKS).map_err(table_err)?;
            txn.open_table(USERS).map_err(table_err)?;
            txn.open_table(USERS_BY_EMAIL).map_err(table_err)?;
            txn.open_table(CHECKOUT_LOG).map_err(table_err)?;
            txn.open_table(GENERATION_LOG).map_err(table_err)?;
            txn.open_table(COUNTERS).map_err(table_err)?;
        }
        commit(txn)
    }
}

fn begin_write(db: &Database) -> StoreResult<redb::WriteTransaction> {
    db.begin_write().map_err(|e| StoreError::Redb {
        message: format!("begin_write failed: {e}"),
    })
}

fn begin_read(db: &Database) -> StoreResult<redb::ReadTransaction> {
    db.begin_read().map_err(|e| StoreError::Redb {
        message: format!("begin_read failed: {e}"),
    })
}

fn commit(txn: redb::WriteTransaction) -> StoreResult<()> {
    txn.commit().map_err(|e| StoreError::Redb {
        message: format!("commit failed: {e}"),
    })
}

fn table_err(e: redb::TableError) -> StoreError {
    StoreError::Redb {
        message: format!("open_table failed: {e}"),
    }
}

fn storage_err(e: redb::StorageError) -> StoreError {
    StoreError::Redb {
        message: e.to_string(),
    }
}

fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StoreError::Serialization {
        message: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization {
        message: e.to_string(),
    })
}

/// Bump a named counter inside the given write transaction.
fn next_id(txn: &redb::WriteTransaction, name: &str) -> StoreResult<u64> {
    let mut counters = txn.open_table(COUNTERS).map_err(table_err)?;
    let current = counters
        .get(name)
        .map_err(storage_err)?
        .map(|v| v.value())
        .unwrap_or(0);
    let next = current + 1;
    counters.insert(name, next).map_err(storage_err)?;
    Ok(next)
}

/// Read one JSON record from a u64-keyed table.
fn read_record<T: DeserializeOwned>(
    db: &Database,
    table: TableDefinition<'static, u64, &'static [u8]>,
    key: u64,
) -> StoreResult<Option<T>> {
    let txn = begin_read(db)?;
    let table = txn.open_table(table).map_err(table_err)?;
    match table.get(key).map_err(storage_err)? {
        Some(guard) => Ok(Some(decode(guard.value())?)),
        None => Ok(None),
    }
}

/// Read every JSON record from a u64-keyed table, in key order.
fn read_all<T: DeserializeOwned>(
    db: &Database,
    table: TableDefinition<'static, u64, &'static [u8]>,
) -> StoreResult<Vec<T>> {
    let txn = begin_read(db)?;
    let table = txn.open_table(table).map_err(table_err)?;
    let mut out = Vec::new();
    for entry in table.iter().map_err(storage_err)? {
        let (_, value) = entry.map_err(storage_err)?;
        out.push(decode(value.value())?);
    }
    Ok(out)
}

impl CatalogStore for DurableStore {
    fn create_book(&self, mut book: Book) -> StoreResult<Book> {
        let txn = begin_write(&self.db)?;
        {
            book.id = BookId(next_id(&txn, "book")?);
            let mut books = txn.open_table(BOOKS).map_err(table_err)?;
            books
                .insert(book.id.get(), encode(&book)?.as_slice())
                .map_err(storage_err)?;
        }
        commit(txn)?;
        Ok(book)
    }

    fn get_book(&self, id: BookId) -> StoreResult<Option<Book>> {
        read_record(&self.db, BOOKS, id.get())
    }

    fn put_book(&self, book: &Book) -> StoreResult<()> {
        let txn = begin_write(&self.db)?;
        {
            let mut books = txn.open_table(BOOKS).map_err(table_err)?;
            books
                .insert(book.id.get(), encode(book)?.as_slice())
                .map_err(storage_err)?;
        }
        commit(txn)
    }

    fn put_book_guarded(&self, book: &Book, expected: BookStatus) -> StoreResult<()> {
        let txn = begin_write(&self.db)?;
        {
            let mut books = txn.open_table(BOOKS).map_err(table_err)?;
            let current: Book = match books.get(book.id.get()).map_err(storage_err)? {
                Some(guard) => decode(guard.value())?,
                None => {
                    return Err(StoreError::Conflict {
                        entity: "book",
                        id: book.id.get(),
                    });
                }
            };
            if current.status != expected {
                return Err(StoreError::Conflict {
                    entity: "book",
                    id: book.id.get(),
                });
            }
            books
                .insert(book.id.get(), encode(book)?.as_slice())
                .map_err(storage_err)?;
        }
        commit(txn)
    }

    fn delete_book(&self, id: BookId) -> StoreResult<bool> {
        let txn = begin_write(&self.db)?;
        let existed = {
            let mut books = txn.open_table(BOOKS).map_err(table_err)?;
            books.remove(id.get()).map_err(storage_err)?.is_some()
        };
        commit(txn)?;
        Ok(existed)
    }

    fn all_books(&self) -> StoreResult<Vec<Book>> {
        read_all(&self.db, BOOKS)
    }

    fn create_user(&self, mut user: User) -> StoreResult<User> {
        user.email = user.email.to_lowercase();
        let txn = begin_write(&self.db)?;
        {
            let mut by_email = txn.open_table(USERS_BY_EMAIL).map_err(table_err)?;
            if by_email
                .get(user.email.as_str())
                .map_err(storage_err)?
                .is_some()
            {
                return Err(StoreError::Conflict {
                    entity: "user",
                    id: 0,
                });
            }
            user.id = UserId(next_id(&txn, "user")?);
            by_email
                .insert(user.email.as_str(), user.id.get())
                .map_err(storage_err)?;
            let mut users = txn.open_table(USERS).map_err(table_err)?;
            users
                .insert(user.id.get(), encode(&user)?.as_slice())
                .map_err(storage_err)?;
        }
        commit(txn)?;
        Ok(user)
    }

    fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        read_record(&self.db, USERS, id.get())
    }

    fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.to_lowercase();
        let id = {
            let txn = begin_read(&self.db)?;
            let by_email = txn.open_table(USERS_BY_EMAIL).map_err(table_err)?;
            match by_email.get(email.as_str()).map_err(storage_err)? {
                Some(guard) => guard.value(),
                None => return Ok(None),
            }
        };
        self.get_user(UserId(id))
    }

    fn put_user(&self, user: &User) -> StoreResult<()> {
        let txn = begin_write(&self.db)?;
        {
            let mut users = txn.open_table(USERS).map_err(table_err)?;
            users
                .insert(user.id.get(), encode(user)?.as_slice())
                .map_err(storage_err)?;
        }
        commit(txn)
    }

    fn all_users(&self) -> StoreResult<Vec<User>> {
        read_all(&self.db, USERS)
    }

    fn append_checkout(&self, mut record: CheckoutRecord) -> StoreResult<CheckoutRecord> {
        let txn = begin_write(&self.db)?;
        {
            record.id = next_id(&txn, "checkout")?;
            let mut log = txn.open_table(CHECKOUT_LOG).map_err(table_err)?;
            log.insert(record.id, encode(&record)?.as_slice())
                .map_err(storage_err)?;
        }
        commit(txn)?;
        Ok(record)
    }

    fn checkout_history(&self, book_id: BookId) -> StoreResult<Vec<CheckoutRecord>> {
        let all: Vec<CheckoutRecord> = read_all(&self.db, CHECKOUT_LOG)?;
        Ok(all.into_iter().filter(|r| r.book_id == book_id).collect())
    }

    fn append_generation(&self, mut record: GenerationRecord) -> StoreResult<GenerationRecord> {
        let txn = begin_write(&self.db)?;
        {
            record.id = next_id(&txn, "generation")?;
            let mut log = txn.open_table(GENERATION_LOG).map_err(table_err)?;
            log.insert(record.id, encode(&record)?.as_slice())
                .map_err(storage_err)?;
        }
        commit(txn)?;
        Ok(record)
    }
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore").finish()
    }
}
