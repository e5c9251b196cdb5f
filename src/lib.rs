//! # biblion
//!
//! A library-catalog engine: circulation lifecycle, role policy, and
//! AI-assisted search with a deterministic offline fallback.
//!
//! ## Architecture
//!
//! - **Catalog engine** (`catalog`): book CRUD, the AVAILABLE/BORROWED
//!   state machine, role policy, and filter compilation
//! - **Generation gateway** (`ai`): provider strategy (mock/OpenAI/
//!   Anthropic), prompt builders, lenient response interpretation
//! - **Storage** (`store`): one trait, two backends (DashMap in memory,
//!   redb on disk)
//! - **Audit** (`audit`): best-effort append-only checkout and AI-call
//!   records
//!
//! ## Library usage
//!
//! ```no_run
//! use biblion::catalog::Catalog;
//! use biblion::catalog::model::NewBook;
//! use biblion::config::ServiceConfig;
//!
//! let catalog = Catalog::in_memory(&ServiceConfig::default()).unwrap();
//! let admin = catalog.ensure_admin("admin@example.com", "Admin").unwrap();
//! let book = catalog
//!     .create_book(&admin, NewBook {
//!         title: "Dune".into(),
//!         author: "Frank Herbert".into(),
//!         genre: Some("Science Fiction".into()),
//!         ..Default::default()
//!     })
//!     .unwrap();
//! let results = catalog.smart_search(Some(&admin), "available sci-fi books").unwrap();
//! assert!(results.books.iter().any(|b| b.id == book.id));
//! ```

pub mod ai;
pub mod audit;
pub mod catalog;
pub mod config;
pub mod error;
pub mod paths;
pub mod store;
