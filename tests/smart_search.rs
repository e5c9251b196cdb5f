//! End-to-end smart-search and enrichment tests.
//!
//! The default configuration selects the mock provider, so these run
//! offline and deterministically. The live-provider failure path is
//! exercised by pointing a gateway at an unreachable endpoint.

use std::sync::Arc;

use biblion::ai::{Gateway, Provider};
use biblion::catalog::model::{NewBook, Role, User};
use biblion::catalog::query::SearchFilters;
use biblion::catalog::{Catalog, CatalogError, CheckoutRequest};
use biblion::config::{AiConfig, ServiceConfig};
use biblion::store::{CatalogStore, MemoryStore};

fn catalog() -> Catalog {
    Catalog::in_memory(&ServiceConfig::default()).unwrap()
}

fn seeded(catalog: &Catalog) -> User {
    let admin = catalog.ensure_admin("admin@example.com", "Admin").unwrap();
    catalog.seed_demo(&admin).unwrap();
    admin
}

#[test]
fn search_by_year_finds_the_right_book() {
    let catalog = catalog();
    let admin = seeded(&catalog);

    let result = catalog.smart_search(Some(&admin), "books from 1965").unwrap();
    assert_eq!(result.provider, "mock");
    assert_eq!(result.books.len(), 1);
    assert_eq!(result.books[0].title, "Dune");
    match &result.filters {
        SearchFilters::Simplified { year, .. } => assert_eq!(*year, Some(1965)),
        other => panic!("mock emits the simplified shape, got {other:?}"),
    }
}

#[test]
fn availability_filter_tracks_checkouts() {
    let catalog = catalog();
    let admin = seeded(&catalog);

    let all = catalog.smart_search(Some(&admin), "all books").unwrap();
    let total = all.books.len();
    assert!(total >= 2);

    let first = all.books[0].id;
    catalog
        .checkout(&admin, first, &CheckoutRequest::default())
        .unwrap();

    let borrowed = catalog
        .smart_search(Some(&admin), "checked out books")
        .unwrap();
    assert_eq!(borrowed.books.len(), 1);
    assert_eq!(borrowed.books[0].id, first);

    let available = catalog.smart_search(Some(&admin), "available books").unwrap();
    assert_eq!(available.books.len(), total - 1);
}

#[test]
fn genre_bucket_reaches_the_shelf() {
    let catalog = catalog();
    let admin = seeded(&catalog);

    let result = catalog
        .smart_search(Some(&admin), "books about space")
        .unwrap();
    assert!(!result.books.is_empty());
    assert!(
        result
            .books
            .iter()
            .all(|b| b.genre.as_deref() == Some("Science Fiction")),
        "expected only science fiction, got {:?}",
        result.books.iter().map(|b| &b.title).collect::<Vec<_>>()
    );
}

#[test]
fn result_set_is_capped_at_twenty() {
    let catalog = catalog();
    let admin = catalog.ensure_admin("admin@example.com", "Admin").unwrap();
    for i in 0..30 {
        catalog
            .create_book(
                &admin,
                NewBook {
                    title: format!("Widget Catalog Volume {i}"),
                    author: "Prolific Author".into(),
                    ..Default::default()
                },
            )
            .unwrap();
    }

    let result = catalog.smart_search(Some(&admin), "widget").unwrap();
    assert_eq!(result.books.len(), 20);
}

#[test]
fn blank_query_is_a_validation_error() {
    let catalog = catalog();
    let err = catalog.smart_search(None, "  \n ").unwrap_err();
    assert!(matches!(err, CatalogError::Validation { .. }));
}

#[test]
fn every_search_writes_a_generation_record() {
    let store = Arc::new(MemoryStore::new());
    let gateway = Gateway::new(&AiConfig::default());
    let catalog = Catalog::new(
        Arc::clone(&store) as Arc<dyn CatalogStore>,
        gateway,
        &ServiceConfig::default(),
    );
    let admin = catalog.ensure_admin("admin@example.com", "Admin").unwrap();

    catalog.smart_search(Some(&admin), "dune").unwrap();
    catalog.smart_search(None, "space books").unwrap();

    let records = store.generation_records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].user_id, Some(admin.id));
    assert_eq!(records[0].provider, "mock");
    assert!(records[0].prompt_len > 0);
    assert!(records[0].response_len > 0);
    assert_eq!(records[1].user_id, None);
}

#[test]
fn live_provider_failure_still_serves_results_via_mock() {
    let store = Arc::new(MemoryStore::new());
    let ai = AiConfig {
        provider: "openai".into(),
        openai_base_url: "http://127.0.0.1:1".into(),
        timeout_secs: 1,
        ..Default::default()
    };
    // Force the live strategy so the call itself fails, as an outage
    // would.
    let gateway = Gateway::with_provider(Provider::OpenAi, ai);
    let catalog = Catalog::new(
        Arc::clone(&store) as Arc<dyn CatalogStore>,
        gateway,
        &ServiceConfig::default(),
    );
    let admin = catalog.ensure_admin("admin@example.com", "Admin").unwrap();
    catalog.seed_demo(&admin).unwrap();

    let result = catalog
        .smart_search(Some(&admin), "available books from 1965")
        .unwrap();
    assert_eq!(result.provider, "mock");
    assert_eq!(result.books.len(), 1);
    assert_eq!(result.books[0].title, "Dune");

    let records = store.generation_records();
    assert_eq!(records.len(), 1);
    assert!(records[0].fallback_used);
    assert_eq!(records[0].provider, "mock");
}

#[test]
fn misconfigured_live_provider_does_not_block_the_catalog() {
    // A live provider with no working credentials or endpoint must only
    // degrade the AI features, never the catalog itself.
    let config = ServiceConfig {
        ai: AiConfig {
            provider: "openai".into(),
            openai_base_url: "http://127.0.0.1:1".into(),
            timeout_secs: 1,
            ..Default::default()
        },
        ..Default::default()
    };
    let catalog = Catalog::in_memory(&config).expect("construction must not require credentials");
    let admin = catalog.ensure_admin("admin@example.com", "Admin").unwrap();
    catalog.seed_demo(&admin).unwrap();

    // Non-AI operations are untouched.
    let first = catalog.list_books(&Default::default()).unwrap().data[0].id;
    let book = catalog
        .checkout(&admin, first, &CheckoutRequest::default())
        .unwrap();
    assert!(book.borrower.is_some());

    // AI operations degrade to the mock.
    let result = catalog.smart_search(Some(&admin), "fantasy books").unwrap();
    assert_eq!(result.provider, "mock");
    assert!(!result.books.is_empty());
}

#[test]
fn enrichment_fills_empty_metadata_and_keeps_existing_genre() {
    let catalog = catalog();
    let admin = catalog.ensure_admin("admin@example.com", "Admin").unwrap();
    let book = catalog
        .create_book(
            &admin,
            NewBook {
                title: "Galaxy Primer".into(),
                author: "A. Writer".into(),
                ..Default::default()
            },
        )
        .unwrap();

    let result = catalog.enrich_book(&admin, book.id).unwrap();
    assert_eq!(result.provider, "mock");
    let enriched = result.book;
    assert_eq!(enriched.genre.as_deref(), Some("Science Fiction"));
    assert!(!enriched.tags.is_empty());
    assert_eq!(
        enriched.summary.as_deref(),
        Some("\"Galaxy Primer\" by A. Writer is a science fiction book.")
    );
}

#[test]
fn enrichment_requires_staff_role() {
    let catalog = catalog();
    let admin = catalog.ensure_admin("admin@example.com", "Admin").unwrap();
    let member = catalog
        .create_user(&admin, "m@example.com", "Member", Role::Member)
        .unwrap();
    let book = catalog
        .create_book(
            &admin,
            NewBook {
                title: "T".into(),
                author: "A".into(),
                ..Default::default()
            },
        )
        .unwrap();

    let err = catalog.enrich_book(&member, book.id).unwrap_err();
    assert!(matches!(err, CatalogError::Forbidden { .. }));
}
