//! Durable-store persistence tests: catalog state must survive process
//! restarts (simulated by dropping and reopening the store).

use std::sync::Arc;

use biblion::ai::Gateway;
use biblion::catalog::model::{BookStatus, NewBook};
use biblion::catalog::{Catalog, CheckoutRequest};
use biblion::config::ServiceConfig;
use biblion::store::{CatalogStore, DurableStore};

fn open_catalog(dir: &std::path::Path) -> Catalog {
    let config = ServiceConfig::default();
    let store = Arc::new(DurableStore::open(dir).unwrap()) as Arc<dyn CatalogStore>;
    let gateway = Gateway::new(&config.ai);
    Catalog::new(store, gateway, &config)
}

#[test]
fn books_users_and_loans_survive_reopen() {
    let dir = tempfile::TempDir::new().unwrap();

    let (book_id, member_id) = {
        let catalog = open_catalog(dir.path());
        let admin = catalog.ensure_admin("admin@example.com", "Admin").unwrap();
        let member = catalog.login_or_create_user("m@example.com", "Member").unwrap();
        let book = catalog
            .create_book(
                &admin,
                NewBook {
                    title: "Dune".into(),
                    author: "Frank Herbert".into(),
                    year: Some(1965),
                    ..Default::default()
                },
            )
            .unwrap();
        catalog
            .checkout(
                &admin,
                book.id,
                &CheckoutRequest {
                    user_id: Some(member.id),
                    override_loan: false,
                },
            )
            .unwrap();
        (book.id, member.id)
    };

    let catalog = open_catalog(dir.path());
    let book = catalog.get_book(book_id).unwrap();
    assert_eq!(book.title, "Dune");
    assert_eq!(book.status, BookStatus::Borrowed);
    assert_eq!(book.borrower, Some(member_id));
    assert!(book.due_at.is_some());

    let admin = catalog
        .find_user_by_email("admin@example.com")
        .unwrap()
        .unwrap();
    let history = catalog.history(&admin, book_id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].user_id, member_id);
}

#[test]
fn checkin_after_reopen_completes_the_loan() {
    let dir = tempfile::TempDir::new().unwrap();

    let book_id = {
        let catalog = open_catalog(dir.path());
        let admin = catalog.ensure_admin("admin@example.com", "Admin").unwrap();
        let book = catalog
            .create_book(
                &admin,
                NewBook {
                    title: "Sapiens".into(),
                    author: "Yuval Noah Harari".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        catalog
            .checkout(&admin, book.id, &CheckoutRequest::default())
            .unwrap();
        book.id
    };

    let catalog = open_catalog(dir.path());
    let admin = catalog
        .find_user_by_email("admin@example.com")
        .unwrap()
        .unwrap();
    let book = catalog.checkin(&admin, book_id).unwrap();
    assert_eq!(book.status, BookStatus::Available);
    assert!(book.borrower.is_none());

    let history = catalog.history(&admin, book_id).unwrap();
    assert_eq!(history.len(), 2);
}

#[test]
fn smart_search_works_against_the_durable_store() {
    let dir = tempfile::TempDir::new().unwrap();

    {
        let catalog = open_catalog(dir.path());
        let admin = catalog.ensure_admin("admin@example.com", "Admin").unwrap();
        catalog.seed_demo(&admin).unwrap();
    }

    let catalog = open_catalog(dir.path());
    let admin = catalog
        .find_user_by_email("admin@example.com")
        .unwrap()
        .unwrap();
    let result = catalog
        .smart_search(Some(&admin), "fantasy books")
        .unwrap();
    assert!(!result.books.is_empty());
    assert!(
        result
            .books
            .iter()
            .all(|b| b.genre.as_deref() == Some("Fantasy"))
    );
}

#[test]
fn enrichment_persists_across_reopen() {
    let dir = tempfile::TempDir::new().unwrap();

    let book_id = {
        let catalog = open_catalog(dir.path());
        let admin = catalog.ensure_admin("admin@example.com", "Admin").unwrap();
        let book = catalog
            .create_book(
                &admin,
                NewBook {
                    title: "Dragon Keep".into(),
                    author: "A. Writer".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        catalog.enrich_book(&admin, book.id).unwrap();
        book.id
    };

    let catalog = open_catalog(dir.path());
    let book = catalog.get_book(book_id).unwrap();
    assert_eq!(book.genre.as_deref(), Some("Fantasy"));
    assert!(book.summary.is_some());
    assert!(!book.tags.is_empty());
}
