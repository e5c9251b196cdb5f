//! End-to-end lifecycle tests for the catalog engine.
//!
//! These exercise the full checkout/checkin path through the facade:
//! policy checks, the pure transition, the guarded store write, and the
//! audit trail.

use chrono::Duration;

use biblion::catalog::model::{BookId, BookStatus, CheckoutAction, NewBook, Role, User};
use biblion::catalog::{Catalog, CatalogError, CheckoutRequest};
use biblion::config::ServiceConfig;

fn catalog() -> Catalog {
    Catalog::in_memory(&ServiceConfig::default()).unwrap()
}

fn setup(catalog: &Catalog) -> (User, User, User) {
    let admin = catalog.ensure_admin("admin@example.com", "Admin").unwrap();
    let librarian = catalog
        .create_user(&admin, "librarian@example.com", "Librarian", Role::Librarian)
        .unwrap();
    let member = catalog
        .create_user(&admin, "member@example.com", "Member", Role::Member)
        .unwrap();
    (admin, librarian, member)
}

fn add_book(catalog: &Catalog, actor: &User) -> BookId {
    catalog
        .create_book(
            actor,
            NewBook {
                title: "Dune".into(),
                author: "Frank Herbert".into(),
                genre: Some("Science Fiction".into()),
                year: Some(1965),
                ..Default::default()
            },
        )
        .unwrap()
        .id
}

#[test]
fn new_book_is_available_with_unset_borrower_fields() {
    let catalog = catalog();
    let (admin, ..) = setup(&catalog);
    let id = add_book(&catalog, &admin);

    let book = catalog.get_book(id).unwrap();
    assert_eq!(book.status, BookStatus::Available);
    assert!(book.borrower.is_none());
    assert!(book.borrowed_at.is_none());
    assert!(book.due_at.is_none());
}

#[test]
fn checkout_sets_fourteen_day_due_date_and_logs_once() {
    let catalog = catalog();
    let (admin, _, member) = setup(&catalog);
    let id = add_book(&catalog, &admin);

    let book = catalog
        .checkout(&member, id, &CheckoutRequest::default())
        .unwrap();

    assert_eq!(book.status, BookStatus::Borrowed);
    assert_eq!(book.borrower, Some(member.id));
    let borrowed_at = book.borrowed_at.unwrap();
    assert_eq!(book.due_at.unwrap(), borrowed_at + Duration::days(14));

    let history = catalog.history(&admin, id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, CheckoutAction::Checkout);
    assert_eq!(history[0].user_id, member.id);
    assert_eq!(history[0].actor_id, member.id);
    assert!(!history[0].override_used);
}

#[test]
fn configured_loan_period_is_honoured() {
    let config = ServiceConfig {
        loan_days: 7,
        ..Default::default()
    };
    let catalog = Catalog::in_memory(&config).unwrap();
    let (admin, ..) = setup(&catalog);
    let id = add_book(&catalog, &admin);

    let book = catalog
        .checkout(&admin, id, &CheckoutRequest::default())
        .unwrap();
    assert_eq!(
        book.due_at.unwrap(),
        book.borrowed_at.unwrap() + Duration::days(7)
    );
}

#[test]
fn double_checkout_without_override_fails_and_leaves_book_unchanged() {
    let catalog = catalog();
    let (admin, _, member) = setup(&catalog);
    let id = add_book(&catalog, &admin);

    catalog
        .checkout(&member, id, &CheckoutRequest::default())
        .unwrap();
    let before = catalog.get_book(id).unwrap();

    let err = catalog
        .checkout(&admin, id, &CheckoutRequest::default())
        .unwrap_err();
    assert!(matches!(err, CatalogError::InvalidState { .. }));

    let after = catalog.get_book(id).unwrap();
    assert_eq!(after.borrower, before.borrower);
    assert_eq!(after.borrowed_at, before.borrowed_at);

    // No CHECKOUT record for the failed attempt.
    assert_eq!(catalog.history(&admin, id).unwrap().len(), 1);
}

#[test]
fn admin_override_replaces_borrower_and_logs_override() {
    let catalog = catalog();
    let (admin, _, member) = setup(&catalog);
    let id = add_book(&catalog, &admin);

    catalog
        .checkout(&member, id, &CheckoutRequest::default())
        .unwrap();

    let book = catalog
        .checkout(
            &admin,
            id,
            &CheckoutRequest {
                user_id: Some(admin.id),
                override_loan: true,
            },
        )
        .unwrap();
    assert_eq!(book.borrower, Some(admin.id));

    let history = catalog.history(&admin, id).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].user_id, admin.id);
    assert!(history[1].override_used);
}

#[test]
fn librarian_may_check_out_for_another_user() {
    let catalog = catalog();
    let (admin, librarian, member) = setup(&catalog);
    let id = add_book(&catalog, &admin);

    let book = catalog
        .checkout(
            &librarian,
            id,
            &CheckoutRequest {
                user_id: Some(member.id),
                override_loan: false,
            },
        )
        .unwrap();
    assert_eq!(book.borrower, Some(member.id));

    // The record names the borrower, the actor stays attributable.
    let history = catalog.history(&admin, id).unwrap();
    assert_eq!(history[0].user_id, member.id);
    assert_eq!(history[0].actor_id, librarian.id);
}

#[test]
fn member_may_not_check_in() {
    let catalog = catalog();
    let (admin, _, member) = setup(&catalog);
    let id = add_book(&catalog, &admin);

    catalog
        .checkout(&member, id, &CheckoutRequest::default())
        .unwrap();
    let err = catalog.checkin(&member, id).unwrap_err();
    assert!(matches!(err, CatalogError::Forbidden { .. }));
}

#[test]
fn checkin_clears_fields_and_logs_prior_borrower() {
    let catalog = catalog();
    let (admin, librarian, member) = setup(&catalog);
    let id = add_book(&catalog, &admin);

    catalog
        .checkout(&member, id, &CheckoutRequest::default())
        .unwrap();
    let book = catalog.checkin(&librarian, id).unwrap();

    assert_eq!(book.status, BookStatus::Available);
    assert!(book.borrower.is_none());
    assert!(book.borrowed_at.is_none());
    assert!(book.due_at.is_none());

    let history = catalog.history(&admin, id).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].action, CheckoutAction::Checkin);
    assert_eq!(history[1].user_id, member.id);
    assert_eq!(history[1].actor_id, librarian.id);
}

#[test]
fn repeated_checkin_fails_identically_and_never_double_logs() {
    let catalog = catalog();
    let (admin, _, member) = setup(&catalog);
    let id = add_book(&catalog, &admin);

    catalog
        .checkout(&member, id, &CheckoutRequest::default())
        .unwrap();
    catalog.checkin(&admin, id).unwrap();
    let count = catalog.history(&admin, id).unwrap().len();

    for _ in 0..3 {
        let err = catalog.checkin(&admin, id).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidState { .. }));
    }
    assert_eq!(catalog.history(&admin, id).unwrap().len(), count);
}

#[test]
fn checkin_of_never_borrowed_book_is_invalid_state() {
    let catalog = catalog();
    let (admin, ..) = setup(&catalog);
    let id = add_book(&catalog, &admin);

    let err = catalog.checkin(&admin, id).unwrap_err();
    assert!(matches!(err, CatalogError::InvalidState { .. }));
}

#[test]
fn lifecycle_on_missing_book_is_not_found() {
    let catalog = catalog();
    let (admin, ..) = setup(&catalog);

    let missing = BookId(999);
    assert!(matches!(
        catalog
            .checkout(&admin, missing, &CheckoutRequest::default())
            .unwrap_err(),
        CatalogError::BookNotFound { .. }
    ));
    assert!(matches!(
        catalog.checkin(&admin, missing).unwrap_err(),
        CatalogError::BookNotFound { .. }
    ));
}

#[test]
fn member_may_not_view_history_or_delete() {
    let catalog = catalog();
    let (admin, _, member) = setup(&catalog);
    let id = add_book(&catalog, &admin);

    assert!(matches!(
        catalog.history(&member, id).unwrap_err(),
        CatalogError::Forbidden { .. }
    ));
    assert!(matches!(
        catalog.delete_book(&member, id).unwrap_err(),
        CatalogError::Forbidden { .. }
    ));

    // Librarians create but only admins delete.
    catalog.delete_book(&admin, id).unwrap();
    assert!(matches!(
        catalog.get_book(id).unwrap_err(),
        CatalogError::BookNotFound { .. }
    ));
}
