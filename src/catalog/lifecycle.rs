//! Pure state transitions for book availability.
//!
//! A book moves between AVAILABLE and BORROWED. These functions validate the
//! transition and produce the updated record; persistence and auditing are
//! the facade's job. Keeping them pure makes the invariants directly
//! testable.

use chrono::{DateTime, Duration, Utc};

use crate::catalog::model::{Book, BookStatus, UserId};
use crate::catalog::{CatalogError, CatalogResult};

/// Result of a successful checkout transition.
#[derive(Debug)]
pub struct CheckoutTransition {
    pub book: Book,
    /// The borrower displaced by an override, if any.
    pub displaced: Option<UserId>,
    pub override_used: bool,
}

/// Result of a successful checkin transition.
#[derive(Debug)]
pub struct CheckinTransition {
    pub book: Book,
    /// The borrower the book was checked out to. Absent only for legacy
    /// records that were BORROWED without a recorded borrower.
    pub prior_borrower: Option<UserId>,
}

/// Check a book out to `borrower`.
///
/// Fails with `InvalidState` if the book is already BORROWED, unless
/// `override_loan` is set (the caller has already verified the actor may
/// override), in which case the existing loan is displaced and replaced
/// with a fresh one.
pub fn checkout(
    book: &Book,
    borrower: UserId,
    now: DateTime<Utc>,
    loan_period: Duration,
    override_loan: bool,
) -> CatalogResult<CheckoutTransition> {
    let displaced = match book.status {
        BookStatus::Available => None,
        BookStatus::Borrowed if override_loan => book.borrower,
        BookStatus::Borrowed => {
            return Err(CatalogError::InvalidState {
                message: "book is already borrowed".into(),
            });
        }
    };

    let mut updated = book.clone();
    updated.status = BookStatus::Borrowed;
    updated.borrower = Some(borrower);
    updated.borrowed_at = Some(now);
    updated.due_at = Some(now + loan_period);
    updated.updated_at = now;

    Ok(CheckoutTransition {
        book: updated,
        displaced,
        override_used: override_loan && displaced.is_some(),
    })
}

/// Return a borrowed book to the shelf.
///
/// Fails with `InvalidState` if the book is not currently BORROWED, so
/// repeated checkins fail identically every time.
pub fn checkin(book: &Book, now: DateTime<Utc>) -> CatalogResult<CheckinTransition> {
    if book.status != BookStatus::Borrowed {
        return Err(CatalogError::InvalidState {
            message: "book is not currently borrowed".into(),
        });
    }

    let prior_borrower = book.borrower;

    let mut updated = book.clone();
    updated.status = BookStatus::Available;
    updated.borrower = None;
    updated.borrowed_at = None;
    updated.due_at = None;
    updated.updated_at = now;

    Ok(CheckinTransition {
        book: updated,
        prior_borrower,
    })
}
