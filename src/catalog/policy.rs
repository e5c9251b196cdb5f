//! The single authorization authority for the catalog.
//!
//! Both the HTTP layer and the lifecycle engine consult this module, so the
//! two enforcement points cannot drift apart.

use crate::catalog::model::Role;
use crate::catalog::{CatalogError, CatalogResult};

/// An operation subject to role checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateBook,
    UpdateBook,
    DeleteBook,
    Checkout,
    /// Supplying an explicit borrower other than the actor.
    CheckoutForOther,
    /// Displacing an existing loan.
    OverrideLoan,
    Checkin,
    EnrichBook,
    ViewHistory,
    ManageUsers,
}

impl Action {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::CreateBook => "create books",
            Self::UpdateBook => "update books",
            Self::DeleteBook => "delete books",
            Self::Checkout => "check out books",
            Self::CheckoutForOther => "check out books for other users",
            Self::OverrideLoan => "override an existing loan",
            Self::Checkin => "check in books",
            Self::EnrichBook => "enrich book metadata",
            Self::ViewHistory => "view checkout history",
            Self::ManageUsers => "manage users",
        }
    }
}

/// Whether `role` may perform `action`.
pub fn allows(role: Role, action: Action) -> bool {
    use Action::*;
    match action {
        // Every authenticated role may borrow for themselves.
        Checkout => true,
        // Staff operations.
        CreateBook | UpdateBook | Checkin | EnrichBook | ViewHistory | CheckoutForOther
        | OverrideLoan => matches!(role, Role::Admin | Role::Librarian),
        // Admin only.
        DeleteBook | ManageUsers => matches!(role, Role::Admin),
    }
}

/// Check `allows`, turning a refusal into [`CatalogError::Forbidden`].
pub fn authorize(role: Role, action: Action) -> CatalogResult<()> {
    if allows(role, action) {
        Ok(())
    } else {
        Err(CatalogError::Forbidden {
            action: action.describe(),
        })
    }
}
