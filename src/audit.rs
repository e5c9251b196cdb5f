//! Best-effort audit sink for lifecycle and generation records.
//!
//! Writes are fire-and-forget relative to the primary operation: a store
//! error here is logged at WARN for operator visibility and swallowed.
//! Callers never branch on the outcome.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::catalog::model::{
    BookId, CheckoutAction, CheckoutRecord, GenerationKind, GenerationRecord, UserId,
};
use crate::store::CatalogStore;

/// Append-only audit logger over the catalog store.
#[derive(Clone)]
pub struct Auditor {
    store: Arc<dyn CatalogStore>,
}

impl Auditor {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Record a checkout or checkin. Failures are swallowed.
    #[allow(clippy::too_many_arguments)]
    pub fn record_checkout(
        &self,
        book_id: BookId,
        user_id: UserId,
        actor_id: UserId,
        action: CheckoutAction,
        at: DateTime<Utc>,
        due_at: Option<DateTime<Utc>>,
        override_used: bool,
    ) {
        let record = CheckoutRecord {
            id: 0,
            book_id,
            user_id,
            actor_id,
            action,
            at,
            due_at,
            override_used,
        };
        if let Err(e) = self.store.append_checkout(record) {
            tracing::warn!(
                book_id = %book_id,
                %action,
                error = %e,
                "failed to write checkout audit record"
            );
        }
    }

    /// Record a generation call. Failures are swallowed.
    #[allow(clippy::too_many_arguments)]
    pub fn record_generation(
        &self,
        user_id: Option<UserId>,
        kind: GenerationKind,
        provider: &str,
        model: &str,
        prompt_len: usize,
        response_len: usize,
        duration_ms: u64,
        fallback_used: bool,
    ) {
        let record = GenerationRecord {
            id: 0,
            user_id,
            kind,
            provider: provider.to_string(),
            model: model.to_string(),
            prompt_len,
            response_len,
            duration_ms,
            fallback_used,
            at: Utc::now(),
        };
        if let Err(e) = self.store.append_generation(record) {
            tracing::warn!(
                %kind,
                provider,
                error = %e,
                "failed to write generation audit record"
            );
        }
    }
}

impl std::fmt::Debug for Auditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auditor").finish()
    }
}
