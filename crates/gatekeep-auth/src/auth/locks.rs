//! Per-identity rotation locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockTable = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// In-process async mutex per identity.
///
/// Entries exist only while some task holds or waits for the lock.
#[derive(Debug, Clone, Default)]
pub struct IdentityLocks {
    table: LockTable,
}

impl IdentityLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to an identity.
    pub async fn acquire(&self, identity: &str) -> IdentityGuard {
        let entry = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(table.entry(identity.to_string()).or_default())
        };

        let guard = Arc::clone(&entry).lock_owned().await;

        IdentityGuard {
            identity: identity.to_string(),
            entry,
            table: Arc::clone(&self.table),
            _guard: guard,
        }
    }

    /// Number of identities currently locked or awaited.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no identity is locked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive hold on one identity. Released on drop.
#[derive(Debug)]
pub struct IdentityGuard {
    identity: String,
    entry: Arc<AsyncMutex<()>>,
    table: LockTable,
    _guard: OwnedMutexGuard<()>,
}

impl IdentityGuard {
    /// The locked identity.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }
}

impl Drop for IdentityGuard {
    fn drop(&mut self) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);

        // table + this guard's entry + the owned mutex guard
        let idle = Arc::strong_count(&self.entry) <= 3;
        let current = table
            .get(&self.identity)
            .is_some_and(|held| Arc::ptr_eq(held, &self.entry));

        if idle && current {
            table.remove(&self.identity);
        }
    }
}
