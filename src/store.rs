//! Identity persistence for silent session resume.
//!
//! The game identifies a returning tab by the `{display name, token, player
//! id}` triple handed out during the handshake. Where that triple lives is a
//! platform concern — `sessionStorage` in a browser build, a file or nothing
//! at all on native — so the session loop talks to an [`IdentityStore`]
//! trait and the embedding application picks the backing.
//!
//! The store is read once per connection attempt and written exactly once per
//! token assignment; all calls originate from the single-threaded session
//! loop, so implementations need interior mutability but no cross-writer
//! coordination.

use std::sync::Mutex;

use crate::session::Identity;

/// Abstraction over durable identity storage so reconnection logic stays
/// platform-agnostic.
pub trait IdentityStore: Send + Sync + 'static {
    /// Load the persisted identity, if any.
    fn load(&self) -> Option<Identity>;

    /// Persist the identity, replacing whatever was stored before.
    fn save(&self, identity: &Identity);

    /// Forget the persisted identity.
    fn clear(&self);
}

/// An [`IdentityStore`] that keeps the identity in process memory.
///
/// Survives reconnects within one process lifetime — the equivalent of a
/// browser tab's session scope for native callers — and doubles as the
/// store used throughout the test suites.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    identity: Mutex<Option<Identity>>,
}

impl MemoryIdentityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with an identity, as if a prior session had
    /// saved one.
    pub fn with_identity(identity: Identity) -> Self {
        Self {
            identity: Mutex::new(Some(identity)),
        }
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&self) -> Option<Identity> {
        match self.identity.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn save(&self, identity: &Identity) {
        match self.identity.lock() {
            Ok(mut guard) => *guard = Some(identity.clone()),
            Err(poisoned) => *poisoned.into_inner() = Some(identity.clone()),
        }
    }

    fn clear(&self) {
        match self.identity.lock() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            player_id: Some(7),
            token: Some("abc".into()),
            display_name: Some("Alice".into()),
        }
    }

    #[test]
    fn empty_store_loads_nothing() {
        let store = MemoryIdentityStore::new();
        assert!(store.load().is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = MemoryIdentityStore::new();
        store.save(&identity());
        assert_eq!(store.load(), Some(identity()));
    }

    #[test]
    fn save_replaces_previous_identity() {
        let store = MemoryIdentityStore::with_identity(identity());
        let replacement = Identity {
            player_id: Some(9),
            token: Some("xyz".into()),
            display_name: Some("Alice".into()),
        };
        store.save(&replacement);
        assert_eq!(store.load(), Some(replacement));
    }

    #[test]
    fn clear_forgets_identity() {
        let store = MemoryIdentityStore::with_identity(identity());
        store.clear();
        assert!(store.load().is_none());
    }
}
