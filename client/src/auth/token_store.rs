//! Bearer credential persistence and heuristic validity checks.

use crate::storage::{SharedStore, TOKEN_KEY};
use crate::utils::jwt::{self, UnverifiedClaims};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// An opaque bearer string. Holding one says nothing about whether the
/// backend will still accept it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Claims decoded without verification. `None` if the token is malformed.
    pub fn claims(&self) -> Option<UnverifiedClaims> {
        jwt::decode_unverified(&self.0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.claims().and_then(|c| c.expires_at())
    }

    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Reads and writes the credential in the durable session store.
///
/// Only the session manager sets a credential. The request executor may
/// [`remove`](TokenStore::remove) it after an authentication failure.
#[derive(Clone)]
pub struct TokenStore {
    store: SharedStore,
    // Serialises writes so a compare-and-remove cannot interleave with a set.
    write_lock: Arc<Mutex<()>>,
}

impl TokenStore {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> Option<Credential> {
        self.store
            .get(TOKEN_KEY)
            .filter(|token| !token.is_empty())
            .map(Credential)
    }

    pub fn set(&self, credential: &Credential) {
        let _guard = self.lock_writes();
        self.store.set(TOKEN_KEY, credential.as_str());
    }

    pub fn remove(&self) {
        let _guard = self.lock_writes();
        self.store.remove(TOKEN_KEY);
    }

    /// Removes the stored credential only if it is still `expected`, so a
    /// rejection of an old token never deletes one stored since.
    pub fn remove_if(&self, expected: &Credential) -> bool {
        let _guard = self.lock_writes();
        if self.get().as_ref() != Some(expected) {
            return false;
        }
        self.store.remove(TOKEN_KEY);
        true
    }

    /// Raw presence only.
    pub fn exists(&self) -> bool {
        self.get().is_some()
    }

    /// Advisory check. False when no token is stored, when the token is
    /// malformed, or when its expiry is within the skew buffer of now. Never
    /// use this to make an authorization decision.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.get()
            .and_then(|credential| credential.claims())
            .is_some_and(|claims| claims.is_fresh_at(now))
    }
}
