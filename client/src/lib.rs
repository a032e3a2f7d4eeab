//! Client library for the CourseHub learning platform.
//!
//! Covers the parts of the client that need more than layout code: keeping a
//! session alive across restarts and token expiry, talking to an unreliable
//! backend with timeouts and retries, broadcasting authentication failures,
//! and tracking which lectures of a purchased course a learner may open.

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod progress;
pub mod session;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

use crate::api::{CourseHubApi, HttpTransport, RequestExecutor};
use crate::auth::{FailureSignal, TokenStore};
use crate::config::ExecutorSettings;
use crate::session::{FailureListener, SessionManager};
use crate::storage::SharedStore;
use std::sync::Arc;

/// Composition root wiring the store, token store, failure signal, executor,
/// API and session manager together.
pub struct CourseHubClient {
    pub store: SharedStore,
    pub tokens: TokenStore,
    pub signal: FailureSignal,
    pub api: CourseHubApi,
    pub session: Arc<SessionManager>,
    _listener: FailureListener,
}

impl CourseHubClient {
    /// Must be called inside a Tokio runtime: the session manager's failure
    /// listener is spawned here.
    pub fn new(
        settings: ExecutorSettings,
        store: SharedStore,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let tokens = TokenStore::new(store.clone());
        let signal = FailureSignal::new();
        let executor = RequestExecutor::new(settings, transport, tokens.clone(), signal.clone());
        let api = CourseHubApi::new(Arc::new(executor));
        let session = SessionManager::new(store.clone(), tokens.clone(), api.clone(), signal.clone());
        let listener = session.listen_for_failures();

        Self {
            store,
            tokens,
            signal,
            api,
            session,
            _listener: listener,
        }
    }
}
