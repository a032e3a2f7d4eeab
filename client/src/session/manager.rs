//! Owns the current user session.
//!
//! The session moves through `Uninitialized -> Rehydrating -> Authenticated |
//! Anonymous`. Durable storage only mirrors the in-memory session so it can
//! survive a restart; at startup it is read back and re-validated, never
//! trusted blindly when the stored token looks stale.

use crate::api::CourseHubApi;
use crate::api::models::{AuthPayload, RegisterOutcome, RegisterRequest, UserRecord, VerificationNotice};
use crate::auth::{AuthFailure, Credential, FailureSignal, TokenStore};
use crate::errors::SessionError;
use crate::storage::{SharedStore, USER_KEY};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The authenticated user together with the credential that identifies them.
#[derive(Debug, Clone, PartialEq)]
pub struct UserSession {
    pub user: UserRecord,
    pub credential: Credential,
}

impl UserSession {
    pub fn has_role(&self, role: &str) -> bool {
        self.user.has_role(role)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Uninitialized,
    Rehydrating,
    Authenticated(UserSession),
    Anonymous,
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Rehydrating => "rehydrating",
            SessionState::Authenticated(_) => "authenticated",
            SessionState::Anonymous => "anonymous",
        }
    }

    /// True until the startup check has resolved, so consumers can show a
    /// loading state instead of briefly treating the user as signed out.
    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Uninitialized | SessionState::Rehydrating)
    }

    pub fn user(&self) -> Option<&UserSession> {
        match self {
            SessionState::Authenticated(session) => Some(session),
            _ => None,
        }
    }
}

/// Result of a registration attempt.
#[derive(Debug, Clone)]
pub enum Registration {
    LoggedIn(UserSession),
    VerificationRequired(VerificationNotice),
}

/// The serialized form of the durable user mirror: user fields plus token.
#[derive(Serialize, Deserialize)]
struct StoredUser {
    #[serde(flatten)]
    user: UserRecord,
    #[serde(default)]
    token: String,
}

/// Keeps the failure listener alive; dropping it ends the subscription.
pub struct FailureListener {
    handle: JoinHandle<()>,
}

impl Drop for FailureListener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn log_transition(previous: &SessionState, current: &SessionState) {
    if previous.label() != current.label() {
        info!("Session {} -> {}", previous.label(), current.label());
    }
}

pub struct SessionManager {
    store: SharedStore,
    tokens: TokenStore,
    api: CourseHubApi,
    signal: FailureSignal,
    state: watch::Sender<SessionState>,
}

impl SessionManager {
    pub fn new(
        store: SharedStore,
        tokens: TokenStore,
        api: CourseHubApi,
        signal: FailureSignal,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        Arc::new(Self {
            store,
            tokens,
            api,
            signal,
            state,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    pub fn current_user(&self) -> Option<UserSession> {
        self.state.borrow().user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().user().is_some()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.state
            .borrow()
            .user()
            .is_some_and(|session| session.has_role(role))
    }

    fn transition(&self, next: SessionState) {
        self.commit(next, || {});
    }

    /// Runs `write` against durable storage and moves to `next` inside the
    /// state channel's critical section, so no other transition can land in
    /// between.
    fn commit(&self, next: SessionState, write: impl FnOnce()) {
        self.state.send_modify(|state| {
            write();
            let previous = std::mem::replace(state, next);
            log_transition(&previous, state);
        });
    }

    /// Restores the session from durable storage.
    ///
    /// - no token: anonymous
    /// - token that looks expired or malformed: one profile fetch decides
    /// - token that looks valid with a cached user: authenticated offline
    /// - token that looks valid without a cached user: one profile fetch
    ///
    /// A failed profile fetch clears storage and ends anonymous; it is not
    /// reported as an error.
    pub async fn rehydrate(&self) -> SessionState {
        self.transition(SessionState::Rehydrating);

        let Some(credential) = self.tokens.get() else {
            self.commit(SessionState::Anonymous, || self.store.remove(USER_KEY));
            return self.state();
        };

        if self.tokens.is_valid() {
            if let Some(user) = self.cached_user() {
                self.transition(SessionState::Authenticated(UserSession { user, credential }));
                return self.state();
            }
        } else {
            info!("Stored token looks expired; confirming with the backend");
        }

        match self.api.profile().await {
            Ok(user) => {
                let session = UserSession { user, credential };
                self.commit(SessionState::Authenticated(session.clone()), || {
                    self.persist(&session)
                });
            }
            Err(e) => {
                warn!("Could not restore session: {}", e);
                self.commit(SessionState::Anonymous, || {
                    self.tokens.remove_if(&credential);
                    self.store.remove(USER_KEY);
                });
            }
        }
        self.state()
    }

    fn cached_user(&self) -> Option<UserRecord> {
        let raw = self.store.get(USER_KEY)?;
        match serde_json::from_str::<StoredUser>(&raw) {
            Ok(stored) => Some(stored.user),
            Err(e) => {
                warn!("Discarding unreadable cached user: {}", e);
                None
            }
        }
    }

    fn persist(&self, session: &UserSession) {
        self.tokens.set(&session.credential);
        let stored = StoredUser {
            user: session.user.clone(),
            token: session.credential.as_str().to_string(),
        };
        match serde_json::to_string(&stored) {
            Ok(raw) => self.store.set(USER_KEY, &raw),
            Err(e) => warn!("Could not serialize user for storage: {}", e),
        }
    }

    fn clear_storage(&self) {
        self.tokens.remove();
        self.store.remove(USER_KEY);
    }

    /// Stores the credential and user and marks the session authenticated.
    /// Calling it again with the same payload leaves the same state.
    pub fn login(&self, payload: AuthPayload) -> Result<UserSession, SessionError> {
        if payload.token.trim().is_empty() {
            return Err(SessionError::MissingToken);
        }
        let session = UserSession {
            user: payload.user,
            credential: Credential::new(payload.token),
        };
        self.commit(SessionState::Authenticated(session.clone()), || {
            self.persist(&session)
        });
        Ok(session)
    }

    pub async fn login_with_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserSession, SessionError> {
        let payload = self.api.login(email, password).await?;
        self.login(payload)
    }

    /// Registers a new account. Only a response carrying a token logs in;
    /// accounts awaiting e-mail verification stay anonymous.
    pub async fn register(&self, request: &RegisterRequest) -> Result<Registration, SessionError> {
        match self.api.register(request).await? {
            RegisterOutcome::Authenticated(payload) => Ok(Registration::LoggedIn(self.login(payload)?)),
            RegisterOutcome::VerificationRequired(notice) => {
                info!("Registration for {} awaits verification", request.email);
                Ok(Registration::VerificationRequired(notice))
            }
        }
    }

    pub fn logout(&self) {
        self.commit(SessionState::Anonymous, || self.clear_storage());
    }

    /// Merges `partial` into the current user and re-persists it.
    pub fn update_user(&self, partial: &Map<String, Value>) -> Result<UserSession, SessionError> {
        let mut outcome = Err(SessionError::NotAuthenticated);
        self.state.send_if_modified(|state| {
            let SessionState::Authenticated(session) = state else {
                return false;
            };
            match session.user.merged(partial) {
                Ok(user) => {
                    session.user = user;
                    self.persist(session);
                    outcome = Ok(session.clone());
                    true
                }
                Err(e) => {
                    outcome = Err(SessionError::InvalidUser(e));
                    false
                }
            }
        });

        outcome
    }

    /// Sends profile changes to the backend, then merges what it returns.
    pub async fn update_profile(&self, changes: &Map<String, Value>) -> Result<UserSession, SessionError> {
        if !self.is_authenticated() {
            return Err(SessionError::NotAuthenticated);
        }
        let updated = self.api.update_profile(changes).await?;
        let fields = match serde_json::to_value(&updated).map_err(SessionError::InvalidUser)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.update_user(&fields)
    }

    /// Forced revocation after the backend rejected a credential. A failure
    /// for a credential other than the current session's is stale and
    /// ignored.
    fn handle_failure(&self, failure: &AuthFailure) {
        self.state.send_if_modified(|state| {
            let current = state.user().map(|session| &session.credential);
            if current.is_some() && current != failure.credential.as_ref() {
                debug!(
                    "Ignoring {} from {} for a replaced credential",
                    failure.status, failure.endpoint
                );
                return false;
            }

            warn!(
                "Session revoked after {} from {}",
                failure.status, failure.endpoint
            );
            if let Some(rejected) = &failure.credential {
                self.tokens.remove_if(rejected);
            }
            self.store.remove(USER_KEY);
            let previous = std::mem::replace(state, SessionState::Anonymous);
            log_transition(&previous, state);
            previous != SessionState::Anonymous
        });
    }

    /// After missed signals, revoke only if the current credential is gone
    /// from the token store, which the executor does on rejection.
    fn reconcile_after_lag(&self) {
        let Some(session) = self.current_user() else {
            return;
        };
        if self.tokens.get().as_ref() != Some(&session.credential) {
            self.handle_failure(&AuthFailure {
                endpoint: "<lagged>".to_string(),
                status: 401,
                credential: Some(session.credential),
            });
        }
    }

    /// Starts reacting to authentication failures. The subscription lives as
    /// long as the returned guard.
    pub fn listen_for_failures(self: &Arc<Self>) -> FailureListener {
        let mut receiver = self.signal.subscribe();
        let manager: Weak<Self> = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            loop {
                let received = receiver.recv().await;
                let Some(this) = manager.upgrade() else {
                    break;
                };
                match received {
                    Ok(failure) => this.handle_failure(&failure),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Missed {} auth failure signal(s)", missed);
                        this.reconcile_after_lag();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        FailureListener { handle }
    }
}
