//! Session lifecycle: rehydration, login/logout, and forced revocation.

pub mod manager;

pub use manager::{FailureListener, Registration, SessionManager, SessionState, UserSession};
