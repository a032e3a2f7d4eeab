//! Credential handling and authentication-failure signalling.
//!
//! Nothing in this module is a security boundary. The backend authorizes every
//! request; the client only tries to avoid pointless round-trips and to notice
//! quickly when a session has been revoked.

pub mod signal;
pub mod token_store;

pub use signal::{AuthFailure, FailureSignal};
pub use token_store::{Credential, TokenStore};
