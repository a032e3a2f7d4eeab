//! Broadcast of "the current session is no longer valid".
//!
//! The request executor raises the signal when the backend rejects a protected
//! call with 401. Any number of components may subscribe; the signal carries
//! no reply and raising it never blocks.

use crate::auth::token_store::Credential;
use tokio::sync::broadcast;
use tracing::debug;

const SIGNAL_CAPACITY: usize = 16;

/// Payload of an authentication failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFailure {
    pub endpoint: String,
    pub status: u16,
    /// The credential the backend rejected, `None` if the call carried none.
    pub credential: Option<Credential>,
}

/// Publish/subscribe channel for authentication failures, owned by the
/// composition root and cloned into the components that raise or observe it.
#[derive(Debug, Clone)]
pub struct FailureSignal {
    sender: broadcast::Sender<AuthFailure>,
}

impl FailureSignal {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self { sender }
    }

    /// Fire-and-forget. Having no subscribers is not an error.
    pub fn raise(&self, endpoint: impl Into<String>, status: u16, credential: Option<Credential>) {
        let failure = AuthFailure {
            endpoint: endpoint.into(),
            status,
            credential,
        };
        match self.sender.send(failure) {
            Ok(receivers) => debug!("Auth failure delivered to {} subscriber(s)", receivers),
            Err(broadcast::error::SendError(failure)) => {
                debug!("Auth failure for {} had no subscribers", failure.endpoint)
            }
        }
    }

    /// Subscribes to failures raised from now on. Dropping the receiver ends
    /// the subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthFailure> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for FailureSignal {
    fn default() -> Self {
        Self::new()
    }
}
