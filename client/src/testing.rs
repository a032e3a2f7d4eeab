//! Scripted transport and token helpers shared by the unit tests.

use crate::api::transport::{
    HttpTransport, Method, TransportError, TransportRequest, TransportResponse,
};
use crate::config::ExecutorSettings;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

pub const BASE_URL: &str = "http://test.local/api";

#[derive(Debug, Clone)]
pub enum MockReply {
    Respond { status: u16, body: String },
    Fail(String),
    /// Never answers; only a timeout ends the call.
    Hang,
}

impl MockReply {
    pub fn json(status: u16, body: Value) -> Self {
        MockReply::Respond {
            status,
            body: body.to_string(),
        }
    }

    pub fn raw(status: u16, body: &str) -> Self {
        MockReply::Respond {
            status,
            body: body.to_string(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self::raw(status, "")
    }
}

/// Replays canned replies per `(method, endpoint)`. The last reply of a route
/// repeats once its queue is down to one entry.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<MockReply>>>,
    calls: Mutex<Vec<(Instant, TransportRequest)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settings() -> ExecutorSettings {
        ExecutorSettings {
            base_url: BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(60),
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(100),
        }
    }

    pub fn on(&self, method: Method, endpoint: &str, reply: MockReply) {
        self.on_sequence(method, endpoint, vec![reply]);
    }

    pub fn on_sequence(&self, method: Method, endpoint: &str, replies: Vec<MockReply>) {
        self.routes
            .lock()
            .unwrap()
            .insert((method, endpoint.to_string()), replies.into());
    }

    pub fn calls(&self) -> Vec<TransportRequest> {
        self.calls.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
    }

    pub fn calls_to(&self, method: Method, endpoint: &str) -> Vec<TransportRequest> {
        let url = format!("{}{}", BASE_URL, endpoint);
        self.calls()
            .into_iter()
            .filter(|r| r.method == method && r.url == url)
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_instants(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    fn next_reply(&self, request: &TransportRequest) -> MockReply {
        let endpoint = request
            .url
            .strip_prefix(BASE_URL)
            .unwrap_or(&request.url)
            .to_string();
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(&(request.method, endpoint)) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => MockReply::json(404, json!({"message": "no route"})),
        }
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let reply = self.next_reply(&request);
        self.calls.lock().unwrap().push((Instant::now(), request));
        match reply {
            MockReply::Respond { status, body } => Ok(TransportResponse { status, body }),
            MockReply::Fail(message) => Err(TransportError(message)),
            MockReply::Hang => std::future::pending().await,
        }
    }
}

fn mint(subject: &str, exp_offset_seconds: i64) -> String {
    let claims = json!({
        "sub": subject,
        "exp": (Utc::now() + ChronoDuration::seconds(exp_offset_seconds)).timestamp(),
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"test-secret"),
    )
    .unwrap()
}

pub fn fresh_token() -> String {
    mint("ada@example.com", 3600)
}

/// A fresh token distinct from [`fresh_token`].
pub fn fresh_token_for(subject: &str) -> String {
    mint(subject, 3600)
}

pub fn expired_token() -> String {
    mint("ada@example.com", -3600)
}
