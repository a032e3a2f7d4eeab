//! Executes single backend calls with timeouts, retries and consistent error
//! classification.
//!
//! Every call carries the stored bearer token if one exists, even when the
//! token looks expired locally: the backend re-validates it on every request,
//! so presenting it costs nothing and survives client clock skew.
//!
//! Outcome handling:
//! - 2xx without a body resolves to `Value::Null`; with a body it is parsed
//!   as JSON, and a body that is not JSON is a `MalformedResponse` error
//! - 401 on a protected endpoint (outside the login/registration views)
//!   clears the stored token and raises the [`FailureSignal`]
//! - 403 is logged and surfaced; the session is kept
//! - 429, 5xx, timeouts and transport failures are retryable when the caller
//!   opted into a [`RetryPolicy`]; everything else is terminal

use crate::api::transport::{HttpTransport, Method, MultipartForm, TransportRequest, TransportResponse};
use crate::auth::{Credential, FailureSignal, TokenStore};
use crate::config::ExecutorSettings;
use crate::errors::{ApiError, ApiResult};
use crate::utils::{join_url, path_has_prefix};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

/// Endpoints whose 401s never revoke the session.
pub const PUBLIC_ENDPOINTS: &[&str] = &[
    "/courses",
    "/auth/login",
    "/auth/register",
    "/auth/forgot-password",
    "/auth/reset-password",
    "/auth/verify-email",
    "/auth/resend-verification",
];

/// Views on which a 401 is an expected outcome of typing a wrong password.
pub const AUTH_VIEWS: &[&str] = &["/login", "/register"];

/// Exponential backoff for retryable outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries issued after the first attempt.
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts,
            base_delay,
        }
    }

    /// Delay before the `retry`-th retry (1-based): `base * 2^(retry - 1)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

/// A logical backend call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub endpoint: String,
    pub body: Option<Value>,
    pub form: Option<MultipartForm>,
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    pub retry: Option<RetryPolicy>,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            body: None,
            form: None,
            headers: Vec::new(),
            timeout: None,
            retry: None,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Get, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Post, endpoint)
    }

    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Put, endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Delete, endpoint)
    }

    /// Serializes `body` as the JSON payload.
    pub fn json<B: Serialize>(mut self, body: &B) -> ApiResult<Self> {
        let value = serde_json::to_value(body).map_err(|e| {
            ApiError::new(
                crate::errors::ErrorKind::Validation,
                format!("Request body could not be serialized: {}", e),
            )
        })?;
        self.body = Some(value);
        Ok(self)
    }

    /// Sends `form` as `multipart/form-data`. A JSON body set with
    /// [`json`](ApiRequest::json) takes precedence.
    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.form = Some(form);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }
}

pub struct RequestExecutor {
    settings: ExecutorSettings,
    transport: Arc<dyn HttpTransport>,
    tokens: TokenStore,
    signal: FailureSignal,
    current_view: RwLock<String>,
    public_endpoints: Vec<String>,
}

impl RequestExecutor {
    pub fn new(
        settings: ExecutorSettings,
        transport: Arc<dyn HttpTransport>,
        tokens: TokenStore,
        signal: FailureSignal,
    ) -> Self {
        Self {
            settings,
            transport,
            tokens,
            signal,
            current_view: RwLock::new("/".to_string()),
            public_endpoints: PUBLIC_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// The retry policy built from configuration, for callers that opt in.
    pub fn default_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.settings.retry_attempts, self.settings.retry_base_delay)
    }

    /// Records which view the user is on; 401s on login/registration views do
    /// not revoke the session.
    pub fn set_current_view(&self, path: impl Into<String>) {
        *self
            .current_view
            .write()
            .unwrap_or_else(PoisonError::into_inner) = path.into();
    }

    pub fn current_view(&self) -> String {
        self.current_view
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_public(&self, endpoint: &str) -> bool {
        self.public_endpoints
            .iter()
            .any(|prefix| path_has_prefix(endpoint, prefix))
    }

    fn on_auth_view(&self) -> bool {
        let view = self.current_view();
        AUTH_VIEWS.iter().any(|auth| path_has_prefix(&view, auth))
    }

    /// Executes the request and deserializes the success value into `T`.
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> ApiResult<T> {
        let endpoint = request.endpoint.clone();
        let value = self.execute(request).await?;
        serde_json::from_value(value).map_err(|e| {
            ApiError::malformed(
                200,
                format!("Unexpected response shape from {}: {}", endpoint, e),
            )
        })
    }

    /// Executes the request, returning the parsed JSON body.
    pub async fn execute(&self, request: ApiRequest) -> ApiResult<Value> {
        let mut retries = 0;
        loop {
            let error = match self.attempt(&request, retries + 1).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            match request.retry {
                Some(policy) if error.is_retryable() && retries < policy.attempts => {
                    retries += 1;
                    let delay = policy.delay_for(retries);
                    warn!(
                        "{} {} failed ({}); retry {}/{} in {:?}",
                        request.method, request.endpoint, error, retries, policy.attempts, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                _ => return Err(error),
            }
        }
    }

    async fn attempt(&self, request: &ApiRequest, attempt: u32) -> ApiResult<Value> {
        let timeout = request.timeout.unwrap_or(self.settings.request_timeout);
        let (prepared, credential) = self.prepare(request);

        debug!(
            "{} {} (attempt {})",
            request.method, request.endpoint, attempt
        );

        let response = match tokio::time::timeout(timeout, self.transport.send(prepared)).await {
            Err(_) => return Err(ApiError::timeout(&request.endpoint, timeout)),
            Ok(Err(e)) => return Err(ApiError::network(e.to_string())),
            Ok(Ok(response)) => response,
        };

        self.classify(&request.endpoint, response, credential)
    }

    /// Builds the wire request and returns the credential it carries.
    fn prepare(&self, request: &ApiRequest) -> (TransportRequest, Option<Credential>) {
        let mut headers = Vec::new();
        if request.body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        let credential = self.tokens.get();
        if let Some(credential) = &credential {
            headers.push(("Authorization".to_string(), credential.bearer_header()));
        }
        for (name, value) in &request.headers {
            if name.eq_ignore_ascii_case("authorization") {
                continue;
            }
            headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
            headers.push((name.clone(), value.clone()));
        }

        let body = request.body.as_ref().map(Value::to_string);
        let form = if body.is_none() { request.form.clone() } else { None };
        let prepared = TransportRequest {
            method: request.method,
            url: join_url(&self.settings.base_url, &request.endpoint),
            headers,
            body,
            form,
        };
        (prepared, credential)
    }

    fn classify(
        &self,
        endpoint: &str,
        response: TransportResponse,
        credential: Option<Credential>,
    ) -> ApiResult<Value> {
        let status = response.status;

        if (200..300).contains(&status) {
            if response.body.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&response.body).map_err(|e| {
                ApiError::malformed(status, format!("Invalid JSON from {}: {}", endpoint, e))
            });
        }

        let payload = serde_json::from_str::<Value>(&response.body).ok();
        let error = ApiError::from_response(status, payload);

        match status {
            401 => self.handle_unauthorized(endpoint, status, credential),
            403 => warn!(
                "Permission denied for {}: {} (session kept)",
                endpoint, error.message
            ),
            _ => {}
        }

        Err(error)
    }

    /// Clears the rejected credential only; a token stored after the call was
    /// sent is left alone.
    fn handle_unauthorized(&self, endpoint: &str, status: u16, credential: Option<Credential>) {
        if self.is_public(endpoint) || self.on_auth_view() {
            debug!("Ignoring 401 from {} for session purposes", endpoint);
            return;
        }
        warn!("Authentication failed for endpoint {}; clearing session", endpoint);
        if let Some(rejected) = &credential {
            if !self.tokens.remove_if(rejected) {
                debug!("Credential was replaced while {} was in flight", endpoint);
            }
        }
        self.signal.raise(endpoint, status, credential);
    }
}
