use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::StatusCode;
use http::header::{HeaderName, HeaderValue};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::http::{HttpRequest, HttpResponse, ResponseBody};
use crate::pipeline::{ExecutionError, TransportError};

/// Trait for sending one HTTP request
///
/// This keeps the executor independent of any HTTP client. Implementations
/// can be mocked for testing or swapped for a different client.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Static access keys handed to a [`Signer`]
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Trait for retrieving credentials
pub trait CredentialsProvider: Send + Sync {
    fn credentials(&self) -> Result<Credentials, ExecutionError>;
}

/// Everything a signer needs to know about the request besides its contents
#[derive(Debug, Clone, PartialEq)]
pub struct SigningContext {
    pub signing_name: String,
    pub region: String,
    pub time: DateTime<Utc>,
    /// Hex SHA-256 of the payload
    pub payload_hash: String,
}

/// Trait for attaching authentication to a request
///
/// Signing algorithms live outside this crate; the pipeline only calls them.
pub trait Signer: Send + Sync {
    fn sign(
        &self,
        request: &mut HttpRequest,
        credentials: Option<&Credentials>,
        context: &SigningContext,
    ) -> Result<(), ExecutionError>;
}

/// A signer that leaves requests untouched
///
/// Suitable for local emulators and endpoints behind an authenticating proxy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousSigner;

impl Signer for AnonymousSigner {
    fn sign(
        &self,
        _request: &mut HttpRequest,
        _credentials: Option<&Credentials>,
        _context: &SigningContext,
    ) -> Result<(), ExecutionError> {
        Ok(())
    }
}

/// Inputs to endpoint resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointParams {
    pub region: String,
    pub base_endpoint: Option<String>,
}

/// A resolved service endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
}

/// Trait for turning region/service identifiers into a URL
pub trait EndpointResolver: Send + Sync {
    fn resolve(&self, params: &EndpointParams) -> Result<Endpoint, ExecutionError>;
}

/// Trait for getting the current time
///
/// This allows response timing and clock-skew measurement to be
/// deterministic in tests by providing a fixed time.
pub trait TimeProvider: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// Mock implementations for testing

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Counts response bodies handed out and released by a [`MockTransport`]
#[derive(Debug, Clone, Default)]
pub struct BodyTracker {
    opened: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl BodyTracker {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Bodies handed out and not yet released
    pub fn outstanding(&self) -> usize {
        self.opened() - self.released()
    }

    fn track(&self, bytes: Bytes) -> ResponseBody {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let released = self.released.clone();
        ResponseBody::with_release_hook(bytes, move || {
            released.fetch_add(1, Ordering::SeqCst);
        })
    }
}

/// One scripted outcome of a [`MockTransport`] send
#[derive(Debug, Clone)]
pub enum MockReply {
    Response {
        status: u16,
        headers: Vec<(String, String)>,
        body: String,
    },
    Failure(TransportError),
    /// Open a body, wait, then reply; lets tests cancel mid-flight
    Delayed(Duration, Box<MockReply>),
    /// Cancel the token, then hand the reply back anyway
    Cancelling(CancellationToken, Box<MockReply>),
}

impl MockReply {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self::Response {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(self, name: &str, value: &str) -> Self {
        match self {
            Self::Response {
                status,
                mut headers,
                body,
            } => {
                headers.push((name.to_string(), value.to_string()));
                Self::Response {
                    status,
                    headers,
                    body,
                }
            }
            other => other,
        }
    }

    pub fn delayed(self, delay: Duration) -> Self {
        Self::Delayed(delay, Box::new(self))
    }

    /// Reply only after `cancel` has fired, as if the caller gave up while
    /// the response was on its way back
    pub fn cancelling(self, cancel: &CancellationToken) -> Self {
        Self::Cancelling(cancel.clone(), Box::new(self))
    }
}

/// Mock transport for testing
///
/// Replies are consumed in order; the last one repeats once the script is
/// exhausted. Every request is recorded and every body is tracked so tests
/// can assert nothing leaks.
#[derive(Clone)]
pub struct MockTransport {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
    tracker: BodyTracker,
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransport")
            .field("calls", &self.calls())
            .field("tracker", &self.tracker)
            .finish()
    }
}

impl MockTransport {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            requests: Arc::new(Mutex::new(Vec::new())),
            tracker: BodyTracker::default(),
        }
    }

    /// A transport that gives the same reply to every request
    pub fn always(reply: MockReply) -> Self {
        Self::new(vec![reply])
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn tracker(&self) -> &BodyTracker {
        &self.tracker
    }

    fn next_reply(&self) -> Option<MockReply> {
        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        }
    }

    fn build_response(&self, status: u16, headers: Vec<(String, String)>, body: String) -> HttpResponse {
        let mut response = HttpResponse::new(
            StatusCode::from_u16(status).unwrap(),
            self.tracker.track(Bytes::from(body)),
        );
        for (name, value) in headers {
            response.headers.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(&value).unwrap(),
            );
        }
        response
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);

        let mut reply = self
            .next_reply()
            .unwrap_or_else(|| MockReply::json(200, "{}"));

        loop {
            match reply {
                MockReply::Response {
                    status,
                    headers,
                    body,
                } => return Ok(self.build_response(status, headers, body)),
                MockReply::Failure(err) => return Err(err),
                MockReply::Delayed(delay, inner) => {
                    // Hold a tracked body across the wait so cancellation
                    // exercises the release path
                    let in_flight = self.tracker.track(Bytes::new());
                    tokio::time::sleep(delay).await;
                    drop(in_flight);
                    reply = *inner;
                }
                MockReply::Cancelling(cancel, inner) => {
                    cancel.cancel();
                    reply = *inner;
                }
            }
        }
    }
}

/// Credentials provider returning fixed keys
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    credentials: Credentials,
}

impl StaticCredentials {
    pub fn new(access_key_id: &str, secret_access_key: &str) -> Self {
        Self {
            credentials: Credentials {
                access_key_id: access_key_id.to_string(),
                secret_access_key: secret_access_key.to_string(),
                session_token: None,
            },
        }
    }
}

impl CredentialsProvider for StaticCredentials {
    fn credentials(&self) -> Result<Credentials, ExecutionError> {
        Ok(self.credentials.clone())
    }
}

/// Signer that records what it was asked to sign and stamps a marker header
#[derive(Debug, Clone, Default)]
pub struct RecordingSigner {
    contexts: Arc<Mutex<Vec<SigningContext>>>,
}

impl RecordingSigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contexts(&self) -> Vec<SigningContext> {
        self.contexts.lock().unwrap().clone()
    }
}

impl Signer for RecordingSigner {
    fn sign(
        &self,
        request: &mut HttpRequest,
        credentials: Option<&Credentials>,
        context: &SigningContext,
    ) -> Result<(), ExecutionError> {
        self.contexts.lock().unwrap().push(context.clone());
        let key = credentials.map_or("anonymous", |c| c.access_key_id.as_str());
        request.set_header("Authorization", &format!("Mock Credential={}", key))
    }
}

/// Fixed time provider for testing
#[derive(Debug, Clone)]
pub struct FixedTimeProvider {
    now: DateTime<Utc>,
}

impl FixedTimeProvider {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

impl TimeProvider for FixedTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

/// Endpoint resolver that always returns the same URL
#[derive(Debug, Clone)]
pub struct StaticEndpointResolver {
    url: String,
}

impl StaticEndpointResolver {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl EndpointResolver for StaticEndpointResolver {
    fn resolve(&self, _params: &EndpointParams) -> Result<Endpoint, ExecutionError> {
        Ok(Endpoint {
            url: self.url.clone(),
        })
    }
}
