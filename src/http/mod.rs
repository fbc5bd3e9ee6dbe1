//! HTTP request and response values passed through the middleware stack.

mod reqwest_transport;

pub use reqwest_transport::ReqwestTransport;

use std::fmt;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};

use crate::pipeline::ExecutionError;

/// An outgoing request, rebuilt from scratch for every attempt
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute URL, filled in by endpoint resolution
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self {
            method: Method::POST,
            url: String::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

impl HttpRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing any previous value
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), ExecutionError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ExecutionError::serialization(format!("invalid header name {}: {}", name, e)))?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            ExecutionError::serialization(format!("invalid value for header {}: {}", name.as_str(), e))
        })?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }
}

/// A received response
#[derive(Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: ResponseBody) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

type ReleaseHook = Box<dyn FnOnce() + Send + Sync>;

/// Response payload with a release hook that runs exactly once
///
/// The hook runs on [`ResponseBody::close`] or, failing that, on drop, so the
/// underlying resource is released on every exit path.
pub struct ResponseBody {
    bytes: Bytes,
    release: Option<ReleaseHook>,
    closed: bool,
}

impl ResponseBody {
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            release: None,
            closed: false,
        }
    }

    pub fn empty() -> Self {
        Self::from_bytes(Bytes::new())
    }

    /// A body whose `release` callback runs when it is closed or dropped
    pub fn with_release_hook<F>(bytes: impl Into<Bytes>, release: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            bytes: bytes.into(),
            release: Some(Box::new(release)),
            closed: false,
        }
    }

    /// Payload bytes; fails once the body has been closed
    pub fn bytes(&self) -> Result<&Bytes, ExecutionError> {
        if self.closed {
            return Err(ExecutionError::deserialization(
                "response body already closed",
                None,
            ));
        }
        Ok(&self.bytes)
    }

    pub fn close(&mut self) {
        self.closed = true;
        if let Some(release) = self.release.take() {
            release();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for ResponseBody {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody")
            .field("len", &self.bytes.len())
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_set_header_replaces() {
        let mut req = HttpRequest::new();
        req.set_header("X-Amz-Target", "a").unwrap();
        req.set_header("x-amz-target", "b").unwrap();
        assert_eq!(req.header("X-Amz-Target"), Some("b"));
        assert_eq!(req.headers.len(), 1);
    }

    #[test]
    fn test_set_header_rejects_invalid_value() {
        let mut req = HttpRequest::new();
        let err = req.set_header("X-Test", "bad\nvalue").unwrap_err();
        assert!(matches!(err, ExecutionError::Serialization { .. }));
    }

    #[test]
    fn test_release_hook_runs_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let mut body = ResponseBody::with_release_hook("{}", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(body.bytes().unwrap().as_ref(), b"{}");
        body.close();
        body.close();
        drop(body);

        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases_unclosed_body() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let body = ResponseBody::with_release_hook("{}", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(body);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_closed_body_cannot_be_read() {
        let mut body = ResponseBody::from_bytes("{}");
        body.close();
        assert!(body.is_closed());
        assert!(body.bytes().is_err());
    }
}
