use serde::{Deserialize, Serialize};

/// Which optional client events are logged
///
/// Everything is off by default; enabled events are emitted through
/// `tracing` at `info` level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientLogMode {
    /// Log each retry decision and backoff
    pub retries: bool,
    /// Log request method, URL and headers
    pub request: bool,
    /// Like `request`, plus the body
    pub request_with_body: bool,
    /// Log response status and headers
    pub response: bool,
    /// Like `response`, plus the body
    pub response_with_body: bool,
}

impl ClientLogMode {
    pub fn all() -> Self {
        Self {
            retries: true,
            request: true,
            request_with_body: true,
            response: true,
            response_with_body: true,
        }
    }

    pub fn is_retries(&self) -> bool {
        self.retries
    }

    pub fn is_request(&self) -> bool {
        self.request || self.request_with_body
    }

    pub fn is_request_with_body(&self) -> bool {
        self.request_with_body
    }

    pub fn is_response(&self) -> bool {
        self.response || self.response_with_body
    }

    pub fn is_response_with_body(&self) -> bool {
        self.response_with_body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_body_implies_plain() {
        let mode = ClientLogMode {
            request_with_body: true,
            ..Default::default()
        };
        assert!(mode.is_request());
        assert!(mode.is_request_with_body());
        assert!(!mode.is_response());
    }

    #[test]
    fn test_parse() {
        let mode: ClientLogMode =
            serde_json::from_str(r#"{"retries": true, "response": true}"#).unwrap();
        assert!(mode.is_retries());
        assert!(mode.is_response());
        assert!(!mode.is_response_with_body());
    }
}
