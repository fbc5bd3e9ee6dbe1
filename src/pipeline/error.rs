use std::fmt;

use thiserror::Error;

/// Errors that can occur while a middleware stack executes
///
/// Steps return these; the client wraps the final one in an [`OperationError`]
/// carrying the service and operation names.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    /// Required input members were missing or empty. Raised before any I/O.
    #[error("{} validation error(s) found.{}", .errors.len(), format_list(.errors))]
    Validation { errors: Vec<String> },

    /// The input could not be encoded into a request
    #[error("serialization failed: {message}")]
    Serialization { message: String },

    /// No usable endpoint for the configured region or base endpoint
    #[error("failed to resolve service endpoint, {message}")]
    Endpoint { message: String },

    /// Credential retrieval or request signing failed
    #[error("failed to sign request: {message}")]
    Signing { message: String },

    /// The HTTP exchange itself failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The service answered with a protocol-level error
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The response could not be decoded
    #[error("deserialization failed, {message}")]
    Deserialization {
        message: String,
        snapshot: Option<String>,
    },

    /// A failure that happened after a response was received
    #[error("https response error StatusCode: {status}, RequestID: {request_id}, {source}")]
    Response {
        status: u16,
        request_id: String,
        #[source]
        source: Box<ExecutionError>,
    },

    /// The caller cancelled the call
    #[error("operation canceled")]
    Canceled,

    /// The middleware stack was assembled or driven incorrectly
    #[error("invalid middleware stack: {message}")]
    Stack { message: String },
}

fn format_list(errors: &[String]) -> String {
    errors.iter().map(|e| format!("\n- {}", e)).collect()
}

impl ExecutionError {
    /// Create a Validation error
    pub fn validation_error(errors: Vec<String>) -> Self {
        Self::Validation { errors }
    }

    /// Create a Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an Endpoint error
    pub fn endpoint(message: impl Into<String>) -> Self {
        Self::Endpoint {
            message: message.into(),
        }
    }

    /// Create a Signing error
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    /// Create a Deserialization error, optionally keeping a snapshot of the body
    pub fn deserialization(message: impl Into<String>, snapshot: Option<String>) -> Self {
        Self::Deserialization {
            message: message.into(),
            snapshot,
        }
    }

    /// Create a Stack error
    pub fn stack(message: impl Into<String>) -> Self {
        Self::Stack {
            message: message.into(),
        }
    }

    /// The underlying error with any response wrapper removed
    pub fn root(&self) -> &ExecutionError {
        match self {
            Self::Response { source, .. } => source.root(),
            other => other,
        }
    }

    /// HTTP status of the response this error was produced from, if any
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            Self::Service(err) => Some(err.status),
            _ => None,
        }
    }

    /// Request id reported by the service, if a response was received
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Response { request_id, .. } if !request_id.is_empty() => Some(request_id),
            _ => None,
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self.root(), Self::Canceled)
    }
}

/// Category of a transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportErrorKind {
    #[error("connection failure")]
    Connect,
    #[error("request timed out")]
    Timeout,
    #[error("i/o failure")]
    Io,
    #[error("transport failure")]
    Other,
}

/// A failed HTTP exchange: no response was received
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }
}

/// Which side of the exchange the service blames for an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorFault {
    Client,
    Server,
    Unknown,
}

/// An error response decoded from the service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceError {
    /// Error code with namespace and suffix stripped (e.g. `RepositoryNotFoundException`)
    pub code: String,
    pub message: Option<String>,
    pub fault: ErrorFault,
    /// HTTP status of the error response
    pub status: u16,
}

impl ServiceError {
    pub fn new(code: impl Into<String>, message: Option<String>, status: u16) -> Self {
        Self {
            code: code.into(),
            message,
            fault: ErrorFault::Unknown,
            status,
        }
    }

    pub fn with_fault(mut self, fault: ErrorFault) -> Self {
        self.fault = fault;
        self
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "api error {}", self.code)?;
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ServiceError {}

/// The error surfaced to callers of a client operation
#[derive(Debug, Clone, PartialEq, Error)]
#[error("operation error {service}: {operation}, {source}")]
pub struct OperationError {
    pub service: String,
    pub operation: String,
    #[source]
    pub source: ExecutionError,
}

impl OperationError {
    pub fn new(
        service: impl Into<String>,
        operation: impl Into<String>,
        source: ExecutionError,
    ) -> Self {
        Self {
            service: service.into(),
            operation: operation.into(),
            source,
        }
    }

    /// The classified cause, unwrapped from any response context
    pub fn kind(&self) -> &ExecutionError {
        self.source.root()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.source.request_id()
    }

    pub fn http_status(&self) -> Option<u16> {
        self.source.http_status()
    }

    /// The decoded service error, when the failure came from the service
    pub fn service_error(&self) -> Option<&ServiceError> {
        match self.kind() {
            ExecutionError::Service(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.kind(), ExecutionError::Validation { .. })
    }

    pub fn is_canceled(&self) -> bool {
        self.source.is_canceled()
    }
}
