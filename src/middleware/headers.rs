use crate::config::Options;
use crate::pipeline::{Context, ExecutionError, Middleware, Position, Stack};

pub const INVOCATION_ID_HEADER: &str = "amz-sdk-invocation-id";
pub const TRACE_ID_HEADER: &str = "X-Amzn-Trace-Id";

const SDK_NAME: &str = "ecrscan";
const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Stamps the per-call invocation id on every attempt
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientRequestId;

impl Middleware for ClientRequestId {
    fn id(&self) -> &str {
        "ClientRequestID"
    }

    fn handle(&self, ctx: &mut Context) -> Result<(), ExecutionError> {
        let invocation_id = ctx.invocation_id().to_string();
        let request = ctx.request_mut()?;
        if request.has_header(INVOCATION_ID_HEADER) {
            return Ok(());
        }
        request.set_header(INVOCATION_ID_HEADER, &invocation_id)
    }
}

/// Sets `User-Agent` and `X-Amz-User-Agent`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgent {
    value: String,
}

impl UserAgent {
    /// `service_id` names the API; `retry_mode` and `app_id` become feature tags
    pub fn new(service_id: &str, retry_mode: &str, app_id: Option<&str>) -> Self {
        let mut value = format!(
            "{}/{} os/{} lang/rust api/{}#{} cfg/retry-mode#{}",
            SDK_NAME,
            SDK_VERSION,
            std::env::consts::OS,
            service_id.to_lowercase().replace(' ', "-"),
            SDK_VERSION,
            retry_mode
        );
        if let Some(app_id) = app_id.filter(|id| !id.is_empty()) {
            value.push_str(" app/");
            value.push_str(app_id);
        }
        Self { value }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl Middleware for UserAgent {
    fn id(&self) -> &str {
        "UserAgent"
    }

    fn handle(&self, ctx: &mut Context) -> Result<(), ExecutionError> {
        let request = ctx.request_mut()?;
        request.set_header("User-Agent", &self.value)?;
        request.set_header("X-Amz-User-Agent", &self.value)
    }
}

/// Propagates the Lambda trace id so calls made from inside a function are
/// not mistaken for recursion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecursionDetection {
    function_name: Option<String>,
    trace_id: Option<String>,
}

impl RecursionDetection {
    pub fn new(function_name: Option<String>, trace_id: Option<String>) -> Self {
        Self {
            function_name,
            trace_id,
        }
    }

    /// Reads `AWS_LAMBDA_FUNCTION_NAME` and `_X_AMZN_TRACE_ID`
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("AWS_LAMBDA_FUNCTION_NAME").ok(),
            std::env::var("_X_AMZN_TRACE_ID").ok(),
        )
    }
}

impl Middleware for RecursionDetection {
    fn id(&self) -> &str {
        "RecursionDetection"
    }

    fn handle(&self, ctx: &mut Context) -> Result<(), ExecutionError> {
        let (Some(function), Some(trace_id)) = (&self.function_name, &self.trace_id) else {
            return Ok(());
        };
        if function.is_empty() || trace_id.is_empty() {
            return Ok(());
        }
        let request = ctx.request_mut()?;
        if request.has_header(TRACE_ID_HEADER) {
            return Ok(());
        }
        request.set_header(TRACE_ID_HEADER, &percent_encode(trace_id))
    }
}

/// Escape anything outside printable ASCII
fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_graphic() || byte == b' ' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

pub fn add_client_request_id(stack: &mut Stack) -> Result<(), ExecutionError> {
    stack.build.add(ClientRequestId, Position::After)
}

pub fn add_client_user_agent(
    stack: &mut Stack,
    options: &Options,
    service_id: &str,
) -> Result<(), ExecutionError> {
    let retryer = options.retryer();
    let step = UserAgent::new(service_id, retryer.mode(), options.app_id.as_deref());
    stack.build.add(step, Position::After)
}

pub fn add_recursion_detection(stack: &mut Stack) -> Result<(), ExecutionError> {
    stack.build.add(RecursionDetection::from_env(), Position::After)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        let mut ctx = Context::new("Op", ());
        ctx.begin_attempt(1, 1);
        ctx
    }

    #[test]
    fn test_invocation_id_header() {
        let mut ctx = ctx();
        ClientRequestId.handle(&mut ctx).unwrap();
        let expected = ctx.invocation_id().to_string();
        assert_eq!(
            ctx.request().unwrap().header(INVOCATION_ID_HEADER),
            Some(expected.as_str())
        );
    }

    #[test]
    fn test_user_agent() {
        let ua = UserAgent::new("ECR", "standard", Some("scanner"));
        assert!(ua.value().starts_with("ecrscan/"));
        assert!(ua.value().contains(" api/ecr#"));
        assert!(ua.value().contains(" cfg/retry-mode#standard"));
        assert!(ua.value().ends_with(" app/scanner"));

        let mut ctx = ctx();
        ua.handle(&mut ctx).unwrap();
        let request = ctx.request().unwrap();
        assert_eq!(request.header("user-agent"), Some(ua.value()));
        assert_eq!(request.header("x-amz-user-agent"), Some(ua.value()));
    }

    #[test]
    fn test_user_agent_without_app_id() {
        let ua = UserAgent::new("ECR", "nop", Some(""));
        assert!(!ua.value().contains("app/"));
    }

    #[test]
    fn test_recursion_detection_inside_lambda() {
        let step = RecursionDetection::new(
            Some("scanner-fn".to_string()),
            Some("Root=1-5759e988-bd862e3fe1be46a994272793;Sampled=1\n".to_string()),
        );
        let mut ctx = ctx();
        step.handle(&mut ctx).unwrap();
        assert_eq!(
            ctx.request().unwrap().header(TRACE_ID_HEADER),
            Some("Root=1-5759e988-bd862e3fe1be46a994272793;Sampled=1%0A")
        );
    }

    #[test]
    fn test_recursion_detection_outside_lambda() {
        let step = RecursionDetection::new(None, Some("Root=1-abc".to_string()));
        let mut ctx = ctx();
        step.handle(&mut ctx).unwrap();
        assert!(!ctx.request().unwrap().has_header(TRACE_ID_HEADER));
    }
}
