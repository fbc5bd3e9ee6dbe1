use sha2::{Digest, Sha256};

use crate::pipeline::{Context, ExecutionError, Middleware, Position, Stack};

pub const CONTENT_SHA256_HEADER: &str = "X-Amz-Content-Sha256";

/// Sets `Content-Length` from the serialized body
#[derive(Debug, Clone, Copy, Default)]
pub struct ComputeContentLength;

impl Middleware for ComputeContentLength {
    fn id(&self) -> &str {
        "ComputeContentLength"
    }

    fn handle(&self, ctx: &mut Context) -> Result<(), ExecutionError> {
        let request = ctx.request_mut()?;
        let length = request.body.len().to_string();
        request.set_header("Content-Length", &length)
    }
}

/// Hex SHA-256 of a payload
pub fn payload_hash(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// Records the payload hash the signer covers
#[derive(Debug, Clone, Copy, Default)]
pub struct ComputePayloadHash;

impl Middleware for ComputePayloadHash {
    fn id(&self) -> &str {
        "ComputePayloadHash"
    }

    fn handle(&self, ctx: &mut Context) -> Result<(), ExecutionError> {
        let request = ctx.request_mut()?;
        let hash = payload_hash(&request.body);
        request.set_header(CONTENT_SHA256_HEADER, &hash)
    }
}

pub fn add_compute_content_length(stack: &mut Stack) -> Result<(), ExecutionError> {
    stack.build.add(ComputeContentLength, Position::After)
}

pub fn add_compute_payload_hash(stack: &mut Stack) -> Result<(), ExecutionError> {
    stack.finalize.add(ComputePayloadHash, Position::After)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn ctx_with_body(body: &'static str) -> Context {
        let mut ctx = Context::new("Op", ());
        ctx.begin_attempt(1, 1);
        ctx.request_mut().unwrap().body = Bytes::from_static(body.as_bytes());
        ctx
    }

    #[test]
    fn test_content_length() {
        let mut ctx = ctx_with_body(r#"{"repositoryName":"web"}"#);
        ComputeContentLength.handle(&mut ctx).unwrap();
        assert_eq!(ctx.request().unwrap().header("content-length"), Some("24"));
    }

    #[test]
    fn test_payload_hash_of_empty_body() {
        assert_eq!(
            payload_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_payload_hash_header() {
        let mut ctx = ctx_with_body("{}");
        ComputePayloadHash.handle(&mut ctx).unwrap();
        assert_eq!(
            ctx.request().unwrap().header(CONTENT_SHA256_HEADER),
            Some("44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a")
        );
    }
}
