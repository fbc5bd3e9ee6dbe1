use std::sync::Arc;

use super::content::{CONTENT_SHA256_HEADER, payload_hash};
use crate::config::Options;
use crate::executor::traits::{CredentialsProvider, Signer, SigningContext, TimeProvider};
use crate::pipeline::{Context, ExecutionError, Middleware, Position, Stack};

/// Fetches credentials and hands the finished request to the signer
pub struct Signing {
    signer: Arc<dyn Signer>,
    credentials: Option<Arc<dyn CredentialsProvider>>,
    time: Arc<dyn TimeProvider>,
}

impl Signing {
    pub fn new(
        signer: Arc<dyn Signer>,
        credentials: Option<Arc<dyn CredentialsProvider>>,
        time: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            signer,
            credentials,
            time,
        }
    }
}

impl Middleware for Signing {
    fn id(&self) -> &str {
        "Signing"
    }

    fn handle(&self, ctx: &mut Context) -> Result<(), ExecutionError> {
        let service = ctx
            .service
            .clone()
            .ok_or_else(|| ExecutionError::signing("service metadata was not registered"))?;

        let credentials = match &self.credentials {
            Some(provider) => Some(provider.credentials().map_err(|e| {
                ExecutionError::signing(format!("failed to retrieve credentials: {}", e))
            })?),
            None => None,
        };

        let request = ctx.request_mut()?;
        let payload_hash = match request.header(CONTENT_SHA256_HEADER) {
            Some(hash) => hash.to_string(),
            None => payload_hash(&request.body),
        };
        let signing = SigningContext {
            signing_name: service.signing_name,
            region: service.region,
            time: self.time.now(),
            payload_hash,
        };
        self.signer.sign(request, credentials.as_ref(), &signing)
    }
}

pub fn add_signing(stack: &mut Stack, options: &Options) -> Result<(), ExecutionError> {
    let step = Signing::new(
        options.signer.clone(),
        options.credentials.clone(),
        options.time.clone(),
    );
    stack.finalize.add(step, Position::After)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::traits::{
        Credentials, FixedTimeProvider, RecordingSigner, StaticCredentials,
    };
    use crate::pipeline::ServiceMetadata;
    use chrono::{TimeZone, Utc};

    struct FailingCredentials;

    impl CredentialsProvider for FailingCredentials {
        fn credentials(&self) -> Result<Credentials, ExecutionError> {
            Err(ExecutionError::stack("no profile"))
        }
    }

    fn ctx() -> Context {
        let mut ctx = Context::new("Op", ());
        ctx.service = Some(ServiceMetadata {
            service_id: "ECR".to_string(),
            signing_name: "ecr".to_string(),
            region: "eu-west-1".to_string(),
            operation: "Op".to_string(),
        });
        ctx.begin_attempt(1, 1);
        ctx
    }

    fn time() -> Arc<FixedTimeProvider> {
        Arc::new(FixedTimeProvider::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn test_signer_sees_context() {
        let signer = RecordingSigner::new();
        let step = Signing::new(
            Arc::new(signer.clone()),
            Some(Arc::new(StaticCredentials::new("AKID", "secret"))),
            time(),
        );
        let mut ctx = ctx();
        step.handle(&mut ctx).unwrap();

        let contexts = signer.contexts();
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].signing_name, "ecr");
        assert_eq!(contexts[0].region, "eu-west-1");
        assert_eq!(contexts[0].payload_hash, payload_hash(b""));
        assert_eq!(
            ctx.request().unwrap().header("authorization"),
            Some("Mock Credential=AKID")
        );
    }

    #[test]
    fn test_credentials_failure_is_signing_error() {
        let step = Signing::new(
            Arc::new(RecordingSigner::new()),
            Some(Arc::new(FailingCredentials)),
            time(),
        );
        let err = step.handle(&mut ctx()).unwrap_err();
        assert!(matches!(err, ExecutionError::Signing { .. }));
    }

    #[test]
    fn test_missing_service_metadata() {
        let step = Signing::new(Arc::new(RecordingSigner::new()), None, time());
        let mut ctx = Context::new("Op", ());
        ctx.begin_attempt(1, 1);
        assert!(matches!(
            step.handle(&mut ctx),
            Err(ExecutionError::Signing { .. })
        ));
    }
}
