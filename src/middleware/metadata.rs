use crate::config::Options;
use crate::pipeline::{Context, ExecutionError, Middleware, Position, ServiceMetadata, Stack};

/// Records which service, region and operation the call targets
#[derive(Debug, Clone)]
pub struct RegisterServiceMetadata {
    metadata: ServiceMetadata,
}

impl RegisterServiceMetadata {
    pub fn new(service_id: &str, signing_name: &str, region: &str, operation: &str) -> Self {
        Self {
            metadata: ServiceMetadata {
                service_id: service_id.to_string(),
                signing_name: signing_name.to_string(),
                region: region.to_string(),
                operation: operation.to_string(),
            },
        }
    }
}

impl Middleware for RegisterServiceMetadata {
    fn id(&self) -> &str {
        "RegisterServiceMetadata"
    }

    fn handle(&self, ctx: &mut Context) -> Result<(), ExecutionError> {
        ctx.service = Some(self.metadata.clone());
        Ok(())
    }
}

pub fn add_service_metadata(
    stack: &mut Stack,
    options: &Options,
    service_id: &str,
    signing_name: &str,
) -> Result<(), ExecutionError> {
    let step = RegisterServiceMetadata::new(service_id, signing_name, &options.region, stack.id());
    stack.initialize.add(step, Position::Before)
}
