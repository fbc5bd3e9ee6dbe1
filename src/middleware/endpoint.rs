use std::sync::Arc;

use crate::config::Options;
use crate::executor::traits::{Endpoint, EndpointParams, EndpointResolver};
use crate::pipeline::{Context, ExecutionError, Middleware, Position, Stack};

/// Resolves `https://api.ecr.{region}.amazonaws.com`, or the configured base
/// endpoint when one is set
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEndpointResolver;

impl EndpointResolver for DefaultEndpointResolver {
    fn resolve(&self, params: &EndpointParams) -> Result<Endpoint, ExecutionError> {
        if let Some(base) = &params.base_endpoint {
            let base = base.trim_end_matches('/');
            if !(base.starts_with("https://") || base.starts_with("http://")) {
                return Err(ExecutionError::endpoint(format!(
                    "base endpoint must be an absolute http(s) URL, got {}",
                    base
                )));
            }
            return Ok(Endpoint {
                url: base.to_string(),
            });
        }

        let region = params.region.as_str();
        if region.is_empty() {
            return Err(ExecutionError::endpoint("a region must be set"));
        }
        if !region
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(ExecutionError::endpoint(format!("invalid region {}", region)));
        }

        let suffix = if region.starts_with("cn-") {
            "amazonaws.com.cn"
        } else {
            "amazonaws.com"
        };
        Ok(Endpoint {
            url: format!("https://api.ecr.{}.{}", region, suffix),
        })
    }
}

/// Prefixes the serialized request path with the resolved endpoint
pub struct ResolveEndpoint {
    resolver: Arc<dyn EndpointResolver>,
    params: EndpointParams,
}

impl ResolveEndpoint {
    pub fn new(resolver: Arc<dyn EndpointResolver>, params: EndpointParams) -> Self {
        Self { resolver, params }
    }
}

impl Middleware for ResolveEndpoint {
    fn id(&self) -> &str {
        "ResolveEndpoint"
    }

    fn handle(&self, ctx: &mut Context) -> Result<(), ExecutionError> {
        let endpoint = self.resolver.resolve(&self.params)?;
        let request = ctx.request_mut()?;
        let path = if request.url.starts_with('/') {
            request.url.as_str()
        } else {
            "/"
        };
        request.url = format!("{}{}", endpoint.url.trim_end_matches('/'), path);
        Ok(())
    }
}

/// Downgrades the resolved URL to plain http
#[derive(Debug, Clone, Copy, Default)]
pub struct DisableHttps;

impl Middleware for DisableHttps {
    fn id(&self) -> &str {
        "DisableHTTPS"
    }

    fn handle(&self, ctx: &mut Context) -> Result<(), ExecutionError> {
        let request = ctx.request_mut()?;
        if let Some(rest) = request.url.strip_prefix("https://") {
            request.url = format!("http://{}", rest);
        }
        Ok(())
    }
}

pub fn add_resolve_endpoint(stack: &mut Stack, options: &Options) -> Result<(), ExecutionError> {
    let params = EndpointParams {
        region: options.region.clone(),
        base_endpoint: options.base_endpoint.clone(),
    };
    stack.serialize.add(
        ResolveEndpoint::new(options.endpoint_resolver.clone(), params),
        Position::After,
    )
}

/// Registered only when the options ask for it
pub fn add_disable_https(stack: &mut Stack, options: &Options) -> Result<(), ExecutionError> {
    if !options.endpoint_options.disable_https {
        return Ok(());
    }
    stack.serialize.add(DisableHttps, Position::After)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::traits::{MockTransport, StaticEndpointResolver};

    fn params(region: &str, base: Option<&str>) -> EndpointParams {
        EndpointParams {
            region: region.to_string(),
            base_endpoint: base.map(str::to_string),
        }
    }

    fn ctx_with_path(path: &str) -> Context {
        let mut ctx = Context::new("Op", ());
        ctx.begin_attempt(1, 1);
        ctx.request_mut().unwrap().url = path.to_string();
        ctx
    }

    #[test]
    fn test_default_endpoint() {
        let endpoint = DefaultEndpointResolver
            .resolve(&params("us-west-2", None))
            .unwrap();
        assert_eq!(endpoint.url, "https://api.ecr.us-west-2.amazonaws.com");
    }

    #[test]
    fn test_china_partition() {
        let endpoint = DefaultEndpointResolver
            .resolve(&params("cn-north-1", None))
            .unwrap();
        assert_eq!(endpoint.url, "https://api.ecr.cn-north-1.amazonaws.com.cn");
    }

    #[test]
    fn test_base_endpoint_wins() {
        let endpoint = DefaultEndpointResolver
            .resolve(&params("us-west-2", Some("http://localhost:4566/")))
            .unwrap();
        assert_eq!(endpoint.url, "http://localhost:4566");
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            DefaultEndpointResolver.resolve(&params("", None)),
            Err(ExecutionError::Endpoint { .. })
        ));
        assert!(matches!(
            DefaultEndpointResolver.resolve(&params("us east", None)),
            Err(ExecutionError::Endpoint { .. })
        ));
        assert!(matches!(
            DefaultEndpointResolver.resolve(&params("us-east-1", Some("localhost:4566"))),
            Err(ExecutionError::Endpoint { .. })
        ));
    }

    #[test]
    fn test_resolve_step_joins_path() {
        let step = ResolveEndpoint::new(
            Arc::new(StaticEndpointResolver::new("https://ecr.example.com/")),
            params("us-east-1", None),
        );
        let mut ctx = ctx_with_path("/");
        step.handle(&mut ctx).unwrap();
        assert_eq!(ctx.request().unwrap().url, "https://ecr.example.com/");

        let mut ctx = ctx_with_path("");
        step.handle(&mut ctx).unwrap();
        assert_eq!(ctx.request().unwrap().url, "https://ecr.example.com/");
    }

    #[test]
    fn test_disable_https() {
        let mut ctx = ctx_with_path("https://api.ecr.us-east-1.amazonaws.com/");
        DisableHttps.handle(&mut ctx).unwrap();
        assert_eq!(
            ctx.request().unwrap().url,
            "http://api.ecr.us-east-1.amazonaws.com/"
        );
    }

    #[test]
    fn test_disable_https_only_when_enabled() {
        let mut options = Options::new("us-east-1", Arc::new(MockTransport::new(vec![])));
        let mut stack = Stack::new("Op");
        add_disable_https(&mut stack, &options).unwrap();
        assert!(stack.serialize.is_empty());

        options.endpoint_options.disable_https = true;
        add_disable_https(&mut stack, &options).unwrap();
        assert!(stack.serialize.contains("DisableHTTPS"));
    }
}
