use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use serde_json::{Value, json};

use ecrscan::pipeline::{ErrorFault, ExecutionError};
use ecrscan::{
    CancellationToken, Client, ClientConfig, ImageScanningConfiguration,
    PutImageScanningConfigurationInput, RetryConfig,
};

const TARGET: &str = "AmazonEC2ContainerRegistry_V20150921.PutImageScanningConfiguration";

#[derive(Clone, Default)]
struct Registry {
    hits: Arc<AtomicUsize>,
    fail_first: usize,
}

async fn handle(State(registry): State<Registry>, headers: HeaderMap, body: Bytes) -> Response {
    let hit = registry.hits.fetch_add(1, Ordering::SeqCst) + 1;
    let request_id = format!("req-{hit}");

    let target = headers
        .get("x-amz-target")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if target != TARGET || content_type != "application/x-amz-json-1.1" {
        return (
            StatusCode::BAD_REQUEST,
            [("x-amzn-errortype", "UnknownOperationException")],
            "{}",
        )
            .into_response();
    }

    if hit <= registry.fail_first {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("x-amzn-requestid", request_id)],
            r#"{"__type": "ServerException", "message": "try again"}"#,
        )
            .into_response();
    }

    let input: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let repository = input["repositoryName"].as_str().unwrap_or_default().to_string();
    if repository == "missing" {
        return (
            StatusCode::BAD_REQUEST,
            [
                ("x-amzn-requestid", request_id),
                (
                    "x-amzn-errortype",
                    "RepositoryNotFoundException:http://internal.amazon.com/coral/com.amazonaws.ecr/"
                        .to_string(),
                ),
            ],
            r#"{"message": "The repository with name 'missing' does not exist"}"#,
        )
            .into_response();
    }

    let registry_id = input
        .get("registryId")
        .cloned()
        .unwrap_or_else(|| json!("123456789012"));
    (
        StatusCode::OK,
        [("x-amzn-requestid", request_id)],
        Json(json!({
            "imageScanningConfiguration": input["imageScanningConfiguration"],
            "registryId": registry_id,
            "repositoryName": repository,
        })),
    )
        .into_response()
}

async fn serve(registry: Registry) -> SocketAddr {
    let app = Router::new().route("/", post(handle)).with_state(registry);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client_for(addr: SocketAddr) -> Client {
    let config = ClientConfig {
        region: "us-east-1".to_string(),
        base_endpoint: Some(format!("http://{addr}")),
        retry: RetryConfig {
            initial_backoff_ms: 1,
            max_backoff_ms: 10,
            ..RetryConfig::default()
        },
        timeout_secs: Some(5),
        ..ClientConfig::default()
    };
    Client::from_config(&config).unwrap()
}

fn input(repository: &str) -> PutImageScanningConfigurationInput {
    PutImageScanningConfigurationInput::new(repository, ImageScanningConfiguration::new(true))
}

#[tokio::test]
async fn test_roundtrip_success() {
    let registry = Registry::default();
    let addr = serve(registry.clone()).await;

    let output = client_for(addr)
        .put_image_scanning_configuration(
            &CancellationToken::new(),
            input("web").with_registry_id("210987654321"),
            &[],
        )
        .await
        .unwrap();

    assert_eq!(output.repository_name.as_deref(), Some("web"));
    assert_eq!(output.registry_id.as_deref(), Some("210987654321"));
    assert_eq!(
        output.image_scanning_configuration,
        Some(ImageScanningConfiguration::new(true))
    );
    assert_eq!(output.result_metadata.request_id(), Some("req-1"));
    assert_eq!(output.result_metadata.http_status(), Some(200));
    assert_eq!(registry.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_roundtrip_service_error() {
    let registry = Registry::default();
    let addr = serve(registry.clone()).await;

    let err = client_for(addr)
        .put_image_scanning_configuration(&CancellationToken::new(), input("missing"), &[])
        .await
        .unwrap_err();

    assert_eq!(registry.hits.load(Ordering::SeqCst), 1);
    assert_eq!(err.http_status(), Some(400));
    assert_eq!(err.request_id(), Some("req-1"));
    let service = err.service_error().unwrap();
    assert_eq!(service.code, "RepositoryNotFoundException");
    assert_eq!(service.fault, ErrorFault::Client);
    assert_eq!(
        service.message.as_deref(),
        Some("The repository with name 'missing' does not exist")
    );
    assert!(err.to_string().starts_with(
        "operation error ECR: PutImageScanningConfiguration, https response error StatusCode: 400, RequestID: req-1,"
    ));
}

#[tokio::test]
async fn test_roundtrip_retries_server_errors() {
    let registry = Registry {
        fail_first: 2,
        ..Registry::default()
    };
    let addr = serve(registry.clone()).await;

    let output = client_for(addr)
        .put_image_scanning_configuration(&CancellationToken::new(), input("web"), &[])
        .await
        .unwrap();

    assert_eq!(registry.hits.load(Ordering::SeqCst), 3);
    assert_eq!(output.result_metadata.attempts(), Some(3));
    assert_eq!(output.result_metadata.request_id(), Some("req-3"));
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client_for(addr)
        .put_image_scanning_configuration(&CancellationToken::new(), input("web"), &[])
        .await
        .unwrap_err();

    assert!(matches!(err.kind(), ExecutionError::Transport(_)));
    assert_eq!(err.http_status(), None);
}
