//! Common test utilities for driving the router with mocks.
//!
//! The fixture wires the real router to an orchestrator whose fetcher,
//! pipeline and provisioning backend are mocks, so requests run the full
//! swap flow without network access or a GPU.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use faceswap_core::testing::{MockDependencyBackend, MockFetcher, MockPipeline};
use faceswap_core::{Config, OrchestratorConfig, WorkspaceConfig};

/// Re-export fixtures for test convenience
pub use faceswap_core::testing::fixtures;

/// Test fixture with a router over mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_swap() {
///     let fixture = TestFixture::new();
///     let response = fixture.post("/api/v1/swap", json!({
///         "source_url": fixtures::drive_url(fixtures::SOURCE_DRIVE_ID),
///         "target_url": fixtures::drive_url(fixtures::TARGET_DRIVE_ID),
///     })).await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock provisioning backend - control presence and install failures
    pub backend: Arc<MockDependencyBackend>,
    /// Mock fetcher - fail specific URLs
    pub fetcher: Arc<MockFetcher>,
    /// Mock pipeline - fail or delay runs
    pub pipeline: Arc<MockPipeline>,
    /// Workspace root
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    /// Create a new test fixture with default settings.
    pub fn new() -> Self {
        Self::with_orchestrator_config(OrchestratorConfig::default())
    }

    /// Create a test fixture with custom orchestrator settings.
    pub fn with_orchestrator_config(orchestrator_config: OrchestratorConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let workspace_config = WorkspaceConfig::with_root(temp_dir.path());

        let stack = fixtures::mock_stack_with(workspace_config.clone(), orchestrator_config.clone());

        let config = Config {
            workspace: workspace_config,
            orchestrator: orchestrator_config,
            ..Default::default()
        };

        let state = Arc::new(faceswap_server::AppState::new(
            config,
            Arc::new(stack.orchestrator),
        ));
        let router = faceswap_server::create_router(state);

        Self {
            router,
            backend: stack.backend,
            fetcher: stack.fetcher,
            pipeline: stack.pipeline,
            temp_dir,
        }
    }

    /// A JSON swap body with valid Drive links.
    pub fn swap_body() -> Value {
        serde_json::json!({
            "source_url": fixtures::drive_url(fixtures::SOURCE_DRIVE_ID),
            "target_url": fixtures::drive_url(fixtures::TARGET_DRIVE_ID),
        })
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Request::builder().method("GET").uri(path), Body::empty())
            .await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.send(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("Content-Type", "application/json"),
            Body::from(serde_json::to_vec(&body).unwrap()),
        )
        .await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.send(Request::builder().method("POST").uri(path), Body::empty())
            .await
    }

    /// Send a POST request with a form-encoded body.
    pub async fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        self.send(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("Content-Type", "application/x-www-form-urlencoded"),
            Body::from(body),
        )
        .await
    }

    async fn send(&self, builder: axum::http::request::Builder, body: Body) -> TestResponse {
        let request = builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}
