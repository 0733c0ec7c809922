//! Test server harness for E2E testing
//!
//! Provides `TestGatewayServer` for spawning real gateway instances in tests.

use gateway_service::config::Config;
use gateway_service::dispatcher::Dispatcher;
use gateway_service::observability::metrics::init_metrics_recorder;
use gateway_service::routes::{self, AppState};
use gateway_service::store::{MemoryStore, OwnerStore};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Shared metrics handle for all servers in the test process.
///
/// The global recorder can only be installed once per process; if another
/// test already installed one, a standalone recorder is used instead.
fn metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Test harness for spawning the gateway in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_flow_e2e() -> anyhow::Result<()> {
///     let server = TestGatewayServer::spawn(fixtures::seeded_store()).await?;
///
///     let response = reqwest::get(format!("{}/mcp/health", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestGatewayServer {
    addr: SocketAddr,
    config: Config,
    dispatcher: Arc<Dispatcher<OwnerStore>>,
    _handle: JoinHandle<()>,
}

impl TestGatewayServer {
    /// Spawn a server whose owner context holds `store`.
    ///
    /// # Returns
    /// * `Ok(TestGatewayServer)` - Running server instance
    /// * `Err(anyhow::Error)` - If server spawn fails
    pub async fn spawn(store: MemoryStore) -> Result<Self, anyhow::Error> {
        Self::spawn_with(Some(store), HashMap::new()).await
    }

    /// Spawn a server with no owner bound. Owner-bound endpoints return 503.
    pub async fn spawn_unbound() -> Result<Self, anyhow::Error> {
        Self::spawn_with(None, HashMap::new()).await
    }

    /// Spawn a server with extra `GATEWAY_*` variables applied on top of the
    /// test defaults.
    pub async fn spawn_with(
        store: Option<MemoryStore>,
        overrides: HashMap<String, String>,
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("GATEWAY_BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            (
                "GATEWAY_PROVIDER_ID".to_string(),
                "OwnerGateway/test".to_string(),
            ),
            ("GATEWAY_DISPATCH_TIMEOUT_SECONDS".to_string(), "5".to_string()),
        ]);
        vars.extend(overrides);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let dispatcher = Arc::new(Dispatcher::<OwnerStore>::new(
            "test-owner",
            config.dispatch_queue_capacity,
        ));
        if let Some(store) = store {
            dispatcher
                .bind(move || Box::new(store) as OwnerStore)
                .map_err(|e| anyhow::anyhow!("Failed to bind owner: {}", e))?;
        }

        let state = Arc::new(
            AppState::new(config.clone(), Arc::clone(&dispatcher))
                .map_err(|e| anyhow::anyhow!("Failed to create state: {}", e))?,
        );

        // Build routes using gateway-service's real route builder
        let app = routes::build_routes(state, metrics_handle());

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        // Spawn server in background
        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            dispatcher,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The dispatcher the server submits to, for lifecycle tests.
    pub fn dispatcher(&self) -> &Arc<Dispatcher<OwnerStore>> {
        &self.dispatcher
    }

    /// POST a JSON body to `path` and return the status and parsed body.
    pub async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<(u16, serde_json::Value), anyhow::Error> {
        let response = reqwest::Client::new()
            .post(format!("{}{}", self.url(), path))
            .json(body)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.json().await?;
        Ok((status, body))
    }
}

impl Drop for TestGatewayServer {
    fn drop(&mut self) {
        // Explicitly abort the HTTP server task to ensure immediate cleanup
        // when the test completes.
        self._handle.abort();
    }
}
