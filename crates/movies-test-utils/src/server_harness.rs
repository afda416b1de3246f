//! Test server harness for E2E testing
//!
//! Provides `TestMoviesServer` for spawning real movies API instances in tests.

use metrics_exporter_prometheus::PrometheusBuilder;
use movies_service::config::Config;
use movies_service::middleware::ClientRateLimiter;
use movies_service::observability::metrics::init_metrics_recorder;
use movies_service::repositories::Store;
use movies_service::routes::{self, AppState};
use movies_service::services::mailer::mock::RecordingMailer;
use movies_service::services::{Mailer, StoreGrantSource};
use movies_service::tasks::TaskSupervisor;
use sqlx::PgPool;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Test harness for spawning the movies API in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[sqlx::test(migrations = "../../migrations")]
/// async fn test_register_e2e(pool: PgPool) -> Result<()> {
///     let server = TestMoviesServer::spawn(pool).await?;
///     let response = server
///         .client()
///         .post(format!("{}/v1/users", server.url()))
///         .json(&serde_json::json!({"name": "Ann", "email": "ann@example.com", "password": "pa55word1"}))
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 201);
///     assert!(server.mailer().unwrap().activation_token_for("ann@example.com").is_some());
///     Ok(())
/// }
/// ```
pub struct TestMoviesServer {
    addr: SocketAddr,
    pool: PgPool,
    config: Config,
    supervisor: TaskSupervisor,
    recording_mailer: Option<Arc<RecordingMailer>>,
    client: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestMoviesServer {
    /// Spawn a server whose mailer records every activation token.
    pub async fn spawn(pool: PgPool) -> Result<Self, anyhow::Error> {
        let mailer = Arc::new(RecordingMailer::new());
        let mut server = Self::spawn_with_mailer(pool, mailer.clone()).await?;
        server.recording_mailer = Some(mailer);
        Ok(server)
    }

    /// Spawn a server with the given mailer.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Hash passwords at the minimum bcrypt cost
    /// - Run without rate limiting, since every test client shares 127.0.0.1
    /// - Start the HTTP server in the background
    pub async fn spawn_with_mailer(
        pool: PgPool,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(pool, mailer, &[("LIMITER_ENABLED", "false")]).await
    }

    /// Spawn a server that rate limits clients at `rps` with `burst`.
    pub async fn spawn_with_rate_limit(
        pool: PgPool,
        rps: u32,
        burst: u32,
    ) -> Result<Self, anyhow::Error> {
        let mailer = Arc::new(RecordingMailer::new());
        let rps = rps.to_string();
        let burst = burst.to_string();
        let mut server = Self::spawn_with_vars(
            pool,
            mailer.clone(),
            &[
                ("LIMITER_ENABLED", "true"),
                ("LIMITER_RPS", rps.as_str()),
                ("LIMITER_BURST", burst.as_str()),
            ],
        )
        .await?;
        server.recording_mailer = Some(mailer);
        Ok(server)
    }

    async fn spawn_with_vars(
        pool: PgPool,
        mailer: Arc<dyn Mailer>,
        extra_vars: &[(&str, &str)],
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            (
                "DATABASE_URL".to_string(),
                "postgresql://test/test".to_string(),
            ),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("BCRYPT_COST".to_string(), "10".to_string()),
        ]);
        for (name, value) in extra_vars {
            vars.insert(name.to_string(), value.to_string());
        }

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let store = Store::new(
            pool.clone(),
            Duration::from_secs(config.store_deadline_seconds),
        );
        let supervisor = TaskSupervisor::new();

        let state = Arc::new(AppState {
            store: store.clone(),
            config: config.clone(),
            mailer,
            supervisor: supervisor.clone(),
            grants: Arc::new(StoreGrantSource::new(store)),
            rate_limiter: ClientRateLimiter::from_config(&config.limiter),
        });

        // The global recorder can only be installed once per test process
        let metrics_handle = match init_metrics_recorder() {
            Ok(handle) => handle,
            Err(_) => PrometheusBuilder::new().build_recorder().handle(),
        };

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            pool,
            config,
            supervisor,
            recording_mailer: None,
            client: reqwest::Client::new(),
            _handle: handle,
        })
    }

    /// Get reference to the database pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared HTTP client
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// The server's background task supervisor
    pub fn supervisor(&self) -> &TaskSupervisor {
        &self.supervisor
    }

    /// The recording mailer, when spawned with [`TestMoviesServer::spawn`]
    pub fn mailer(&self) -> Option<&RecordingMailer> {
        self.recording_mailer.as_deref()
    }
}

impl Drop for TestMoviesServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
