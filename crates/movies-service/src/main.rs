//! Movies API
//!
//! Entry point for the movies service binary.

use movies_service::config::Config;
use movies_service::observability::metrics::init_metrics_recorder;
use movies_service::repositories::Store;
use movies_service::routes::{self, AppState};
use movies_service::middleware::ClientRateLimiter;
use movies_service::services::{LogMailer, Mailer, SmtpMailer, StoreGrantSource};
use movies_service::tasks::{
    start_limiter_prune, start_token_cleanup, QuiesceOutcome, TaskSupervisor,
    LIMITER_PRUNE_INTERVAL,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "movies_service=debug,movies_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Movies API");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        environment = config.environment.as_str(),
        bind_address = %config.bind_address,
        bcrypt_cost = config.bcrypt_cost,
        store_deadline_seconds = config.store_deadline_seconds,
        smtp_configured = config.smtp.is_some(),
        limiter_enabled = config.limiter.enabled,
        "Configuration loaded successfully"
    );

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp).map_err(|e| {
            error!("Failed to configure SMTP mailer: {}", e);
            e
        })?),
        None => {
            warn!("No SMTP relay configured, activation emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    // Metrics recorder must be installed before anything records
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    // Initialize database connection pool with server-side statement timeout
    info!("Connecting to database...");
    let db_url_with_timeout =
        add_query_timeout(&config.database_url, config.store_deadline_seconds);
    let db_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&db_url_with_timeout)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            e
        })?;

    info!("Database connection established");

    let store = Store::new(
        db_pool,
        Duration::from_secs(config.store_deadline_seconds),
    );
    let supervisor = TaskSupervisor::new();

    // Start expired-token cleanup
    let cleanup_cancel = CancellationToken::new();
    let cleanup_handle = tokio::spawn(start_token_cleanup(
        store.clone(),
        config.token_cleanup_interval_seconds,
        cleanup_cancel.clone(),
    ));

    let rate_limiter = ClientRateLimiter::from_config(&config.limiter);
    let prune_handle = rate_limiter.clone().map(|limiter| {
        tokio::spawn(start_limiter_prune(
            limiter,
            LIMITER_PRUNE_INTERVAL,
            cleanup_cancel.clone(),
        ))
    });

    let bind_address = config.bind_address.clone();
    let shutdown_deadline = Duration::from_secs(config.shutdown_deadline_seconds);

    let state = Arc::new(AppState {
        store: store.clone(),
        config,
        mailer,
        supervisor: supervisor.clone(),
        grants: Arc::new(StoreGrantSource::new(store)),
        rate_limiter,
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Movies API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("HTTP server stopped, draining background work");

    cleanup_cancel.cancel();
    if let Err(e) = cleanup_handle.await {
        warn!("Token cleanup task did not stop cleanly: {}", e);
    }
    if let Some(handle) = prune_handle {
        if let Err(e) = handle.await {
            warn!("Limiter prune task did not stop cleanly: {}", e);
        }
    }

    match supervisor.quiesce(shutdown_deadline).await {
        QuiesceOutcome::Drained => info!("Background tasks drained"),
        QuiesceOutcome::TimedOut { remaining } => warn!(
            remaining = remaining,
            "Shutdown deadline elapsed with background tasks still running"
        ),
    }

    info!("Movies API shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Adds statement_timeout to the database URL.
fn add_query_timeout(url: &str, timeout_secs: u64) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}options=-c%20statement_timeout%3D{}s",
        url, separator, timeout_secs
    )
}
