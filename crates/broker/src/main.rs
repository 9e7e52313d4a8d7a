use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use maple_backend::{ArticleStore, HttpLlmBackend, MapleApi};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use maple_broker::broker::Broker;
use maple_broker::config::BrokerConfig;
use maple_broker::executor::JobExecutor;
use maple_broker::state::AppState;
use maple_broker::sweep::SummarySweep;
use maple_broker::{routes, ws};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "maple_broker=debug,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = BrokerConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid broker configuration");
        std::process::exit(1);
    });
    tracing::info!(host = %config.host, port = %config.port, "Loaded broker configuration");
    if config.socket_key.is_none() {
        tracing::warn!("MAPLE_CHAT_SOCKET_KEY is not set, accepting unauthenticated sessions");
    }

    // --- Collaborators ---
    let store: Arc<dyn ArticleStore> = Arc::new(MapleApi::new(&config.backend_url));
    let llm = Arc::new(HttpLlmBackend::new(
        config.llm_api_url.clone(),
        config.llm_model.clone(),
    ));
    let broker = Arc::new(Broker::new(JobExecutor::new(llm, Arc::clone(&store))));

    // --- Background tasks ---
    let cancel = CancellationToken::new();
    let scheduler_handle = broker.start(cancel.child_token());
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(broker.sessions()), cancel.child_token());

    let sweep_handle = match (&config.llm_api_key, config.sweep_enabled) {
        (Some(credential), true) => {
            let sweep = SummarySweep::new(
                Arc::clone(&store),
                Arc::clone(&broker),
                credential.clone(),
                config.sweep_page_size,
            );
            let sweep_cancel = cancel.child_token();
            Some(tokio::spawn(async move { sweep.run(sweep_cancel).await }))
        }
        _ => {
            tracing::info!("Summary sweep disabled");
            None
        }
    };

    // --- App ---
    let state = AppState {
        config: Arc::new(config.clone()),
        broker: Arc::clone(&broker),
    };
    let app = routes::build_app(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting broker");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Broker stopped accepting connections, cleaning up");

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), scheduler_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), heartbeat_handle).await;
    if let Some(handle) = sweep_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    let queued = broker.scheduler().queued();
    if queued > 0 {
        tracing::warn!(queued, "Dropping queued jobs on shutdown");
    }
    broker.sessions().shutdown_all().await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
