use std::process::ExitCode;

use adaptive_engine::config::Config;
use adaptive_engine::db::DatabaseProxy;
use adaptive_engine::logging;
use adaptive_engine::state::AppState;
use adaptive_engine::workers::WorkerManager;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = logging::init_tracing(&config.log_level);

    let db = match DatabaseProxy::from_env().await {
        Ok(db) => db,
        Err(err) => {
            tracing::error!(error = %err, "database initialization failed");
            return ExitCode::FAILURE;
        }
    };

    let state = AppState::new(config.clone(), db);
    let engine = state.engine();
    match engine.registry().load_production().await {
        Ok(Some(version)) => tracing::info!(version = %version.version, "production model loaded"),
        Ok(None) => tracing::info!("no production model yet"),
        Err(err) => tracing::warn!(error = %err, "could not load production model"),
    }

    let worker_manager = match WorkerManager::new(&config, engine, state.interactions().clone()).await {
        Ok(manager) => {
            if let Err(e) = manager.start().await {
                tracing::error!(error = %e, "failed to start workers");
            }
            Some(manager)
        }
        Err(e) => {
            tracing::warn!(error = %e, "worker manager not initialized");
            None
        }
    };

    let app = adaptive_engine::create_app(state);
    let addr = config.bind_addr();

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%addr, error = %err, "bind failed");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(%addr, "adaptive-engine listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server error");
    }

    tracing::info!("HTTP server stopped, shutting down workers");
    if let Some(manager) = worker_manager {
        manager.stop().await;
    }
    tracing::info!("graceful shutdown complete");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
