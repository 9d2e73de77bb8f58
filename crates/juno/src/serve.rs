//! HTTP service runner.

use std::sync::Arc;

use miette::Result;
use tracing::info;

use juno_service::{AppState, ProgramRegistry, ServiceConfig, create_router};

/// Load rules, bind, and serve until Ctrl-C.
pub async fn run(config: ServiceConfig) -> Result<()> {
    let registry = match &config.rules_dir {
        Some(dir) => ProgramRegistry::load(dir).map_err(|e| miette::miette!("{}", e))?,
        None => ProgramRegistry::empty(),
    };
    let rules = registry.info();
    info!(
        count = rules.count,
        hash = %rules.hash,
        files = rules.files.len(),
        version = %config.version,
        "program ready"
    );

    let port = config.port;
    let state = Arc::new(AppState::new(Arc::new(registry), config));
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .map_err(|e| miette::miette!("{}", e))?;

    info!("juno listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| miette::miette!("{}", e))?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    info!("received shutdown signal");
}
