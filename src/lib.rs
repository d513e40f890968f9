//! shelfserve
//!
//! A self-hosted content server for a directory tree. Directories are
//! listed, files are served with a guessed content type and byte ranges,
//! and EPUB books are exposed as a browsable table of contents and reader.
//!
//! # Modules
//!
//! - `epub`: archive access, package and navigation parsing, book cache
//! - `stream`: byte-range responses
//! - `routes`: HTTP handlers

pub mod auth;
pub mod config;
pub mod epub;
pub mod error;
pub mod html;
pub mod jail;
pub mod mime;
pub mod routes;
pub mod state;
pub mod stream;

use std::time::Duration;

use anyhow::{Context, Result};
use axum::{middleware, Router};
use tokio::signal;
use tower_http::trace::TraceLayer;

use config::Config;
use state::AppState;

/// How long open connections get to finish after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Build the application router for `state`
pub fn app(state: AppState) -> Router {
    let mut router = routes::router();
    if let Some(auth) = state.auth() {
        router = router.layer(middleware::from_fn_with_state(
            auth.clone(),
            auth::require_auth,
        ));
    }
    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Serve `config` until Ctrl+C or SIGTERM
pub async fn serve(config: Config) -> Result<()> {
    let state = AppState::new(&config)?;
    tracing::info!(
        root = %state.root_dir().display(),
        auth = state.auth().is_some(),
        tls = config.tls.is_some(),
        "Starting shelfserve v{}",
        env!("CARGO_PKG_VERSION")
    );
    let app = app(state);
    let bind_addr = config.bind_addr();

    match &config.tls {
        Some(tls) => {
            let rustls = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                &tls.cert_path,
                &tls.key_path,
            )
            .await
            .context("Failed to load TLS certificate or key")?;
            let addr = tokio::net::lookup_host(&bind_addr)
                .await
                .with_context(|| format!("Failed to resolve {}", bind_addr))?
                .next()
                .with_context(|| format!("No address for {}", bind_addr))?;

            let handle = axum_server::Handle::new();
            let shutdown = handle.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                shutdown.graceful_shutdown(Some(SHUTDOWN_GRACE));
            });

            tracing::info!("shelfserve listening on https://{}", addr);
            axum_server::bind_rustls(addr, rustls)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .context("Server error")?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(&bind_addr)
                .await
                .with_context(|| format!("Failed to bind {}", bind_addr))?;
            tracing::info!("shelfserve listening on http://{}", listener.local_addr()?);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("Server error")?;
        }
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
