//! shelfserve
//!
//! Serves a directory tree over HTTP(S), with EPUB books browsable as a
//! table of contents and reader.

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shelfserve::config;

fn main() -> Result<()> {
    let cli = config::parse_cli();

    if let Some(password) = cli.hash_password {
        let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST).context("Failed to hash password")?;
        println!("{}", hash);
        return Ok(());
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shelfserve=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::get_config(cli)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    runtime.block_on(shelfserve::serve(config))
}
