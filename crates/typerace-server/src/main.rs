//! Typerace server binary.
//!
//! Configuration comes from `TYPERACE_*` environment variables, log
//! filtering from `RUST_LOG` (default `info`).

use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use typerace::prelude::*;

#[tokio::main]
async fn main() -> Result<(), TyperaceError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(
        bind = %config.bind_addr,
        sentences = config.room.sentences.len(),
        outbox_capacity = config.room.outbox_capacity,
        "starting typerace"
    );

    let registry = Arc::new(RoomRegistry::new(config.room.clone()));
    let server = TyperaceServer::builder()
        .config(config)
        .build(registry)
        .await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("server stopped");
    Ok(())
}
