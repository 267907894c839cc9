//! `TyperaceServer` builder and accept loop.
//!
//! This is the entry point for running a Typerace server. It ties
//! together all the layers: transport → session → room registry.

use std::future::Future;
use std::sync::Arc;

use typerace_room::RoomRegistry;
use typerace_transport::{Incoming, Transport, TransportError, WebSocketTransport};

use crate::{ServerConfig, SessionHandler, TyperaceError};

/// Builder for configuring and starting a Typerace server.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use typerace::prelude::*;
///
/// # async fn start() -> Result<(), TyperaceError> {
/// let config = ServerConfig::from_env();
/// let registry = Arc::new(RoomRegistry::new(config.room.clone()));
/// let server = TyperaceServer::builder()
///     .config(config)
///     .bind("127.0.0.1:8080")
///     .build(registry)
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Default)]
pub struct TyperaceServerBuilder {
    bind_addr: Option<String>,
    config: ServerConfig,
}

impl TyperaceServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the address to bind the server to. Takes precedence over
    /// `bind_addr` in the config.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = Some(addr.to_string());
        self
    }

    /// Sets timeouts, keepalive, and the default bind address.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and returns a server that will put every
    /// player into `registry`.
    ///
    /// The registry is passed in rather than built here so callers (and
    /// tests) can inspect it while the server runs.
    pub async fn build(
        self,
        registry: Arc<RoomRegistry>,
    ) -> Result<TyperaceServer, TyperaceError> {
        let addr = self
            .bind_addr
            .unwrap_or_else(|| self.config.bind_addr.clone());
        let transport = WebSocketTransport::bind(&addr)
            .await?
            .with_idle_timeout(self.config.idle_timeout);

        Ok(TyperaceServer {
            transport,
            handler: SessionHandler::new(registry, Arc::new(self.config)),
        })
    }
}

/// A bound Typerace server.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct TyperaceServer {
    transport: WebSocketTransport,
    handler: SessionHandler,
}

impl TyperaceServer {
    /// Creates a new builder.
    pub fn builder() -> TyperaceServerBuilder {
        TyperaceServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        self.handler.registry()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), TyperaceError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves.
    ///
    /// Every accepted peer gets its own task, which runs the WebSocket
    /// handshake under `handshake_timeout` and then the session. The loop
    /// itself only waits on TCP accepts. Sessions that are already running
    /// are left to finish on their own.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), TyperaceError> {
        tracing::info!(addr = ?self.local_addr().ok(), "Typerace server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    self.transport.shutdown().await?;
                    tracing::info!("shutdown requested, no longer accepting");
                    return Ok(());
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(incoming) => {
                        tokio::spawn(serve(self.handler.clone(), incoming));
                    }
                    Err(TransportError::Shutdown) => return Ok(()),
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }
    }
}

/// One peer from TCP accept to session end.
async fn serve<I: Incoming>(handler: SessionHandler, incoming: I) {
    let limit = handler.config().handshake_timeout;
    let conn = match tokio::time::timeout(limit, incoming.upgrade()).await {
        Ok(Ok(conn)) => conn,
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "handshake failed");
            return;
        }
        Err(_) => {
            tracing::debug!(?limit, "handshake timed out, dropping peer");
            return;
        }
    };
    if let Err(e) = handler.run(conn).await {
        tracing::debug!(error = %e, "session ended with error");
    }
}
