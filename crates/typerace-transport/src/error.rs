use std::time::Duration;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// No frame arrived within the connection's idle timeout.
    #[error("no inbound traffic for {0:?}")]
    Timeout(Duration),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The peer connected but did not complete the protocol handshake.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}
