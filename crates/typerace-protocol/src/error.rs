//! Error types for the protocol layer.

/// Errors that can occur in the protocol layer.
///
/// A decode error is never fatal to a session: the handler logs it and
/// drops that one message.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, a missing `type` tag, or a field
    /// with the wrong type (e.g. a negative `currentIndex`).
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
