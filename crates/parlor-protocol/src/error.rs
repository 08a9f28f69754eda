//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire events.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed — malformed bytes, missing fields, or an
    /// unknown event type.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but violates protocol rules.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl ProtocolError {
    /// Stable machine-readable code, surfaced to clients in `error` events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Encode(_) => "ENCODE_FAILED",
            Self::Decode(_) => "INVALID_MESSAGE",
            Self::InvalidMessage(_) => "INVALID_MESSAGE",
        }
    }
}
