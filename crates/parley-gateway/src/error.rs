use thiserror::Error;

/// Failures inside the gateway. None of these are ever sent to a client.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Handshake token missing, unverifiable, or expired. The channel stays open, anonymous.
    #[error("invalid token")]
    InvalidToken,

    /// Inbound payload undecodable or missing required fields. Dropped.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// An anonymous channel tried to send a message.
    #[error("sender has no verified identity")]
    AnonymousSender,

    /// The message record could not be created. Delivery is aborted.
    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("file write failed: {0}")]
    Io(#[from] std::io::Error),

    /// No pong arrived within the heartbeat deadline.
    #[error("liveness timeout")]
    LivenessTimeout,
}

impl GatewayError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload(reason.into())
    }
}
