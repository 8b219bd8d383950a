use crate::message::Operation;

/// Errors that can occur in RPC operations.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Envelope-level error.
    #[error("envelope error: {0}")]
    Envelope(#[from] filewire_envelope::EnvelopeError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] filewire_transport::TransportError),

    /// The operation code is not Request, Response, or Notification.
    #[error("unknown operation code {0:#04x}")]
    UnknownOperation(u8),

    /// No handler registered for the (operation, method) pair.
    #[error("no {operation} handler registered for method {method}")]
    UnhandledMethod { operation: Operation, method: u8 },

    /// The payload is too short for its operation.
    #[error("truncated message ({actual} bytes, need at least {expected})")]
    TruncatedMessage { expected: usize, actual: usize },

    /// A pending request with this correlation id already exists.
    #[error("request {0} is already pending")]
    AlreadyPending(u32),

    /// The pending-request token was already consumed or swept.
    #[error("stale token for request {0}")]
    StaleToken(u32),

    /// No router factory registered under this name.
    #[error("unknown router {0:?}")]
    UnknownRouter(String),

    /// A blocking receive did not complete in time.
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl RpcError {
    /// Whether this error must tear the connection down.
    ///
    /// Framing, classification, and transport failures poison the stream:
    /// the declared lengths can no longer be trusted, so there is no
    /// resynchronization. Pending-request misuse is a handler-level logic
    /// error and leaves the connection intact.
    pub fn is_connection_fatal(&self) -> bool {
        match self {
            RpcError::Envelope(_)
            | RpcError::Transport(_)
            | RpcError::UnknownOperation(_)
            | RpcError::UnhandledMethod { .. }
            | RpcError::TruncatedMessage { .. } => true,
            RpcError::AlreadyPending(_)
            | RpcError::StaleToken(_)
            | RpcError::UnknownRouter(_)
            | RpcError::Timeout(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
