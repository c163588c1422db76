use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no replica addresses configured")]
    NoReplicas,

    #[error("connect to {addr} failed: {reason}")]
    Connect { addr: String, reason: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out waiting for a response")]
    Timeout,

    #[error("connection closed before a response arrived")]
    ClosedEarly,

    #[error("{code}: {message}")]
    Rpc { code: String, message: String },
}
