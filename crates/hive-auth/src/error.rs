#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("token signing failed: {0}")]
    Sign(String),

    /// Stored credential material that cannot be decoded.
    #[error("credential decode failed: {0}")]
    Decode(String),
}
