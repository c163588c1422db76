//! RPC error taxonomy and the mapping from lower layers onto it.

use hive_auth::AuthError;
use hive_store::StoreError;

use crate::rpc::RpcErrorBody;

// ── Error code constants ────────────────────────────────────────────

/// Missing or malformed parameters.
pub const INVALID_ARGUMENT: &str = "INVALID_ARGUMENT";
/// Missing, invalid, or expired credential.
pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
/// Task or user absent, or not owned by the caller.
pub const NOT_FOUND: &str = "NOT_FOUND";
/// Duplicate registration.
pub const ALREADY_EXISTS: &str = "ALREADY_EXISTS";
/// Wrong password.
pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
/// Store failure or unexpected fault.
pub const INTERNAL: &str = "INTERNAL";
/// Method not in the registry.
pub const METHOD_NOT_FOUND: &str = "METHOD_NOT_FOUND";
/// Frame was not a parseable request.
pub const PARSE_ERROR: &str = "PARSE_ERROR";

/// Error returned by RPC method handlers.
///
/// Each variant maps to exactly one wire code; nested failures are
/// translated at the boundary and never reported as a different kind.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    AlreadyExists(String),
    #[error("{0}")]
    PermissionDenied(String),
    #[error("{0}")]
    Internal(String),
}

impl RpcError {
    /// Machine-readable wire code for this variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => INVALID_ARGUMENT,
            Self::Unauthenticated(_) => UNAUTHENTICATED,
            Self::NotFound(_) => NOT_FOUND,
            Self::AlreadyExists(_) => ALREADY_EXISTS,
            Self::PermissionDenied(_) => PERMISSION_DENIED,
            Self::Internal(_) => INTERNAL,
        }
    }

    /// Convert to the wire-format error body.
    pub fn to_error_body(&self) -> RpcErrorBody {
        RpcErrorBody {
            code: self.code().to_owned(),
            message: self.to_string(),
            details: None,
        }
    }
}

impl From<StoreError> for RpcError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => Self::NotFound(msg),
            StoreError::Conflict(msg) => Self::AlreadyExists(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for RpcError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidToken(msg) => Self::Unauthenticated(format!("Invalid credential: {msg}")),
            other => Self::Internal(other.to_string()),
        }
    }
}
