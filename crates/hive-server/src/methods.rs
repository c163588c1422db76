//! Method dispatch: registry, handler trait, and shared request context.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::Value;
use tracing::{debug, warn};

use hive_auth::TokenSigner;
use hive_core::Identity;
use hive_store::{Database, TaskRepo, UserRepo};

use crate::broadcast::EventBroadcaster;
use crate::chat::ChatRelay;
use crate::connection::{ClientHandle, ClientId};
use crate::error::RpcError;
use crate::rpc::{RpcRequest, RpcResponse};
use crate::sessions::SessionRegistry;

/// Calls slower than this are logged for investigation.
const SLOW_CALL_THRESHOLD: Duration = Duration::from_secs(5);

/// The connection a request arrived on.
#[derive(Clone)]
pub struct Caller {
    pub client_id: ClientId,
    /// Outbound queue of the connection, for handlers that open sessions.
    pub handle: ClientHandle,
    /// Identity proven at connect time via the `Authorization` header.
    pub identity: Option<Identity>,
}

/// Shared services every handler works against.
pub struct RpcContext {
    pub users: UserRepo,
    pub tasks: TaskRepo,
    pub signer: TokenSigner,
    pub sessions: Arc<SessionRegistry>,
    pub broadcaster: EventBroadcaster,
    pub chat: ChatRelay,
}

impl RpcContext {
    pub fn new(db: Database, token_secret: &SecretString) -> Self {
        let sessions = Arc::new(SessionRegistry::new());
        Self {
            users: UserRepo::new(db.clone()),
            tasks: TaskRepo::new(db),
            signer: TokenSigner::new(token_secret),
            broadcaster: EventBroadcaster::new(sessions.clone()),
            chat: ChatRelay::new(sessions.clone()),
            sessions,
        }
    }
}

/// One RPC method implementation.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    async fn handle(
        &self,
        params: Option<Value>,
        caller: &Caller,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError>;
}

/// Maps method names to handlers and runs them under a call timeout.
pub struct MethodRegistry {
    handlers: HashMap<String, Arc<dyn MethodHandler>>,
    call_timeout: Duration,
}

impl MethodRegistry {
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            handlers: HashMap::new(),
            call_timeout,
        }
    }

    /// Register a handler. Re-registering a name replaces the handler.
    pub fn register(&mut self, method: impl Into<String>, handler: Arc<dyn MethodHandler>) {
        let _ = self.handlers.insert(method.into(), handler);
    }

    pub fn method_count(&self) -> usize {
        self.handlers.len()
    }

    /// Dispatch one request.
    ///
    /// Requests without an `id` are notifications: the handler still runs,
    /// but no response frame is produced, success or not.
    pub async fn dispatch(
        &self,
        request: RpcRequest,
        caller: &Caller,
        ctx: &RpcContext,
    ) -> Option<RpcResponse> {
        let RpcRequest { id, method, params } = request;

        let Some(handler) = self.handlers.get(&method) else {
            warn!(%method, "unknown rpc method");
            return id.map(|id| {
                RpcResponse::error(
                    id,
                    crate::error::METHOD_NOT_FOUND,
                    format!("Unknown method '{method}'"),
                )
            });
        };

        debug!(%method, notification = id.is_none(), "dispatching rpc");
        let started = std::time::Instant::now();
        let outcome = tokio::time::timeout(
            self.call_timeout,
            handler.handle(params, caller, ctx),
        )
        .await;
        let elapsed = started.elapsed();
        if elapsed >= SLOW_CALL_THRESHOLD {
            warn!(%method, ?elapsed, "slow rpc call");
        }

        let result = match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!(%method, timeout = ?self.call_timeout, "rpc call timed out");
                Err(RpcError::Internal(format!(
                    "Handler for '{method}' timed out"
                )))
            }
        };

        match (id, result) {
            (Some(id), Ok(value)) => Some(RpcResponse::success(id, value)),
            (Some(id), Err(error)) => {
                debug!(%method, code = error.code(), %error, "rpc call failed");
                Some(RpcResponse::failure(id, &error))
            }
            (None, Ok(_)) => None,
            (None, Err(error)) => {
                debug!(%method, code = error.code(), %error, "notification failed");
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use tokio::sync::mpsc;

    use super::*;

    pub(crate) fn context() -> RpcContext {
        let db = Database::in_memory().expect("in-memory database");
        RpcContext::new(db, &SecretString::from("test-secret"))
    }

    pub(crate) fn caller() -> (Caller, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(64);
        let caller = Caller {
            client_id: ClientId::new(),
            handle: ClientHandle::new(tx),
            identity: None,
        };
        (caller, rx)
    }
}
