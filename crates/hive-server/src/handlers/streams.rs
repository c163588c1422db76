//! Streaming session methods: feed/notification subscriptions and chat.
//!
//! A credential failure here opens nothing: the error response is the only
//! frame the caller ever sees for the attempt.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, instrument};

use hive_core::{ChatMessage, TaskFilter};

use crate::error::RpcError;
use crate::handlers::{authenticate, filter_from, require_params};
use crate::methods::{Caller, MethodHandler, RpcContext};
use crate::rpc::require_str;
use crate::sessions::{Partition, SessionEntry};

fn entry_for(caller: &Caller, identity: hive_core::Identity, filter: TaskFilter) -> SessionEntry {
    SessionEntry {
        client_id: caller.client_id.clone(),
        handle: caller.handle.clone(),
        identity,
        filter,
    }
}

/// `task.subscribe`: owner-scoped snapshot + live tail.
pub struct TaskSubscribeHandler;

#[async_trait]
impl MethodHandler for TaskSubscribeHandler {
    #[instrument(skip_all, fields(method = "task.subscribe"))]
    async fn handle(
        &self,
        params: Option<Value>,
        caller: &Caller,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        let identity = authenticate(params.as_ref(), caller, ctx)?;
        let filter = match &params {
            Some(params) => filter_from(params)?,
            None => TaskFilter::default(),
        };

        // Snapshot frames enter the connection queue here, ahead of the
        // response frame the dispatcher sends after this returns.
        let (session_id, drained) = ctx
            .sessions
            .open_task_feed(entry_for(caller, identity, filter), &ctx.tasks)?;
        info!(session_id = %session_id, drained, "task feed opened");
        Ok(json!({ "sessionId": session_id }))
    }
}

/// `notification.subscribe`: every mutation by any caller.
pub struct NotificationSubscribeHandler;

#[async_trait]
impl MethodHandler for NotificationSubscribeHandler {
    #[instrument(skip_all, fields(method = "notification.subscribe"))]
    async fn handle(
        &self,
        params: Option<Value>,
        caller: &Caller,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        let identity = authenticate(params.as_ref(), caller, ctx)?;
        let session_id = ctx.sessions.open(
            Partition::Notification,
            entry_for(caller, identity, TaskFilter::default()),
        );
        info!(session_id = %session_id, "notification feed opened");
        Ok(json!({ "sessionId": session_id }))
    }
}

/// `chat.join`: enter the room. Joining again from the same connection
/// refreshes the one existing session instead of opening a second.
pub struct ChatJoinHandler;

#[async_trait]
impl MethodHandler for ChatJoinHandler {
    #[instrument(skip_all, fields(method = "chat.join"))]
    async fn handle(
        &self,
        params: Option<Value>,
        caller: &Caller,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        let identity = authenticate(params.as_ref(), caller, ctx)?;
        let session_id = ctx
            .sessions
            .open_chat(entry_for(caller, identity, TaskFilter::default()));
        info!(session_id = %session_id, "chat session joined");
        Ok(json!({ "sessionId": session_id }))
    }
}

/// `chat.send`: relay one line to the room. The sender identity and the
/// timestamp are stamped server-side from the join-time session; whatever
/// the client claims about either is ignored.
pub struct ChatSendHandler;

#[async_trait]
impl MethodHandler for ChatSendHandler {
    #[instrument(skip_all, fields(method = "chat.send"))]
    async fn handle(
        &self,
        params: Option<Value>,
        caller: &Caller,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        let params = require_params(params)?;
        let message = require_str(&params, "message")?;
        if message.trim().is_empty() {
            return Err(RpcError::InvalidArgument("Message must not be empty".into()));
        }

        let (session_id, entry) = ctx
            .sessions
            .find_for_client(Partition::Chat, &caller.client_id)
            .ok_or_else(|| {
                RpcError::NotFound(
                    "No chat session on this connection; call chat.join first".into(),
                )
            })?;

        let line = ChatMessage::new(&entry.identity, message);
        let recipients = ctx.chat.relay(&session_id, &line);
        Ok(json!({ "sent": true, "recipients": recipients }))
    }
}
