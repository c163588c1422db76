//! RPC method handlers, one module per method family.

pub mod auth;
pub mod streams;
pub mod system;
pub mod tasks;

use std::sync::Arc;

use serde_json::Value;

use hive_core::{Identity, TaskFilter, TaskPriority};

use crate::error::RpcError;
use crate::methods::{Caller, MethodRegistry, RpcContext};
use crate::rpc::{optional_bool, optional_i64, optional_str};

/// Register every method the server speaks.
pub fn register_all(registry: &mut MethodRegistry) {
    registry.register("auth.register", Arc::new(auth::RegisterHandler));
    registry.register("auth.login", Arc::new(auth::LoginHandler));
    registry.register("auth.validate", Arc::new(auth::ValidateHandler));
    registry.register("task.create", Arc::new(tasks::CreateTaskHandler));
    registry.register("task.list", Arc::new(tasks::ListTasksHandler));
    registry.register("task.get", Arc::new(tasks::GetTaskHandler));
    registry.register("task.update", Arc::new(tasks::UpdateTaskHandler));
    registry.register("task.delete", Arc::new(tasks::DeleteTaskHandler));
    registry.register("task.stats", Arc::new(tasks::TaskStatsHandler));
    registry.register("task.subscribe", Arc::new(streams::TaskSubscribeHandler));
    registry.register(
        "notification.subscribe",
        Arc::new(streams::NotificationSubscribeHandler),
    );
    registry.register("chat.join", Arc::new(streams::ChatJoinHandler));
    registry.register("chat.send", Arc::new(streams::ChatSendHandler));
    registry.register("system.ping", Arc::new(system::PingHandler));
}

/// Params object for methods that cannot run without one.
pub(crate) fn require_params(params: Option<Value>) -> Result<Value, RpcError> {
    params.ok_or_else(|| RpcError::InvalidArgument("Missing parameters".into()))
}

/// Resolve the caller identity for a credentialed method.
///
/// A token in the request body wins; otherwise the identity proven on the
/// upgrade header is used. Neither present is an authentication failure, as
/// is a body token that does not verify.
pub(crate) fn authenticate(
    params: Option<&Value>,
    caller: &Caller,
    ctx: &RpcContext,
) -> Result<Identity, RpcError> {
    if let Some(params) = params {
        if let Some(token) = optional_str(params, "token")? {
            return Ok(ctx.signer.verify(token)?);
        }
    }
    if let Some(identity) = &caller.identity {
        return Ok(identity.clone());
    }
    Err(RpcError::Unauthenticated(
        "Missing credential: supply a token or an authorization header".into(),
    ))
}

/// Task filter from optional request fields. Priority arrives as a wire
/// code; out-of-range codes collapse to medium rather than failing.
pub(crate) fn filter_from(params: &Value) -> Result<TaskFilter, RpcError> {
    Ok(TaskFilter {
        completed: optional_bool(params, "completed")?,
        priority: optional_i64(params, "priority")?.map(TaskPriority::from_code),
    })
}
