//! Task CRUD methods. Every one re-validates the caller's credential and
//! scopes the store call to the authenticated owner; mutations publish a
//! task event after the store write commits.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::instrument;

use hive_core::{EventKind, TaskEvent, TaskId, TaskPriority};
use hive_store::TaskPatch;

use crate::error::RpcError;
use crate::handlers::{authenticate, filter_from, require_params};
use crate::methods::{Caller, MethodHandler, RpcContext};
use crate::rpc::{optional_bool, optional_i64, optional_str, optional_u32, require_str};

const DEFAULT_LIST_LIMIT: u32 = 50;
const MAX_LIST_LIMIT: u32 = 200;

/// Title of a new task, or the replacement title in a patch.
fn checked_title(raw: &str) -> Result<&str, RpcError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(RpcError::InvalidArgument("Title must not be empty".into()));
    }
    Ok(title)
}

pub struct CreateTaskHandler;

#[async_trait]
impl MethodHandler for CreateTaskHandler {
    #[instrument(skip_all, fields(method = "task.create"))]
    async fn handle(
        &self,
        params: Option<Value>,
        caller: &Caller,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        let identity = authenticate(params.as_ref(), caller, ctx)?;
        let params = require_params(params)?;
        let title = checked_title(require_str(&params, "title")?)?;
        let description = optional_str(&params, "description")?.unwrap_or_default();
        let priority = optional_i64(&params, "priority")?
            .map(TaskPriority::from_code)
            .unwrap_or_default();

        let task = ctx
            .tasks
            .create(&identity.user_id, title, description, priority)?;
        ctx.broadcaster
            .publish(&TaskEvent::new(EventKind::Created, task.clone()));
        Ok(json!({ "task": task }))
    }
}

pub struct ListTasksHandler;

#[async_trait]
impl MethodHandler for ListTasksHandler {
    #[instrument(skip_all, fields(method = "task.list"))]
    async fn handle(
        &self,
        params: Option<Value>,
        caller: &Caller,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        let identity = authenticate(params.as_ref(), caller, ctx)?;
        let params = params.unwrap_or_else(|| json!({}));
        let filter = filter_from(&params)?;
        let limit = optional_u32(&params, "limit")?
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .min(MAX_LIST_LIMIT);
        let offset = optional_u32(&params, "offset")?.unwrap_or(0);

        let page = ctx.tasks.list(&identity.user_id, &filter, limit, offset)?;
        Ok(json!({ "tasks": page.tasks, "total": page.total }))
    }
}

pub struct GetTaskHandler;

#[async_trait]
impl MethodHandler for GetTaskHandler {
    #[instrument(skip_all, fields(method = "task.get"))]
    async fn handle(
        &self,
        params: Option<Value>,
        caller: &Caller,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        let identity = authenticate(params.as_ref(), caller, ctx)?;
        let params = require_params(params)?;
        let id = TaskId::from_raw(require_str(&params, "taskId")?);

        let task = ctx.tasks.get(&identity.user_id, &id)?;
        Ok(json!({ "task": task }))
    }
}

pub struct UpdateTaskHandler;

#[async_trait]
impl MethodHandler for UpdateTaskHandler {
    #[instrument(skip_all, fields(method = "task.update"))]
    async fn handle(
        &self,
        params: Option<Value>,
        caller: &Caller,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        let identity = authenticate(params.as_ref(), caller, ctx)?;
        let params = require_params(params)?;
        let id = TaskId::from_raw(require_str(&params, "taskId")?);

        let patch = TaskPatch {
            title: optional_str(&params, "title")?
                .map(|raw| checked_title(raw).map(str::to_string))
                .transpose()?,
            description: optional_str(&params, "description")?.map(str::to_string),
            priority: optional_i64(&params, "priority")?.map(TaskPriority::from_code),
            completed: optional_bool(&params, "completed")?,
        };

        let task = ctx.tasks.update(&identity.user_id, &id, &patch)?;
        ctx.broadcaster
            .publish(&TaskEvent::new(EventKind::Updated, task.clone()));
        Ok(json!({ "task": task }))
    }
}

pub struct DeleteTaskHandler;

#[async_trait]
impl MethodHandler for DeleteTaskHandler {
    #[instrument(skip_all, fields(method = "task.delete"))]
    async fn handle(
        &self,
        params: Option<Value>,
        caller: &Caller,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        let identity = authenticate(params.as_ref(), caller, ctx)?;
        let params = require_params(params)?;
        let id = TaskId::from_raw(require_str(&params, "taskId")?);

        let task = ctx.tasks.delete(&identity.user_id, &id)?;
        ctx.broadcaster
            .publish(&TaskEvent::new(EventKind::Deleted, task.clone()));
        Ok(json!({ "task": task }))
    }
}

pub struct TaskStatsHandler;

#[async_trait]
impl MethodHandler for TaskStatsHandler {
    #[instrument(skip_all, fields(method = "task.stats"))]
    async fn handle(
        &self,
        params: Option<Value>,
        caller: &Caller,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        let identity = authenticate(params.as_ref(), caller, ctx)?;
        let stats = ctx.tasks.stats(&identity.user_id)?;
        serde_json::to_value(&stats)
            .map_err(|e| RpcError::Internal(format!("stats encoding failed: {e}")))
    }
}
