//! Broadcast payloads: domain events and chat messages.
//!
//! Both are built fresh at emission time, pushed to live sessions, and never
//! persisted.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::UserId;
use crate::task::Task;
use crate::user::Identity;

/// What a mutation did to a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

impl EventKind {
    /// Frame type pushed to notification subscribers.
    pub fn frame_type(self) -> &'static str {
        match self {
            Self::Created => "task.created",
            Self::Updated => "task.updated",
            Self::Deleted => "task.deleted",
        }
    }
}

/// One task mutation, carrying the resulting task snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEvent {
    pub kind: EventKind,
    pub task: Task,
    pub timestamp: String,
}

impl TaskEvent {
    /// Build an event stamped with the current time.
    pub fn new(kind: EventKind, task: Task) -> Self {
        Self {
            kind,
            task,
            timestamp: now_millis(),
        }
    }
}

/// A relayed chat line. The server stamps sender and timestamp; client-supplied
/// values for either are ignored.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub user_id: UserId,
    pub username: String,
    pub message: String,
    pub timestamp: String,
}

impl ChatMessage {
    pub fn new(sender: &Identity, message: impl Into<String>) -> Self {
        Self {
            user_id: sender.user_id.clone(),
            username: sender.username.clone(),
            message: message.into(),
            timestamp: now_millis(),
        }
    }
}

/// RFC 3339 with millisecond precision, UTC `Z` suffix.
pub fn now_millis() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
