//! Fan-out of task mutations to streaming sessions.

use std::sync::Arc;

use serde_json::to_value;
use tracing::{debug, warn};

use hive_core::TaskEvent;

use crate::rpc::{RpcEvent, TASK_FEED_FRAME};
use crate::sessions::{Partition, SessionRegistry};

/// Pushes task mutations to notification and task-feed sessions.
///
/// Each frame shape is serialized once and the bytes shared across
/// recipients. A session that cannot accept a frame is logged and skipped;
/// nothing here evicts a session or fails the originating request.
pub struct EventBroadcaster {
    sessions: Arc<SessionRegistry>,
}

impl EventBroadcaster {
    pub fn new(sessions: Arc<SessionRegistry>) -> Self {
        Self { sessions }
    }

    /// Publish one mutation. Notification sessions hear about every task;
    /// feed sessions only hear about their owner's tasks, and only when the
    /// resulting snapshot passes the session filter. Returns the number of
    /// sessions the frames were enqueued to.
    pub fn publish(&self, event: &TaskEvent) -> usize {
        let task_json = match to_value(&event.task) {
            Ok(value) => value,
            Err(error) => {
                warn!(task_id = %event.task.id, %error, "failed to serialize task event");
                return 0;
            }
        };

        let notice = RpcEvent {
            frame_type: event.kind.frame_type().to_string(),
            data: task_json.clone(),
            timestamp: event.timestamp.clone(),
        };
        let feed = RpcEvent {
            frame_type: TASK_FEED_FRAME.to_string(),
            data: task_json,
            timestamp: event.timestamp.clone(),
        };

        let notice_frame = match serde_json::to_string(&notice) {
            Ok(json) => Arc::new(json),
            Err(error) => {
                warn!(%error, "failed to encode notification frame");
                return 0;
            }
        };
        let feed_frame = match serde_json::to_string(&feed) {
            Ok(json) => Arc::new(json),
            Err(error) => {
                warn!(%error, "failed to encode feed frame");
                return 0;
            }
        };

        let mut delivered = 0;

        for (session_id, entry) in self.sessions.snapshot(Partition::Notification) {
            if entry.handle.send(notice_frame.clone()) {
                delivered += 1;
            } else {
                warn!(
                    session_id = %session_id,
                    client_id = %entry.client_id,
                    "notification frame dropped"
                );
            }
        }

        for (session_id, entry) in self.sessions.snapshot(Partition::TaskFeed) {
            if entry.identity.user_id != event.task.user_id {
                continue;
            }
            if !entry.filter.matches(&event.task) {
                continue;
            }
            if entry.handle.send(feed_frame.clone()) {
                delivered += 1;
            } else {
                warn!(
                    session_id = %session_id,
                    client_id = %entry.client_id,
                    "feed frame dropped"
                );
            }
        }

        debug!(
            kind = ?event.kind,
            task_id = %event.task.id,
            delivered,
            "task event published"
        );
        delivered
    }
}
