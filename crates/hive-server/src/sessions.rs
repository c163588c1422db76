//! Streaming session registry.
//!
//! Sessions are grouped into three partitions, one per push surface. Each
//! partition is guarded by its own lock, and the task-feed lock is held
//! across the open sequence (store snapshot, drain, insert) as well as by
//! the broadcaster while it collects recipients. A feed opened concurrently
//! with a task write therefore sees the write at least once: either the
//! snapshot already contains it, or the fan-out finds the freshly inserted
//! session, or both. Outside that race every write reaches an open session
//! exactly once.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::to_value;
use tracing::warn;

use hive_core::{Identity, SessionId, TaskFilter};
use hive_store::{StoreError, TaskRepo};

use crate::connection::{ClientHandle, ClientId};
use crate::rpc::{RpcEvent, TASK_FEED_FRAME};

/// Push surface a session is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Partition {
    Notification,
    TaskFeed,
    Chat,
}

impl Partition {
    pub fn as_str(self) -> &'static str {
        match self {
            Partition::Notification => "NOTIFICATION",
            Partition::TaskFeed => "TASK_FEED",
            Partition::Chat => "CHAT",
        }
    }
}

/// One open streaming session.
#[derive(Clone)]
pub struct SessionEntry {
    /// Connection the session lives on.
    pub client_id: ClientId,
    /// Outbound frame queue for that connection.
    pub handle: ClientHandle,
    /// Authenticated owner of the session.
    pub identity: Identity,
    /// Server-side filter for task-feed sessions; empty elsewhere.
    pub filter: TaskFilter,
}

#[derive(Default)]
pub struct SessionRegistry {
    notification: Mutex<HashMap<SessionId, SessionEntry>>,
    task_feed: Mutex<HashMap<SessionId, SessionEntry>>,
    chat: Mutex<HashMap<SessionId, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn partition(&self, partition: Partition) -> &Mutex<HashMap<SessionId, SessionEntry>> {
        match partition {
            Partition::Notification => &self.notification,
            Partition::TaskFeed => &self.task_feed,
            Partition::Chat => &self.chat,
        }
    }

    /// Open a session in the given partition.
    pub fn open(&self, partition: Partition, entry: SessionEntry) -> SessionId {
        let id = SessionId::new();
        self.partition(partition).lock().insert(id.clone(), entry);
        id
    }

    /// Open a task-feed session: replay the owner's current tasks as feed
    /// frames, then register the session for live pushes.
    ///
    /// The partition lock is held across the snapshot, the drain, and the
    /// insert so a concurrent publish cannot slip between replay and
    /// registration unseen. Returns the session id and the number of
    /// snapshot frames enqueued.
    pub fn open_task_feed(
        &self,
        entry: SessionEntry,
        tasks: &TaskRepo,
    ) -> Result<(SessionId, usize), StoreError> {
        let mut partition = self.task_feed.lock();
        let snapshot = tasks.snapshot(&entry.identity.user_id, &entry.filter)?;
        let mut drained = 0;
        for task in &snapshot {
            let data = match to_value(task) {
                Ok(data) => data,
                Err(error) => {
                    warn!(task_id = %task.id, %error, "failed to serialize snapshot task");
                    continue;
                }
            };
            if entry.handle.send_json(&RpcEvent::new(TASK_FEED_FRAME, data)) {
                drained += 1;
            } else {
                warn!(client_id = %entry.client_id, "snapshot frame dropped");
            }
        }
        let id = SessionId::new();
        partition.insert(id.clone(), entry);
        Ok((id, drained))
    }

    /// Open a chat session, reusing the connection's existing one if present.
    ///
    /// A connection holds at most one chat session; joining again refreshes
    /// the entry and returns the same session id.
    pub fn open_chat(&self, entry: SessionEntry) -> SessionId {
        let mut partition = self.chat.lock();
        let existing = partition
            .iter()
            .find(|(_, e)| e.client_id == entry.client_id)
            .map(|(id, _)| id.clone());
        match existing {
            Some(id) => {
                partition.insert(id.clone(), entry);
                id
            }
            None => {
                let id = SessionId::new();
                partition.insert(id.clone(), entry);
                id
            }
        }
    }

    /// Close a session by id. Returns `false` if no such session is open,
    /// which makes repeated closes harmless.
    pub fn close(&self, id: &SessionId) -> bool {
        self.notification.lock().remove(id).is_some()
            || self.task_feed.lock().remove(id).is_some()
            || self.chat.lock().remove(id).is_some()
    }

    /// Close every session belonging to a connection. Returns the number of
    /// sessions removed.
    pub fn close_for_client(&self, client_id: &ClientId) -> usize {
        let mut closed = 0;
        for partition in [&self.notification, &self.task_feed, &self.chat] {
            let mut sessions = partition.lock();
            let before = sessions.len();
            sessions.retain(|_, entry| entry.client_id != *client_id);
            closed += before - sessions.len();
        }
        closed
    }

    /// Current sessions in a partition, copied out so fan-out can run
    /// without holding the lock longer than the collection itself.
    pub fn snapshot(&self, partition: Partition) -> Vec<(SessionId, SessionEntry)> {
        self.partition(partition)
            .lock()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect()
    }

    /// Look up the session a connection holds in a partition.
    pub fn find_for_client(
        &self,
        partition: Partition,
        client_id: &ClientId,
    ) -> Option<(SessionId, SessionEntry)> {
        self.partition(partition)
            .lock()
            .iter()
            .find(|(_, entry)| entry.client_id == *client_id)
            .map(|(id, entry)| (id.clone(), entry.clone()))
    }

    pub fn count(&self, partition: Partition) -> usize {
        self.partition(partition).lock().len()
    }
}
