//! Chat line relay across chat sessions.

use std::sync::Arc;

use serde_json::to_value;
use tracing::{debug, warn};

use hive_core::{ChatMessage, SessionId};

use crate::rpc::{RpcEvent, CHAT_MESSAGE_FRAME};
use crate::sessions::{Partition, SessionRegistry};

/// Relays chat lines to every open chat session except the sender's own.
pub struct ChatRelay {
    sessions: Arc<SessionRegistry>,
}

impl ChatRelay {
    pub fn new(sessions: Arc<SessionRegistry>) -> Self {
        Self { sessions }
    }

    /// Push one stamped line to the room. The sender's session is skipped,
    /// so a sender never sees its own line echoed back. Returns the number
    /// of sessions the frame was enqueued to.
    pub fn relay(&self, sender: &SessionId, message: &ChatMessage) -> usize {
        let data = match to_value(message) {
            Ok(value) => value,
            Err(error) => {
                warn!(%error, "failed to serialize chat message");
                return 0;
            }
        };
        let event = RpcEvent {
            frame_type: CHAT_MESSAGE_FRAME.to_string(),
            data,
            timestamp: message.timestamp.clone(),
        };
        let frame = match serde_json::to_string(&event) {
            Ok(json) => Arc::new(json),
            Err(error) => {
                warn!(%error, "failed to encode chat frame");
                return 0;
            }
        };

        let mut delivered = 0;
        for (session_id, entry) in self.sessions.snapshot(Partition::Chat) {
            if session_id == *sender {
                continue;
            }
            if entry.handle.send(frame.clone()) {
                delivered += 1;
            } else {
                warn!(
                    session_id = %session_id,
                    client_id = %entry.client_id,
                    "chat frame dropped"
                );
            }
        }

        debug!(sender = %sender, delivered, "chat line relayed");
        delivered
    }
}
