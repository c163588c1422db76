use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use uuid::Uuid;

use crate::error::ClientError;

/// Upper bound on one full connect-send-receive exchange.
const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// One server address a call can be dispatched to.
///
/// Each call opens a fresh connection, sends a single request, waits for
/// the response with the matching id, and closes. Event frames pushed on
/// the same socket are skipped.
#[derive(Debug, Clone)]
pub struct ReplicaStub {
    address: String,
    token: Option<String>,
}

impl ReplicaStub {
    pub fn new(address: impl Into<String>, token: Option<String>) -> Self {
        Self {
            address: address.into(),
            token,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Send one request and wait for its response.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, ClientError> {
        timeout(CALL_TIMEOUT, self.exchange(method, params))
            .await
            .map_err(|_| ClientError::Timeout)?
    }

    async fn exchange(&self, method: &str, params: Option<Value>) -> Result<Value, ClientError> {
        let mut request = format!("ws://{}/ws", self.address)
            .into_client_request()
            .map_err(|e| ClientError::Connect {
                addr: self.address.clone(),
                reason: e.to_string(),
            })?;
        if let Some(token) = &self.token {
            let header = format!("Bearer {token}")
                .parse()
                .map_err(|_| ClientError::Transport("token is not a valid header value".into()))?;
            request.headers_mut().insert("authorization", header);
        }

        let (mut ws, _) = connect_async(request).await.map_err(|e| ClientError::Connect {
            addr: self.address.clone(),
            reason: e.to_string(),
        })?;

        let id = format!("req_{}", Uuid::now_v7());
        let mut frame = json!({"id": id, "method": method});
        if let Some(params) = params {
            frame["params"] = params;
        }
        ws.send(Message::text(frame.to_string()))
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        debug!(addr = %self.address, method, "request sent");

        while let Some(msg) = ws.next().await {
            let msg = msg.map_err(|e| ClientError::Transport(e.to_string()))?;
            let Message::Text(text) = msg else { continue };
            let Ok(value) = serde_json::from_str::<Value>(&text) else {
                continue;
            };
            if value.get("id").and_then(Value::as_str) != Some(id.as_str()) {
                continue;
            }
            let _ = ws.close(None).await;

            if value.get("success").and_then(Value::as_bool) == Some(true) {
                return Ok(value.get("result").cloned().unwrap_or(Value::Null));
            }
            let code = value
                .pointer("/error/code")
                .and_then(Value::as_str)
                .unwrap_or("INTERNAL")
                .to_string();
            let message = value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(ClientError::Rpc { code, message });
        }

        Err(ClientError::ClosedEarly)
    }
}
