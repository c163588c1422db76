//! Liveness method.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::instrument;

use hive_core::now_millis;

use crate::error::RpcError;
use crate::methods::{Caller, MethodHandler, RpcContext};

/// `system.ping`: unauthenticated liveness probe.
pub struct PingHandler;

#[async_trait]
impl MethodHandler for PingHandler {
    #[instrument(skip_all, fields(method = "system.ping"))]
    async fn handle(
        &self,
        _params: Option<Value>,
        _caller: &Caller,
        _ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        Ok(json!({ "status": "ok", "timestamp": now_millis() }))
    }
}

#[cfg(test)]
mod tests {
    use crate::methods::testing::{caller, context};

    use super::*;

    #[tokio::test]
    async fn ping_needs_no_credential() {
        let ctx = context();
        let (caller, _rx) = caller();

        let result = PingHandler.handle(None, &caller, &ctx).await.unwrap();
        assert_eq!(result["status"], "ok");
        assert!(result["timestamp"].as_str().unwrap().ends_with('Z'));
    }
}
