use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::ClientError;
use crate::stub::ReplicaStub;

/// Service lanes. Every replica serves every lane; the lanes only differ
/// in where their rotation cursor currently points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Auth,
    Task,
    Chat,
}

impl Service {
    pub const ALL: [Service; 3] = [Service::Auth, Service::Task, Service::Chat];

    pub fn as_str(self) -> &'static str {
        match self {
            Service::Auth => "auth",
            Service::Task => "task",
            Service::Chat => "chat",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auth" => Ok(Service::Auth),
            "task" => Ok(Service::Task),
            "chat" => Ok(Service::Chat),
            other => Err(format!(
                "unknown service '{other}' (expected auth, task, or chat)"
            )),
        }
    }
}

#[derive(Debug)]
struct ServiceLane {
    stubs: Vec<Arc<ReplicaStub>>,
    cursor: AtomicUsize,
}

impl ServiceLane {
    fn new(stubs: Vec<Arc<ReplicaStub>>) -> Self {
        Self {
            stubs,
            cursor: AtomicUsize::new(0),
        }
    }

    // Cursor stays within 0..len, so rotation is unaffected by wraparound.
    fn next(&self) -> Arc<ReplicaStub> {
        let i = self
            .cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                Some((c + 1) % self.stubs.len())
            })
            .unwrap_or(0);
        Arc::clone(&self.stubs[i])
    }
}

/// Round-robin replica pool with one independent cursor per service lane.
///
/// Rotation is deliberately blind to replica health: a dead replica costs
/// its caller one failed call and the cursor has already moved on.
#[derive(Debug)]
pub struct ReplicaPool {
    auth: ServiceLane,
    task: ServiceLane,
    chat: ServiceLane,
}

impl ReplicaPool {
    pub fn new(addresses: Vec<String>, token: Option<String>) -> Result<Self, ClientError> {
        if addresses.is_empty() {
            return Err(ClientError::NoReplicas);
        }
        let stubs: Vec<Arc<ReplicaStub>> = addresses
            .into_iter()
            .map(|addr| Arc::new(ReplicaStub::new(addr, token.clone())))
            .collect();
        Ok(Self {
            auth: ServiceLane::new(stubs.clone()),
            task: ServiceLane::new(stubs.clone()),
            chat: ServiceLane::new(stubs),
        })
    }

    fn lane(&self, service: Service) -> &ServiceLane {
        match service {
            Service::Auth => &self.auth,
            Service::Task => &self.task,
            Service::Chat => &self.chat,
        }
    }

    /// Pick the next replica for the lane and advance its cursor.
    pub fn next(&self, service: Service) -> Arc<ReplicaStub> {
        let stub = self.lane(service).next();
        debug!(service = %service, addr = stub.address(), "replica selected");
        stub
    }

    /// Dispatch one call to the next replica of the lane.
    pub async fn call(
        &self,
        service: Service,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, ClientError> {
        self.next(service).call(method, params).await
    }

    pub fn replica_count(&self) -> usize {
        self.auth.stubs.len()
    }
}
