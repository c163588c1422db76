//! WebSocket client for hive servers with a round-robin replica pool.

pub mod error;
pub mod pool;
pub mod stub;

pub use error::ClientError;
pub use pool::{ReplicaPool, Service};
pub use stub::ReplicaStub;
