pub mod broadcast;
pub mod chat;
pub mod config;
pub mod connection;
pub mod error;
pub mod handlers;
pub mod methods;
pub mod rpc;
pub mod server;
pub mod sessions;
pub mod socket;

pub use config::ServerConfig;
pub use error::RpcError;
pub use server::{build_router, build_state, start, AppState, ServerHandle};
