//! # hive
//!
//! Hive binary: `serve` runs the task server, `call` dispatches a single
//! RPC through the round-robin replica pool.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hive_client::{ReplicaPool, Service};
use hive_server::ServerConfig;
use hive_store::Database;

/// Real-time task server and client.
#[derive(Parser, Debug)]
#[command(name = "hive", about = "Task server with live WebSocket feeds")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the WebSocket server.
    Serve {
        /// Port to bind (0 for auto-assign; overrides HIVE_PORT).
        #[arg(long)]
        port: Option<u16>,

        /// Path to the SQLite database (":memory:" for ephemeral).
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Send one RPC through the replica pool and print the result.
    Call {
        /// Service lane: auth, task, or chat.
        #[arg(long)]
        service: String,

        /// Method name, e.g. task.list.
        #[arg(long)]
        method: String,

        /// JSON parameters object.
        #[arg(long)]
        params: Option<String>,

        /// Bearer token sent with the connection.
        #[arg(long)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve { port, db } => serve(port, db).await,
        Command::Call {
            service,
            method,
            params,
            token,
        } => call(&service, &method, params, token).await,
    }
}

async fn serve(port: Option<u16>, db: Option<PathBuf>) -> Result<()> {
    let mut config = ServerConfig::from_env();
    if let Some(port) = port {
        config.port = port;
    }

    let db_path = db
        .or_else(|| std::env::var("HIVE_DB").ok().map(PathBuf::from))
        .unwrap_or_else(default_db_path);
    let db = if db_path.as_os_str() == ":memory:" {
        Database::in_memory().context("Failed to open in-memory database")?
    } else {
        Database::open(&db_path).context("Failed to open database")?
    };

    let state = hive_server::build_state(config, db);
    let handle = hive_server::start(state)
        .await
        .context("Failed to bind server")?;
    tracing::info!(addr = %handle.addr(), "Hive server ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    tracing::info!("Shutting down");
    handle.shutdown().await;
    Ok(())
}

async fn call(
    service: &str,
    method: &str,
    params: Option<String>,
    token: Option<String>,
) -> Result<()> {
    let service: Service = service.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let params = params
        .map(|raw| serde_json::from_str(&raw).context("Invalid --params JSON"))
        .transpose()?;

    let pool = ReplicaPool::new(replica_addresses(), token)?;
    let result = pool.call(service, method, params).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Replica addresses from HIVE_REPLICAS (comma-separated host:port pairs),
/// falling back to a local server on the default port.
fn replica_addresses() -> Vec<String> {
    let fallback = format!("127.0.0.1:{}", ServerConfig::default().port);
    std::env::var("HIVE_REPLICAS")
        .unwrap_or(fallback)
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn default_db_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".hive").join("hive.db")
}
