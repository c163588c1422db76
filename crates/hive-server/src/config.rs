//! Server configuration.

use secrecy::SecretString;
use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_PORT: u16 = 7411;

/// Signing secret used when `HIVE_TOKEN_SECRET` is unset. Tokens minted
/// under it are worthless outside a dev box.
const DEV_TOKEN_SECRET: &str = "hive-dev-secret-do-not-deploy";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Listening port. 0 binds an ephemeral port.
    pub port: u16,
    /// HMAC secret for bearer credentials.
    pub token_secret: SecretString,
    /// Outbound frame queue capacity per connection.
    pub max_send_queue: usize,
    /// Per-call handler timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            token_secret: SecretString::from(DEV_TOKEN_SECRET),
            max_send_queue: 256,
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Configuration from `HIVE_PORT` and `HIVE_TOKEN_SECRET`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("HIVE_PORT") {
            match raw.parse() {
                Ok(port) => config.port = port,
                Err(_) => warn!(%raw, "ignoring unparseable HIVE_PORT"),
            }
        }

        match std::env::var("HIVE_TOKEN_SECRET") {
            Ok(secret) if !secret.is_empty() => {
                config.token_secret = SecretString::from(secret);
            }
            _ => warn!("HIVE_TOKEN_SECRET not set; tokens signed with the dev secret"),
        }

        config
    }
}
