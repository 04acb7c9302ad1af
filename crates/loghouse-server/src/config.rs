//! Server Configuration
//!
//! All configuration is read from environment variables once at startup:
//!
//! - `LOGHOUSE_ADDR`: Bind address (default: 0.0.0.0:3000)
//! - `PORT`: Port on 0.0.0.0, used when `LOGHOUSE_ADDR` is unset
//! - `LOGHOUSE_BODY_LIMIT`: Maximum request body in bytes (default: 10KB)
//! - `LOGHOUSE_ENV`: `production` hides 5xx error details
//! - `SHUTDOWN_TIMEOUT_SECS`: How long to wait for the queue to drain (default: 30)

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ServerError;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub body_limit_bytes: usize,
    pub expose_error_details: bool,
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            body_limit_bytes: 10 * 1024, // 10KB
            expose_error_details: true,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("LOGHOUSE_ADDR") {
            config.bind_addr = addr
                .parse()
                .map_err(|_| ServerError::Config(format!("LOGHOUSE_ADDR: invalid address {addr:?}")))?;
        } else if let Some(port) = lookup("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|_| ServerError::Config(format!("PORT: invalid port {port:?}")))?;
            config.bind_addr = SocketAddr::from(([0, 0, 0, 0], port));
        }

        if let Some(limit) = lookup("LOGHOUSE_BODY_LIMIT") {
            config.body_limit_bytes = limit.trim().parse().map_err(|_| {
                ServerError::Config(format!("LOGHOUSE_BODY_LIMIT: invalid size {limit:?}"))
            })?;
        }

        if let Some(env) = lookup("LOGHOUSE_ENV") {
            config.expose_error_details = !env.trim().eq_ignore_ascii_case("production");
        }

        if let Some(secs) = lookup("SHUTDOWN_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                ServerError::Config(format!("SHUTDOWN_TIMEOUT_SECS: invalid value {secs:?}"))
            })?;
            config.shutdown_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}
