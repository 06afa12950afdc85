use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::http::response::OverridePolicy;

#[cfg(any(target_os = "ios", target_os = "android"))]
pub const DEFAULT_PORT: u16 = 80;
#[cfg(not(any(target_os = "ios", target_os = "android")))]
pub const DEFAULT_PORT: u16 = 8080;

/// Pending connections queued by the kernel per listening socket.
pub const LISTEN_BACKLOG: i32 = 16;

/// Read size while looking for the end of the header section.
pub const HEADER_READ_CAPACITY: usize = 1024;

const DEFAULT_BODY_CHUNK_SIZE: usize = 256 * 1024;
const DEFAULT_MAX_HEADER_SIZE: usize = 64 * 1024;

/// Options a server is started with.
///
/// Every field has a default, so a YAML document only needs the keys it
/// changes:
///
/// ```yaml
/// port: 9000
/// bind_to_localhost: true
/// override_policy: pass_through
/// request_timeout_ms: 30000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerOptions {
    /// TCP port; 0 picks an ephemeral port.
    pub port: u16,
    /// Listen on loopback only instead of every interface.
    pub bind_to_localhost: bool,
    /// Also listen on IPv6.
    pub ipv6: bool,
    pub override_policy: OverridePolicy,
    /// Deadline for a processor to deliver its response. No deadline when unset.
    pub request_timeout_ms: Option<u64>,
    /// Largest read issued while streaming a request body.
    pub body_chunk_size: usize,
    /// Largest header section accepted before answering 400.
    pub max_header_size: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_to_localhost: false,
            ipv6: false,
            override_policy: OverridePolicy::default(),
            request_timeout_ms: None,
            body_chunk_size: DEFAULT_BODY_CHUNK_SIZE,
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
        }
    }
}

impl ServerOptions {
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let options: ServerOptions =
            serde_yaml::from_str(yaml).context("invalid server options")?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_yaml_str(&yaml).with_context(|| format!("failed to load {}", path.display()))
    }

    /// Loads options from the process environment.
    ///
    /// `PORTHOLE_CONFIG` names a YAML file to start from; `PORTHOLE_PORT` and
    /// `PORTHOLE_BIND_LOCALHOST` override individual fields.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(|key| std::env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with a custom variable lookup.
    pub fn load_from<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = match lookup("PORTHOLE_CONFIG") {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(port) = lookup("PORTHOLE_PORT") {
            options.port = port
                .trim()
                .parse()
                .with_context(|| format!("PORTHOLE_PORT is not a port number: {port}"))?;
        }

        if let Some(flag) = lookup("PORTHOLE_BIND_LOCALHOST") {
            options.bind_to_localhost = matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        options.validate()?;
        Ok(options)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.body_chunk_size > 0, "body_chunk_size must be positive");
        anyhow::ensure!(
            self.max_header_size >= HEADER_READ_CAPACITY,
            "max_header_size must be at least {HEADER_READ_CAPACITY} bytes"
        );
        Ok(())
    }
}
