//! Server and client configuration.
//!
//! Defaults match the reference deployment (10 seats, 10 s betting window,
//! 100 ms tick). The server optionally loads a TOML file; command-line
//! arguments override whatever the file says.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum nickname length accepted by the client CLI.
pub const MAX_NICK_LEN: usize = 13;

/// Which unspecified address the listener binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IpFamily {
    /// Listen on 0.0.0.0
    V4,
    /// Listen on [::]
    V6,
}

/// Tunables for the round engine and the listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub family: IpFamily,
    pub port: u16,
    /// Seats in the player table.
    pub capacity: usize,
    /// How long the betting window stays open.
    #[serde(with = "humantime_serde")]
    pub betting_window: Duration,
    /// Multiplier tick cadence during flight.
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,
    pub listen_backlog: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            family: IpFamily::V4,
            port: 7979,
            capacity: 10,
            betting_window: Duration::from_secs(10),
            tick_interval: Duration::from_millis(100),
            listen_backlog: 32,
        }
    }
}

impl ServerConfig {
    /// Load from a TOML file. Missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: ServerConfig = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::Config("capacity must be at least 1".into()));
        }
        if self.betting_window.is_zero() {
            return Err(Error::Config("betting_window must be non-zero".into()));
        }
        if self.tick_interval.is_zero() {
            return Err(Error::Config("tick_interval must be non-zero".into()));
        }
        Ok(())
    }

    /// The unspecified address of the configured family, on the configured port.
    pub fn bind_addr(&self) -> SocketAddr {
        match self.family {
            IpFamily::V4 => (Ipv4Addr::UNSPECIFIED, self.port).into(),
            IpFamily::V6 => (Ipv6Addr::UNSPECIFIED, self.port).into(),
        }
    }
}

/// Validate a nickname: 1..=13 graphic ASCII characters. The nickname never
/// crosses the wire; it is a client-side display label only.
pub fn validate_nick(nick: &str) -> Result<()> {
    if nick.is_empty() || nick.len() > MAX_NICK_LEN {
        return Err(Error::Config(format!(
            "nickname must be 1..={} characters",
            MAX_NICK_LEN
        )));
    }
    if !nick.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(Error::Config(
            "nickname must be graphic ASCII, no spaces".into(),
        ));
    }
    Ok(())
}
