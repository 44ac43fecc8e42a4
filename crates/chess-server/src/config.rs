//! Configuration for the chess server.
//!
//! Sources, lowest priority first: built-in defaults, an optional TOML
//! file, then environment variables:
//!
//! - `CHESS_BIND_ADDR`         (default: "0.0.0.0")
//! - `CHESS_PORT`              (default: "3000")
//! - `CHESS_MAX_CLIENTS`       (default: "1024")
//! - `CHESS_REAP_FINISHED`     (default: "true")
//! - `CHESS_ENGINE_PATH`       (default: "/usr/games/stockfish")
//! - `CHESS_MOVETIME_MS`       (default: "2000")
//! - `CHESS_RESPONSE_GRACE_MS` (default: "5000")
//!
//! Command-line flags in the binary override all of these.

use std::env;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidEnv {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IP address / interface to bind to (e.g. "0.0.0.0" or "127.0.0.1").
    pub bind_addr: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Maximum number of simultaneously connected clients.
    pub max_clients: usize,

    /// Drop a session (and its engine) as soon as its game is over,
    /// instead of keeping it until the owner disconnects.
    pub reap_finished: bool,

    pub engine: EngineConfig,
}

/// How to launch and drive the external UCI engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine executable.
    pub program: String,

    /// Extra arguments for the executable.
    pub args: Vec<String>,

    /// Think-time passed as `go movetime`.
    pub movetime_ms: u64,

    /// How long past the think-time to wait for `bestmove` before giving up.
    pub response_grace_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "0.0.0.0".to_string(),
            port: 3000,
            max_clients: 1024,
            reap_finished: true,
            engine: EngineConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            program: "/usr/games/stockfish".to_string(),
            args: Vec::new(),
            movetime_ms: 2000,
            response_grace_ms: 5000,
        }
    }
}

impl EngineConfig {
    pub fn movetime(&self) -> Duration {
        Duration::from_millis(self.movetime_ms)
    }

    /// Upper bound on a single search: think-time plus grace.
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.movetime_ms.saturating_add(self.response_grace_ms))
    }
}

impl Config {
    /// Defaults overridden by environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::default().with_env_overrides()
    }

    /// Load a TOML file; missing keys keep their defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Config::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `CHESS_*` environment variables on top of `self`.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|key| env::var(key).ok())
    }

    /// Apply overrides from any key lookup (the environment, in practice).
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("CHESS_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(program) = lookup("CHESS_ENGINE_PATH") {
            self.engine.program = program;
        }
        self.port = read_or_default(&lookup, "CHESS_PORT", self.port)?;
        self.max_clients = read_or_default(&lookup, "CHESS_MAX_CLIENTS", self.max_clients)?;
        self.reap_finished = read_or_default(&lookup, "CHESS_REAP_FINISHED", self.reap_finished)?;
        self.engine.movetime_ms =
            read_or_default(&lookup, "CHESS_MOVETIME_MS", self.engine.movetime_ms)?;
        self.engine.response_grace_ms = read_or_default(
            &lookup,
            "CHESS_RESPONSE_GRACE_MS",
            self.engine.response_grace_ms,
        )?;
        Ok(self)
    }

    /// Convenience: `addr:port` socket string.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn read_or_default<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(value) => value.trim().parse::<T>().map_err(|e| ConfigError::InvalidEnv {
            key,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}
