use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid environment variable {0}: {1}")]
    InvalidEnv(String, String),

    #[error("invalid listen address {0:?}")]
    InvalidAddress(String),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Host key missing, unreadable or not a private key we understand
    #[error("cannot load host key {path}: {source}")]
    HostKey {
        path: PathBuf,
        #[source]
        source: russh_keys::Error,
    },

    #[error("cannot generate a host key for {path}")]
    HostKeyGenerate { path: PathBuf },

    #[error("cannot write host key {path}: {source}")]
    HostKeyWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read banner {path}: {source}")]
    Banner {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ssh: {0}")]
    Ssh(#[from] russh::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Live connections outlasted the shutdown budget and were force-closed
    #[error("shutdown timed out after {timeout:?}, force-closed {remaining} connection(s)")]
    ShutdownTimeout { timeout: Duration, remaining: usize },

    /// Server was already stopped
    #[error("server already closed")]
    AlreadyClosed,
}

impl ServerError {
    /// "Already closed" is an expected outcome of a repeated shutdown, not a failure.
    pub fn is_closed(&self) -> bool {
        matches!(self, ServerError::AlreadyClosed)
    }
}
