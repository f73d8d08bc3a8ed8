//! Errors.

use std::io;

use crate::pool::RouteId;

/// Top-level error type returned from fallible entry points.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pooler(#[from] PoolerError),
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Fatal at start: an unresolvable listen address or a failed bind.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0:?}: {1}")]
    Read(String, io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("bad config: {0}")]
    Invalid(String),
}

/// Raised by the Pooler's accept loop. Only `Resolve` and `Bind` are fatal;
/// everything else is logged and the loop continues.
#[derive(Debug, thiserror::Error)]
pub enum PoolerError {
    #[error("failed to resolve listen address {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("failed to bind {0}: {1}")]
    Bind(String, #[source] io::Error),
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),
    #[error("failed to configure accepted socket: {0}")]
    SocketConfig(#[source] io::Error),
    #[error("failed to allocate client object")]
    ClientAllocation,
}

/// Errors surfaced to a worker from a Router `attach` request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PoolError {
    #[error("no route for {0}")]
    NoRoute(RouteId),
    #[error("pool for {0} is full")]
    PoolFull(RouteId),
    #[error("failed to connect upstream for {route}: {reason}")]
    ConnectFailed { route: RouteId, reason: String },
    #[error("route identity {0} exceeds the maximum database/user length")]
    IdentityTooLong(RouteId),
    #[error("router is shutting down")]
    ShuttingDown,
}
