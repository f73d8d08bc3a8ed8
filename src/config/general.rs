//! Pooler-wide configuration options (the `[general]` table).

use serde_derive::{Deserialize, Serialize};

use super::Duration;

/// Settings that apply to the Pooler's listening endpoint and to the
/// Periodic loop, independent of any particular route.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct General {
    /// Listen address; `"*"` means wildcard.
    #[serde(default = "General::default_host")]
    pub host: String,

    #[serde(default = "General::default_port")]
    pub port: u16,

    /// Passed to `listen()`.
    #[serde(default = "General::default_backlog")]
    pub backlog: u32,

    /// Disable Nagle's algorithm on accepted sockets.
    #[serde(default = "General::default_nodelay")]
    pub nodelay: bool,

    /// Idle seconds before a TCP keepalive probe; `0` disables.
    #[serde(default = "General::default_keepalive")]
    pub keepalive: u64,

    /// Per-socket read-ahead buffer, in bytes.
    #[serde(default = "General::default_readahead")]
    pub readahead: usize,

    /// If not `disable`, a TLS frontend context is initialised.
    #[serde(default = "General::default_tls_verify")]
    pub tls_verify: TlsVerify,

    /// Period, in Periodic ticks (seconds), between statistics
    /// emissions; `0` disables.
    #[serde(default = "General::default_log_statistics")]
    pub log_statistics: u64,

    /// Tokio runtime worker thread count. `0` lets tokio pick based on
    /// the number of CPUs.
    #[serde(default)]
    pub worker_threads: usize,

    /// Default policy applied to an unlisted `(database, user)` pair,
    /// allowing it to materialise as a dynamic route on first `attach`.
    #[serde(default)]
    pub default_route: Option<DefaultRoute>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TlsVerify {
    Disable,
    Require,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DefaultRoute {
    pub enabled: bool,
    pub upstream_host: String,
    pub upstream_port: u16,
    #[serde(default = "General::default_pool_ttl")]
    pub pool_ttl: Duration,
    #[serde(default = "General::default_pool_size")]
    pub pool_size: usize,
}

impl General {
    fn default_host() -> String {
        "*".to_string()
    }

    fn default_port() -> u16 {
        6432
    }

    fn default_backlog() -> u32 {
        128
    }

    fn default_nodelay() -> bool {
        true
    }

    fn default_keepalive() -> u64 {
        0
    }

    fn default_readahead() -> usize {
        8192
    }

    fn default_tls_verify() -> TlsVerify {
        TlsVerify::Disable
    }

    fn default_log_statistics() -> u64 {
        0
    }

    fn default_pool_ttl() -> Duration {
        Duration::from_secs(60)
    }

    fn default_pool_size() -> usize {
        20
    }
}

impl Default for General {
    fn default() -> Self {
        General {
            host: General::default_host(),
            port: General::default_port(),
            backlog: General::default_backlog(),
            nodelay: General::default_nodelay(),
            keepalive: General::default_keepalive(),
            readahead: General::default_readahead(),
            tls_verify: General::default_tls_verify(),
            log_statistics: General::default_log_statistics(),
            worker_threads: 0,
            default_route: None,
        }
    }
}
