//! Static route declarations: the `[routes.<database>]` blocks.

use std::collections::HashMap;

use serde_derive::{Deserialize, Serialize};

use super::Duration;

/// One statically configured route, keyed by database name in
/// [`super::Config::routes`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RouteConfig {
    pub upstream_host: String,
    pub upstream_port: u16,
    /// Users permitted to attach to this database under this route.
    pub users: Vec<String>,
    #[serde(default = "RouteConfig::default_pool_ttl")]
    pub pool_ttl: Duration,
    #[serde(default = "RouteConfig::default_pool_size")]
    pub pool_size: usize,
}

impl RouteConfig {
    fn default_pool_ttl() -> Duration {
        Duration::from_secs(60)
    }

    fn default_pool_size() -> usize {
        20
    }
}

pub type RouteTable = HashMap<String, RouteConfig>;
