//! Configuration: a single TOML file parsed into a [`Config`] tree and
//! published through a process-wide [`ArcSwap`] so a future config reload
//! only needs to swap the pointer.

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use serde_derive::{Deserialize, Serialize};

mod duration;
mod general;
mod route;

pub use duration::Duration;
pub use general::{DefaultRoute, General, TlsVerify};
pub use route::{RouteConfig, RouteTable};

use crate::errors::ConfigError;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub routes: RouteTable,
}

impl Config {
    pub fn from_toml(contents: &str) -> Result<Config, ConfigError> {
        toml::from_str(contents).map_err(ConfigError::Parse)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| ConfigError::Read(path.display().to_string(), err))?;
        Config::from_toml(&contents)
    }
}

static CONFIG: Lazy<ArcSwap<Config>> = Lazy::new(|| ArcSwap::from_pointee(Config::default()));

/// The currently published configuration. Cheap: an `Arc` clone.
pub fn current() -> Arc<Config> {
    CONFIG.load_full()
}

/// Publishes a new configuration, visible to subsequent [`current`] calls.
pub fn set(config: Config) {
    CONFIG.store(Arc::new(config));
}
