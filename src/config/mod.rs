//! Configuration for a ledger process.
//!
//! Loaded in layers, later sources overriding earlier ones:
//! 1. Default values from code
//! 2. TOML file named by `CONFIG_PATH`
//! 3. Environment variables with the `LEDGER__` prefix, e.g.
//!    `LEDGER__DISCOVERY__PRIORITY=50`
mod discovery;
mod node;
mod registry;
pub use discovery::*;
pub use node::*;
pub use registry::*;


use std::env;
use std::fmt::Debug;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

const ENV_PREFIX: &str = "LEDGER";

/// Which side of the protocol this process plays
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Owns a node store and registers it with a discovered registry
    #[default]
    Node,
    /// Accepts registrations and serves queries and subscriptions
    Registry,
}

#[derive(Serialize, Deserialize, Clone, Default)]
pub struct LedgerConfig {
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

impl Debug for LedgerConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("role", &self.role)
            .field("node", &self.node)
            .finish()
    }
}

impl LedgerConfig {
    /// Loads defaults, the `CONFIG_PATH` file and `LEDGER__` variables.
    ///
    /// Does not validate, so that `with_override_config` can still be
    /// applied. Call `validate()` before use.
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(environment());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Layers another file over the current values. Environment variables
    /// still win.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(environment())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn validate(self) -> Result<Self> {
        self.node.validate()?;
        self.discovery.validate()?;
        self.registry.validate()?;
        Ok(self)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}

pub(crate) fn invalid(message: impl Into<String>) -> Error {
    Error::Config(ConfigError::Message(message.into()))
}
