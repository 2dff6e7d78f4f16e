//! Configuration for the default partition wiring.
//!
//! The registry's lazily built default proxy routes everything to a single
//! connection named by [`RegistryConfig`].

use crate::connection::ConnectionDescriptor;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Environment variable holding the default provider name.
pub const PROVIDER_ENV: &str = "PARTITION_ROUTER_PROVIDER";

/// Environment variable holding the default connection string.
pub const CONNECTION_ENV: &str = "PARTITION_ROUTER_CONNECTION";

/// Default connection used when no partitioning is configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub provider: String,
    pub connection_string: String,
}

impl RegistryConfig {
    pub fn new(provider: impl Into<String>, connection_string: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            connection_string: connection_string.into(),
        }
    }

    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let provider = lookup(PROVIDER_ENV)
            .ok_or_else(|| Error::validation(PROVIDER_ENV, "environment variable is not set"))?;
        let connection_string = lookup(CONNECTION_ENV)
            .ok_or_else(|| Error::validation(CONNECTION_ENV, "environment variable is not set"))?;

        Ok(Self::new(provider, connection_string))
    }

    /// Validated descriptor for the configured connection.
    pub fn descriptor(&self) -> Result<ConnectionDescriptor> {
        ConnectionDescriptor::new(self.provider.clone(), self.connection_string.clone())
    }
}
