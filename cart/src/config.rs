//! Configuration management for the cart.
//!
//! Loads configuration from environment variables with sensible defaults.

use pharmacart_runtime::StoreConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Invalid cart configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// `PHARMACART_PERSISTENCE` holds an unknown mode
    #[error("unknown persistence mode {0:?} (expected file, memory or none)")]
    UnknownPersistence(String),

    /// The storage key is empty or whitespace
    #[error("storage key must not be blank")]
    BlankStorageKey,

    /// The broadcast capacity is zero
    #[error("broadcast capacity must be at least 1")]
    ZeroBroadcastCapacity,
}

/// Where the cart keeps its durable copy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceMode {
    /// One file per key under the data directory
    #[default]
    File,
    /// In process memory; survives nothing
    Memory,
    /// No durable copy at all
    None,
}

impl FromStr for PersistenceMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            "none" => Ok(Self::None),
            _ => Err(ConfigError::UnknownPersistence(s.to_string())),
        }
    }
}

/// Cart configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartConfig {
    /// Directory holding the file store (default: `./.pharmacart`)
    pub data_dir: PathBuf,
    /// Key the cart blob is stored under (default: `pharmacart.cart`)
    pub storage_key: String,
    /// Capacity of the effect feedback channel (default: 16)
    pub broadcast_capacity: usize,
    /// How long shutdown waits for outstanding writes (default: 5s)
    pub shutdown_timeout: Duration,
    /// Storage backend (default: file)
    pub persistence: PersistenceMode,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./.pharmacart"),
            storage_key: "pharmacart.cart".to_string(),
            broadcast_capacity: 16,
            shutdown_timeout: Duration::from_secs(5),
            persistence: PersistenceMode::File,
        }
    }
}

impl CartConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a value is present but unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// Unparseable numbers fall back to their defaults; an unknown
    /// persistence mode is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the resulting configuration is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            data_dir: lookup("PHARMACART_DATA_DIR")
                .map_or(defaults.data_dir, PathBuf::from),
            storage_key: lookup("PHARMACART_STORAGE_KEY").unwrap_or(defaults.storage_key),
            broadcast_capacity: lookup("PHARMACART_BROADCAST_CAPACITY")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.broadcast_capacity),
            shutdown_timeout: lookup("PHARMACART_SHUTDOWN_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map_or(defaults.shutdown_timeout, Duration::from_secs),
            persistence: lookup("PHARMACART_PERSISTENCE")
                .map(|s| s.parse::<PersistenceMode>())
                .transpose()?
                .unwrap_or(defaults.persistence),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for unusable values
    ///
    /// # Errors
    ///
    /// - [`ConfigError::BlankStorageKey`]: the storage key is blank
    /// - [`ConfigError::ZeroBroadcastCapacity`]: the broadcast capacity is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_key.trim().is_empty() {
            return Err(ConfigError::BlankStorageKey);
        }
        if self.broadcast_capacity == 0 {
            return Err(ConfigError::ZeroBroadcastCapacity);
        }
        Ok(())
    }

    /// Runtime settings derived from this configuration
    #[must_use]
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::default()
            .with_broadcast_capacity(self.broadcast_capacity)
            .with_shutdown_timeout(self.shutdown_timeout)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = CartConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, CartConfig::default());
        assert_eq!(config.data_dir, PathBuf::from("./.pharmacart"));
        assert_eq!(config.storage_key, "pharmacart.cart");
        assert_eq!(config.broadcast_capacity, 16);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(config.persistence, PersistenceMode::File);
    }

    #[test]
    fn reads_overrides() {
        let config = CartConfig::from_lookup(lookup(&[
            ("PHARMACART_DATA_DIR", "/var/lib/pharmacart"),
            ("PHARMACART_STORAGE_KEY", "cart-v2"),
            ("PHARMACART_BROADCAST_CAPACITY", "64"),
            ("PHARMACART_SHUTDOWN_TIMEOUT_SECS", "12"),
            ("PHARMACART_PERSISTENCE", "Memory"),
        ]))
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/pharmacart"));
        assert_eq!(config.storage_key, "cart-v2");
        assert_eq!(config.broadcast_capacity, 64);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(12));
        assert_eq!(config.persistence, PersistenceMode::Memory);

        let store_config = config.store_config();
        assert_eq!(store_config.broadcast_capacity, 64);
        assert_eq!(store_config.default_shutdown_timeout, Duration::from_secs(12));
    }

    #[test]
    fn unparseable_numbers_fall_back() {
        let config = CartConfig::from_lookup(lookup(&[
            ("PHARMACART_BROADCAST_CAPACITY", "lots"),
            ("PHARMACART_SHUTDOWN_TIMEOUT_SECS", "-1"),
        ]))
        .unwrap();
        assert_eq!(config.broadcast_capacity, 16);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_invalid_values() {
        assert_eq!(
            CartConfig::from_lookup(lookup(&[("PHARMACART_PERSISTENCE", "cloud")])),
            Err(ConfigError::UnknownPersistence("cloud".to_string()))
        );
        assert_eq!(
            CartConfig::from_lookup(lookup(&[("PHARMACART_STORAGE_KEY", " ")])),
            Err(ConfigError::BlankStorageKey)
        );
        assert_eq!(
            CartConfig::from_lookup(lookup(&[("PHARMACART_BROADCAST_CAPACITY", "0")])),
            Err(ConfigError::ZeroBroadcastCapacity)
        );
    }
}
