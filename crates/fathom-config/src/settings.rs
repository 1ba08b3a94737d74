//! Immutable settings with copy-on-write overlays.
//!
//! A [`Settings`] value never changes after it is built. Deriving a
//! per-worker configuration goes through [`Settings::with_value`], which
//! layers a single override on top of a copy of the receiver.

use crate::{ConfigError, FathomConfig};
use serde::de::DeserializeOwned;

/// Resolved configuration shared by the harness and the servers it launches.
#[derive(Debug, Clone)]
pub struct Settings {
    inner: config::Config,
}

impl Settings {
    /// Wraps an already-built configuration.
    pub fn from_config(inner: config::Config) -> Self {
        Self { inner }
    }

    /// Settings containing only the built-in defaults.
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::from_typed(&FathomConfig::default())
    }

    /// Builds settings from a typed configuration.
    pub fn from_typed(config: &FathomConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            inner: config::Config::try_from(config)?,
        })
    }

    /// Returns a copy of these settings with `key` set to `value`.
    pub fn with_value<V>(&self, key: &str, value: V) -> Result<Self, ConfigError>
    where
        V: Into<config::Value>,
    {
        let inner = config::Config::builder()
            .add_source(self.inner.clone())
            .set_override(key, value)?
            .build()?;

        Ok(Self { inner })
    }

    pub fn get_int(&self, key: &str) -> Result<i64, ConfigError> {
        Ok(self.inner.get_int(key)?)
    }

    pub fn get_string(&self, key: &str) -> Result<String, ConfigError> {
        Ok(self.inner.get_string(key)?)
    }

    /// Like [`Settings::get_string`], but a missing key is `None`.
    pub fn get_optional_string(&self, key: &str) -> Result<Option<String>, ConfigError> {
        self.get_optional(key)
    }

    /// Like [`Settings::get`], but a missing key is `None`.
    ///
    /// Empty lists and unset options leave no key behind once serialized, so
    /// such values must be read through this.
    pub fn get_optional<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.inner.get(key) {
            Ok(value) => Ok(Some(value)),
            Err(config::ConfigError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Reads an integer key and checks that it is a valid TCP port.
    pub fn get_port(&self, key: &str) -> Result<u16, ConfigError> {
        let raw = self.get_int(key)?;
        u16::try_from(raw).map_err(|_| ConfigError::ValidationError {
            key: key.to_string(),
            reason: format!("{raw} is not a valid port"),
        })
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        Ok(self.inner.get(key)?)
    }

    /// Deserializes the whole configuration into `T`.
    pub fn try_deserialize<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        Ok(self.inner.clone().try_deserialize()?)
    }

    /// Renders the effective configuration as a TOML document.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        let table: toml::Table = self.try_deserialize()?;
        Ok(toml::to_string_pretty(&table)?)
    }
}
