//! Registry configuration
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! owner = "workshop-7"
//! kind = "other"
//!
//! [keyspaces]
//! items = "items"
//! used_items = "usedItems"
//! code_index = "code2item"
//! data = "data"
//! counter_key = "autoIndex"
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Owner address reported by [`crate::Registry::info`]
    pub owner: String,
    /// Registry type tag, `"other"` by default
    pub kind: String,
    /// Names of the persisted namespaces
    pub keyspaces: KeyspaceNames,
}

impl RegistryConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With owner address
    #[inline]
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    /// With namespace names
    #[inline]
    #[must_use]
    pub fn with_keyspaces(mut self, keyspaces: KeyspaceNames) -> Self {
        self.keyspaces = keyspaces;
        self
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Check that the namespaces are usable
    ///
    /// Names must be non-empty and pairwise distinct; the counter key must be
    /// non-empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let names = self.keyspaces.namespaces();
        let mut seen = HashSet::new();
        for name in names {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid("keyspace names must not be empty".into()));
            }
            if !seen.insert(name) {
                return Err(ConfigError::Invalid(format!(
                    "keyspace '{name}' is used for more than one namespace"
                )));
            }
        }
        if self.keyspaces.counter_key.trim().is_empty() {
            return Err(ConfigError::Invalid("counter key must not be empty".into()));
        }
        Ok(())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            kind: "other".into(),
            keyspaces: KeyspaceNames::default(),
        }
    }
}

/// Names of the four persisted namespaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeyspaceNames {
    /// Records by id
    pub items: String,
    /// Consumer id by part id
    pub used_items: String,
    /// Item id by code
    pub code_index: String,
    /// Registry-wide values, holding the counter
    pub data: String,
    /// Key of the counter inside `data`
    pub counter_key: String,
}

impl KeyspaceNames {
    /// The four namespace names
    #[must_use]
    pub fn namespaces(&self) -> [&str; 4] {
        [&self.items, &self.used_items, &self.code_index, &self.data]
    }
}

impl Default for KeyspaceNames {
    fn default() -> Self {
        Self {
            items: "items".into(),
            used_items: "usedItems".into(),
            code_index: "code2item".into(),
            data: "data".into(),
            counter_key: "autoIndex".into(),
        }
    }
}
