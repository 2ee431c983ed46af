//! Error types for the registry
//!
//! - [`RegistryError`]: everything an operation can fail with
//! - [`StoreError`]: failures of the key-value backend
//! - [`ConfigError`]: configuration loading and validation

use crate::types::ItemId;
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

/// Main registry error type
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A required field is missing or malformed
    #[error("invalid {field}: {reason}")]
    Validation {
        /// Name of the offending input field
        field: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// A part id is not strictly less than the id being created
    #[error("part {part} cannot be included in item {item}: parts must be previously registered items")]
    ForwardOrSelfReference {
        /// Offending part id
        part: ItemId,
        /// Id the new item would have received
        item: ItemId,
    },

    /// A part is already consumed by another item
    #[error("part {part} is already used in item {consumer}")]
    PartAlreadyUsed {
        /// Offending part id
        part: ItemId,
        /// Item that consumed it
        consumer: ItemId,
    },

    /// The code is bound to another item
    #[error("code '{code}' is already defined by item {owner}")]
    DuplicateCode {
        /// Requested code
        code: String,
        /// Current owner
        owner: ItemId,
    },

    /// No record for the id or code
    #[error("{0} not found")]
    NotFound(Lookup),

    /// Item is already in the terminal broken state
    #[error("item {id} is already marked as broken")]
    AlreadyBroken {
        /// Item id
        id: ItemId,
    },

    /// The id counter cannot advance any further
    #[error("item id space exhausted")]
    IdSpaceExhausted,

    /// Backend failure
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Output could not be serialized
    #[error("cannot serialize result: {0}")]
    Encode(#[from] serde_json::Error),

    /// Registry was opened with an unusable configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Stable error category, independent of payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ErrorKind {
    /// Malformed or missing request field
    Validation,
    /// Part id not strictly below the new id
    ForwardOrSelfReference,
    /// Part already consumed by another item
    PartAlreadyUsed,
    /// Code already taken
    DuplicateCode,
    /// No item for the given id or code
    NotFound,
    /// Item was already marked broken
    AlreadyBroken,
    /// No ids left to assign
    IdSpaceExhausted,
    /// Backend failure or corrupt data
    Store,
    /// Result could not be serialized
    Encode,
    /// Unusable configuration
    Config,
}

impl RegistryError {
    /// Shorthand for a validation failure
    #[inline]
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Category of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::ForwardOrSelfReference { .. } => ErrorKind::ForwardOrSelfReference,
            Self::PartAlreadyUsed { .. } => ErrorKind::PartAlreadyUsed,
            Self::DuplicateCode { .. } => ErrorKind::DuplicateCode,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyBroken { .. } => ErrorKind::AlreadyBroken,
            Self::IdSpaceExhausted => ErrorKind::IdSpaceExhausted,
            Self::Store(_) => ErrorKind::Store,
            Self::Encode(_) => ErrorKind::Encode,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// True if the caller's request was at fault
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::Store(_) | Self::IdSpaceExhausted | Self::Encode(_) | Self::Config(_)
        )
    }

    /// True if repeating the same call may succeed
    ///
    /// The registry never retries on its own.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(StoreError::Backend(_)))
    }
}

/// Key used in a failed lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Looked up by id
    Id(ItemId),
    /// Looked up by code
    Code(String),
}

impl Display for Lookup {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Id(id) => write!(f, "item {id}"),
            Lookup::Code(code) => write!(f, "item with code '{code}'"),
        }
    }
}

/// Key-value backend errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend rejected or failed the request
    #[error("backend failure: {0}")]
    Backend(String),

    /// Stored bytes did not decode
    #[error("corrupt value at {namespace}/{key}: {source}")]
    Corrupt {
        /// Namespace holding the value
        namespace: String,
        /// Key of the value
        key: String,
        /// Decoder error
        #[source]
        source: serde_json::Error,
    },

    /// Value could not be encoded
    #[error("cannot encode value for {namespace}/{key}: {source}")]
    Encode {
        /// Target namespace
        namespace: String,
        /// Target key
        key: String,
        /// Encoder error
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for [`RegistryConfig`](crate::config::RegistryConfig)
    #[error("malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parsed but are out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result alias for registry operations
pub type Result<T, E = RegistryError> = std::result::Result<T, E>;
