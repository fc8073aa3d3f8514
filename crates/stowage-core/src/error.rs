use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by a storage backend primitive.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The service understood the request and refused it (auth, bad name, policy).
    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Which half of container provisioning failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningStage {
    Create,
    SetPermissions,
}

impl fmt::Display for ProvisioningStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisioningStage::Create => write!(f, "create"),
            ProvisioningStage::SetPermissions => write!(f, "set permissions"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("page {page} fetch failed: {source}")]
    Page {
        page: u32,
        #[source]
        source: StorageError,
    },

    #[error("listing exceeded the configured limit of {limit} pages")]
    PageLimitExceeded { limit: u32 },
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("local file {path}: {source}")]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("blob {container}/{blob} not found")]
    NotFound { container: String, blob: String },

    #[error("blob {container}/{blob}: {source}")]
    Remote {
        container: String,
        blob: String,
        #[source]
        source: StorageError,
    },
}

#[derive(Debug, Error)]
pub enum StowageError {
    // Construction
    #[error("Configuration error: {0}")]
    Configuration(String),

    // Provisioning
    #[error("Container provisioning failed for '{container}' ({stage}): {source}")]
    Provisioning {
        container: String,
        stage: ProvisioningStage,
        #[source]
        source: StorageError,
    },

    // Listing
    #[error("Listing failed for '{container}': {source}")]
    Listing {
        container: String,
        #[source]
        source: ListingError,
    },

    // Transfers
    #[error("Transfer failed: {0}")]
    Transfer(#[from] TransferError),

    // Config file
    #[error("Configuration file not found at {0}")]
    ConfigNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(String),

    #[error("TOML serialization error: {0}")]
    TomlSer(String),
}

impl StowageError {
    pub fn config(msg: impl Into<String>) -> Self {
        StowageError::Configuration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, StowageError>;
