use thiserror::Error;

use crate::http::fetch::FetchError;
use crate::parser::error::ParseError;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lock poisoned")]
    LockPoisoned,

    /// Neither a fresh nor a stale copy of the resource is available
    #[error("Failed to retrieve {resource}: {reason}")]
    Retrieval { resource: String, reason: String },
}

#[derive(Debug, Error)]
pub enum VendorError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid model {model:?}: {reason}")]
    InvalidModel { model: String, reason: String },

    #[error("Invalid vendor configuration: {0}")]
    InvalidConfig(String),
}

impl VendorError {
    /// The vendor could not be reached or its data could not be obtained
    pub fn is_retrieval(&self) -> bool {
        matches!(
            self,
            VendorError::Fetch(_) | VendorError::Status { .. } | VendorError::Cache(_)
        )
    }

    /// The vendor's data was obtained but no longer has the expected shape
    pub fn is_parse(&self) -> bool {
        matches!(self, VendorError::Parse(_))
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Vendor registry has not been configured")]
    NotConfigured,

    #[error("Vendor registry is already configured")]
    AlreadyConfigured,

    #[error("Failed to create HTTP client: {0}")]
    Http(#[from] FetchError),

    #[error("Failed to initialize vendor {vendor_id}: {source}")]
    Vendor {
        vendor_id: String,
        source: VendorError,
    },
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Vendor not found: {0}")]
    VendorNotFound(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Vendor(#[from] VendorError),
}
