//! Device descriptors consumed by the resolver and the releases it produces

use serde::{Deserialize, Serialize};

/// A registered network device as supplied by the inventory layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Vendor identifier (e.g., "openwrt", "netgear")
    pub vendor_id: String,
    /// Vendor-specific model string (e.g., "TP-Link Archer C7 v2")
    pub model: String,
    /// Firmware version currently installed, if known
    #[serde(default)]
    pub version: Option<String>,
    /// Network address of the device
    #[serde(default)]
    pub address: Option<String>,
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
}

impl Device {
    pub fn new(vendor_id: &str, model: &str) -> Self {
        Self {
            vendor_id: vendor_id.to_string(),
            model: model.to_string(),
            version: None,
            address: None,
            description: None,
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }
}

/// Metadata describing one published firmware version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub version: String,
    pub download_url: Option<String>,
    pub docs_url: Option<String>,
    /// Name of the digest algorithm for `hash_sum` (e.g., "sha256sum")
    pub hash_type: Option<String>,
    pub hash_sum: Option<String>,
    /// Human readable size as published by the vendor (e.g., "5.2 MB")
    pub file_size: Option<String>,
    pub release_date: Option<String>,
    pub notes: Option<String>,
}

impl Release {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            ..Default::default()
        }
    }
}
