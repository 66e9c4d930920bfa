//! Vendor trait for looking up published firmware

#[cfg(test)]
use mockall::automock;

use crate::device::{Device, Release};
use crate::version::error::VendorError;

/// Trait implemented once per device manufacturer
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Vendor: Send + Sync {
    /// Stable identifier stored with each device (e.g., "openwrt")
    fn id(&self) -> &'static str;

    /// Display name
    fn name(&self) -> &'static str;

    /// Looks up the newest firmware published for `device`
    ///
    /// # Returns
    /// * `Ok(Some(Release))` - The vendor publishes firmware for the model
    /// * `Ok(None)` - Nothing is published for the model
    /// * `Err(VendorError)` - The vendor could not be queried or its data
    ///   could not be understood
    async fn get_latest(&self, device: &Device) -> Result<Option<Release>, VendorError>;

    /// Model names this vendor knows about, or `None` if enumeration is
    /// not supported
    async fn supported_devices(&self) -> Result<Option<Vec<String>>, VendorError> {
        Ok(None)
    }

    /// Asks the device itself for its running version, or `None` if the
    /// vendor cannot do that
    async fn retrieve_device_version(&self, _device: &Device) -> Result<Option<String>, VendorError> {
        Ok(None)
    }
}
