//! Update detection for registered devices

use std::cmp::Ordering;

use futures::future::join_all;
use tracing::{debug, error, info};

use crate::device::{Device, Release};
use crate::version::compare::compare_versions;
use crate::version::error::ResolveError;
use crate::version::registry::VendorRegistry;

/// Outcome of checking one device against its vendor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStatus {
    pub update_available: bool,
    /// Newest release published by the vendor, if any
    pub release: Option<Release>,
}

/// Whether `release` is newer than the installed version.
///
/// A device without a recorded version always has an update.
pub fn is_update(installed: Option<&str>, release: &Release) -> bool {
    match installed {
        None => true,
        Some(installed) => compare_versions(installed, &release.version) == Ordering::Less,
    }
}

/// Resolves devices against the vendors of a configured registry
pub struct Resolver {
    registry: VendorRegistry,
}

impl Resolver {
    pub fn new(registry: VendorRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &VendorRegistry {
        &self.registry
    }

    pub async fn device_has_update(&self, device: &Device) -> Result<UpdateStatus, ResolveError> {
        let vendor = self
            .registry
            .get(&device.vendor_id)?
            .ok_or_else(|| ResolveError::VendorNotFound(device.vendor_id.clone()))?;

        let Some(release) = vendor.get_latest(device).await? else {
            debug!("No release published for {} {}", device.vendor_id, device.model);
            return Ok(UpdateStatus {
                update_available: false,
                release: None,
            });
        };

        let update_available = is_update(device.version.as_deref(), &release);
        debug!(
            "{} {}: installed {:?}, latest {} (update: {})",
            device.vendor_id, device.model, device.version, release.version, update_available
        );

        Ok(UpdateStatus {
            update_available,
            release: Some(release),
        })
    }

    /// Check every device concurrently.
    ///
    /// Results keep the order of `devices`. A failure is logged and reported
    /// for its device only.
    pub async fn check_devices(
        &self,
        devices: &[Device],
    ) -> Vec<Result<UpdateStatus, ResolveError>> {
        let futures = devices.iter().map(|device| async move {
            let result = self.device_has_update(device).await;
            if let Err(e) = &result {
                error!(
                    "Failed to check {} {}: {}",
                    device.vendor_id, device.model, e
                );
            }
            result
        });

        let results = join_all(futures).await;
        let updates = results
            .iter()
            .filter(|r| matches!(r, Ok(status) if status.update_available))
            .count();
        info!("Checked {} devices, {} with updates", devices.len(), updates);

        results
    }
}
