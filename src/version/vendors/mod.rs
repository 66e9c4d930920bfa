//! Built-in vendor implementations

pub mod netgear;
pub mod openwrt;

pub use netgear::Netgear;
pub use openwrt::OpenWrt;

use crate::version::registry::VendorDescriptor;

/// Descriptors of every vendor shipped with the crate
pub fn builtin() -> Vec<VendorDescriptor> {
    vec![openwrt::descriptor(), netgear::descriptor()]
}
