//! Firmware update checks for home network devices
//!
//! - [`device`]: device descriptors and vendor releases
//! - [`version`]: vendors, registry, conditional cache and update detection
//! - [`http`]: bounded HTTP fetches and freshness rules
//! - [`parser`]: HTML and tab-separated catalog parsing
//! - [`config`]: configuration file model
//! - [`logging`]: subscriber setup for the binary

pub mod config;
pub mod device;
pub mod http;
pub mod logging;
pub mod parser;
pub mod version;
