//! Firmware version layer
//!
//! This module resolves a device to the newest firmware its vendor
//! publishes and decides whether the device needs an update.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Resolver   │────▶│  Registry   │────▶│   Vendor    │
//! │  (checker)  │     │ (id lookup) │     │(get_latest) │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        │                                       │
//!        ▼                                       ▼
//! ┌─────────────┐                         ┌─────────────┐
//! │   Compare   │                         │    Cache    │
//! │(version cmp)│                         │(conditional)│
//! └─────────────┘                         └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`cache`]: Disk-backed conditional cache for vendor datasets
//! - [`checker`]: Update detection for single devices and bulk checks
//! - [`compare`]: Version ordering shared by vendors and the checker
//! - [`registry`]: Vendor registration and one-time instantiation
//! - [`vendor`]: Vendor trait
//! - [`vendors`]: Concrete vendors (OpenWrt, Netgear)
//! - [`error`]: Error types for cache, vendor, registry and resolution

pub mod cache;
pub mod checker;
pub mod compare;
pub mod error;
pub mod registry;
pub mod vendor;
pub mod vendors;
