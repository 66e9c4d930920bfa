//! Vendor registry
//!
//! Vendors are registered as descriptors (an identifier plus a factory) and
//! instantiated exactly once by [`VendorRegistry::configure`]. Lookups made
//! before configuration fail with [`RegistryError::NotConfigured`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{AppConfig, VendorsConfig};
use crate::http::fetch::{FetchError, HttpFetcher};
use crate::version::cache::ConditionalCache;
use crate::version::error::{RegistryError, VendorError};
use crate::version::vendor::Vendor;
use crate::version::vendors;

/// Shared resources handed to every vendor factory
#[derive(Clone)]
pub struct VendorContext {
    pub fetcher: HttpFetcher,
    pub cache: Arc<ConditionalCache>,
    pub config: VendorsConfig,
}

impl VendorContext {
    pub fn from_config(config: &AppConfig) -> Result<Self, FetchError> {
        Ok(Self {
            fetcher: HttpFetcher::new(config.fetch_timeout())?,
            cache: Arc::new(ConditionalCache::new(config.cache_dir())),
            config: config.vendors.clone(),
        })
    }
}

pub type VendorFactory =
    Arc<dyn Fn(&VendorContext) -> Result<Arc<dyn Vendor>, VendorError> + Send + Sync>;

/// Registration entry for a vendor implementation
#[derive(Clone)]
pub struct VendorDescriptor {
    pub id: &'static str,
    pub factory: VendorFactory,
}

impl VendorDescriptor {
    pub fn new<F>(id: &'static str, factory: F) -> Self
    where
        F: Fn(&VendorContext) -> Result<Arc<dyn Vendor>, VendorError> + Send + Sync + 'static,
    {
        Self {
            id,
            factory: Arc::new(factory),
        }
    }
}

impl fmt::Debug for VendorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VendorDescriptor").field("id", &self.id).finish()
    }
}

#[derive(Default)]
pub struct VendorRegistry {
    descriptors: BTreeMap<&'static str, VendorFactory>,
    context: Option<VendorContext>,
    vendors: Option<BTreeMap<&'static str, Arc<dyn Vendor>>>,
}

impl VendorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in vendor registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for descriptor in vendors::builtin() {
            // Not configured yet, so registration cannot fail
            let _ = registry.register(descriptor);
        }
        registry
    }

    /// Associate `descriptor.id` with its factory.
    ///
    /// A second registration for the same identifier replaces the first.
    /// Registering into an already configured registry instantiates the
    /// vendor immediately.
    pub fn register(&mut self, descriptor: VendorDescriptor) -> Result<(), RegistryError> {
        if self
            .descriptors
            .insert(descriptor.id, Arc::clone(&descriptor.factory))
            .is_some()
        {
            warn!(
                "Vendor {} registered more than once, replacing previous registration",
                descriptor.id
            );
        }

        if let (Some(context), Some(vendors)) = (&self.context, &mut self.vendors) {
            let vendor = instantiate(descriptor.id, &descriptor.factory, context)?;
            vendors.insert(descriptor.id, vendor);
        }

        Ok(())
    }

    pub fn unregister(&mut self, id: &str) {
        self.descriptors.remove(id);
        if let Some(vendors) = &mut self.vendors {
            vendors.remove(id);
        }
    }

    /// Instantiate every registered vendor once with the shared configuration
    pub fn configure(&mut self, config: &AppConfig) -> Result<(), RegistryError> {
        let context = VendorContext::from_config(config)?;
        self.configure_with(context)
    }

    pub fn configure_with(&mut self, context: VendorContext) -> Result<(), RegistryError> {
        if self.vendors.is_some() {
            return Err(RegistryError::AlreadyConfigured);
        }

        let mut vendors = BTreeMap::new();
        for (&id, factory) in &self.descriptors {
            vendors.insert(id, instantiate(id, factory, &context)?);
        }
        debug!("Configured {} vendors", vendors.len());

        self.context = Some(context);
        self.vendors = Some(vendors);
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.vendors.is_some()
    }

    /// Look up a configured vendor; unknown identifiers yield `Ok(None)`
    pub fn get(&self, id: &str) -> Result<Option<Arc<dyn Vendor>>, RegistryError> {
        let vendors = self.vendors.as_ref().ok_or(RegistryError::NotConfigured)?;
        Ok(vendors.get(id).cloned())
    }

    /// Registered identifiers in sorted order
    pub fn ids(&self) -> Vec<&'static str> {
        self.descriptors.keys().copied().collect()
    }

    /// Configured vendors ordered by identifier
    pub fn vendors(&self) -> Result<Vec<Arc<dyn Vendor>>, RegistryError> {
        let vendors = self.vendors.as_ref().ok_or(RegistryError::NotConfigured)?;
        Ok(vendors.values().cloned().collect())
    }
}

fn instantiate(
    id: &'static str,
    factory: &VendorFactory,
    context: &VendorContext,
) -> Result<Arc<dyn Vendor>, RegistryError> {
    factory(context).map_err(|source| RegistryError::Vendor {
        vendor_id: id.to_string(),
        source,
    })
}
