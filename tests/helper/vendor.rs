//! Vendor test utilities

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::TempDir;

use homenet_check::config::VendorsConfig;
use homenet_check::device::{Device, Release};
use homenet_check::http::HttpFetcher;
use homenet_check::version::cache::ConditionalCache;
use homenet_check::version::error::VendorError;
use homenet_check::version::registry::{VendorContext, VendorDescriptor, VendorRegistry};
use homenet_check::version::vendor::Vendor;

/// Vendor answering from a fixed model → release table
pub struct StubVendor {
    id: &'static str,
    releases: HashMap<String, Release>,
    failing: Vec<String>,
    calls: AtomicUsize,
}

impl StubVendor {
    pub fn new(id: &'static str) -> Self {
        Self {
            id,
            releases: HashMap::new(),
            failing: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_release(mut self, model: &str, version: &str) -> Self {
        self.releases
            .insert(model.to_string(), Release::new(version));
        self
    }

    /// Lookups for `model` fail as if the vendor were unreachable
    pub fn with_failure(mut self, model: &str) -> Self {
        self.failing.push(model.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Vendor for StubVendor {
    fn id(&self) -> &'static str {
        self.id
    }

    fn name(&self) -> &'static str {
        "Stub"
    }

    async fn get_latest(&self, device: &Device) -> Result<Option<Release>, VendorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&device.model) {
            return Err(VendorError::Status {
                status: 503,
                url: format!("https://{}.example/{}", self.id, device.model),
            });
        }
        Ok(self.releases.get(&device.model).cloned())
    }

    async fn supported_devices(&self) -> Result<Option<Vec<String>>, VendorError> {
        let mut models: Vec<String> = self.releases.keys().cloned().collect();
        models.sort();
        Ok(Some(models))
    }
}

/// Shared resources backed by a temporary cache directory
pub fn create_test_context(config: VendorsConfig) -> (TempDir, VendorContext) {
    let temp_dir = TempDir::new().unwrap();
    let context = VendorContext {
        fetcher: HttpFetcher::new(Duration::from_secs(5)).unwrap(),
        cache: Arc::new(ConditionalCache::new(temp_dir.path())),
        config,
    };
    (temp_dir, context)
}

/// Configured registry holding the given vendor instances
pub fn create_test_registry(vendors: Vec<Arc<dyn Vendor>>) -> (TempDir, VendorRegistry) {
    let (temp_dir, context) = create_test_context(VendorsConfig::default());
    let mut registry = VendorRegistry::new();
    for vendor in vendors {
        let id = vendor.id();
        registry
            .register(VendorDescriptor::new(id, move |_| Ok(Arc::clone(&vendor))))
            .unwrap();
    }
    registry.configure_with(context).unwrap();
    (temp_dir, registry)
}

pub fn gzip(content: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap()
}
