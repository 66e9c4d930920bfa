//! OpenWrt table of hardware
//!
//! The whole hardware table is published as one gzipped tab-separated file
//! which is kept in the conditional cache. Devices are matched on a model
//! key built from the `brand`, `model` and `version` columns:
//!
//! ```text
//! TP-Link Archer C7 v2        brand + model + hardware version
//! Linksys WRT3200ACM          version column is the null marker
//! ```

use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::read::GzDecoder;
use tracing::{debug, warn};

use crate::config::OpenWrtConfig;
use crate::device::{Device, Release};
use crate::http::fetch::HttpFetcher;
use crate::parser::{CatalogReader, CatalogRow, Element, HtmlDocument, ParseError};
use crate::version::cache::ConditionalCache;
use crate::version::error::VendorError;
use crate::version::registry::{VendorContext, VendorDescriptor};
use crate::version::vendor::Vendor;

pub const ID: &str = "openwrt";

const DATABASE_KEY: &str = "openwrt-db.csv.gz";

const BRAND: &str = "brand";
const MODEL: &str = "model";
const HARDWARE_VERSION: &str = "version";
const CURRENT_RELEASE: &str = "supportedcurrentrel";
const UPGRADE_URL: &str = "firmwareopenwrtupgradeurl";

const REQUIRED_COLUMNS: &[&str] = &[BRAND, MODEL, HARDWARE_VERSION, CURRENT_RELEASE, UPGRADE_URL];

pub fn descriptor() -> VendorDescriptor {
    VendorDescriptor::new(ID, |context| Ok(Arc::new(OpenWrt::new(context))))
}

/// Row of the hardware table relevant to a lookup
#[derive(Debug, Clone, PartialEq, Eq)]
struct HardwareEntry {
    model: String,
    current_release: String,
    upgrade_url: String,
}

/// Details of a firmware image listed on a download index page
#[derive(Debug, Default, PartialEq, Eq)]
struct ImageMetadata {
    hash_type: Option<String>,
    hash_sum: Option<String>,
    file_size: Option<String>,
    release_date: Option<String>,
}

pub struct OpenWrt {
    fetcher: HttpFetcher,
    cache: Arc<ConditionalCache>,
    config: OpenWrtConfig,
}

impl OpenWrt {
    pub fn new(context: &VendorContext) -> Self {
        Self {
            fetcher: context.fetcher.clone(),
            cache: Arc::clone(&context.cache),
            config: context.config.openwrt.clone(),
        }
    }

    /// Local copy of the hardware table, refreshed when stale
    async fn database(&self) -> Result<PathBuf, VendorError> {
        let payload = self
            .cache
            .get_or_refresh(DATABASE_KEY, |headers| {
                self.fetcher.get(&self.config.database_url, headers)
            })
            .await?;
        debug!("Using OpenWrt database {:?} ({:?})", payload.path, payload.freshness);
        Ok(payload.path)
    }

    fn is_supported(&self, release: &str) -> bool {
        !self
            .config
            .unsupported_release_markers
            .iter()
            .any(|marker| marker == release.trim())
    }

    fn docs_url(&self, version: &str) -> String {
        let series: Vec<&str> = version.split('.').take(2).collect();
        format!(
            "{}/{}/notes-{}",
            self.config.release_notes_url.trim_end_matches('/'),
            series.join("."),
            version
        )
    }

    /// Hash, size and date of the image from its download directory listing
    async fn image_metadata(&self, upgrade_url: &str) -> Option<ImageMetadata> {
        let (index_url, filename) = upgrade_url.rsplit_once('/')?;
        if filename.is_empty() {
            return None;
        }

        let page = match self.fetcher.get_document(&format!("{index_url}/")).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Failed to download release metadata for {}: {}", filename, e);
                return None;
            }
        };

        match parse_image_metadata(&page, filename) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!("Failed to read release metadata for {}: {}", filename, e);
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl Vendor for OpenWrt {
    fn id(&self) -> &'static str {
        ID
    }

    fn name(&self) -> &'static str {
        "OpenWrt"
    }

    async fn get_latest(&self, device: &Device) -> Result<Option<Release>, VendorError> {
        let path = self.database().await?;
        let model = device.model.clone();
        let null_marker = self.config.null_version_marker.clone();

        let entry = tokio::task::spawn_blocking(move || find_entry(&path, &model, &null_marker))
            .await
            .map_err(std::io::Error::from)??;

        let Some(entry) = entry else {
            warn!("Failed to find any released versions for {}", device.model);
            return Ok(None);
        };

        if !self.is_supported(&entry.current_release) {
            debug!(
                "{} has no supported release ({:?})",
                device.model, entry.current_release
            );
            return Ok(None);
        }

        let version = entry.current_release.trim().to_string();
        let mut release = Release::new(&version);
        release.docs_url = Some(self.docs_url(&version));

        let upgrade_url = entry.upgrade_url.trim();
        if !upgrade_url.is_empty() {
            release.download_url = Some(upgrade_url.to_string());
            if let Some(metadata) = self.image_metadata(upgrade_url).await {
                release.hash_type = metadata.hash_type;
                release.hash_sum = metadata.hash_sum;
                release.file_size = metadata.file_size;
                release.release_date = metadata.release_date;
            }
        }

        Ok(Some(release))
    }

    async fn supported_devices(&self) -> Result<Option<Vec<String>>, VendorError> {
        let path = self.database().await?;
        let null_marker = self.config.null_version_marker.clone();

        let entries = tokio::task::spawn_blocking(move || read_entries(&path, &null_marker))
            .await
            .map_err(std::io::Error::from)??;

        let models = entries
            .into_iter()
            .filter(|entry| self.is_supported(&entry.current_release))
            .map(|entry| entry.model)
            .collect();

        Ok(Some(models))
    }
}

fn model_key(row: &CatalogRow, null_marker: &str) -> String {
    let brand = row.get(BRAND).unwrap_or_default();
    let model = row.get(MODEL).unwrap_or_default();
    match row.get(HARDWARE_VERSION).unwrap_or_default() {
        version if version == null_marker => format!("{brand} {model}"),
        version => format!("{brand} {model} {version}"),
    }
}

fn to_entry(row: &CatalogRow, null_marker: &str) -> HardwareEntry {
    HardwareEntry {
        model: model_key(row, null_marker),
        current_release: row.get(CURRENT_RELEASE).unwrap_or_default().to_string(),
        upgrade_url: row.get(UPGRADE_URL).unwrap_or_default().to_string(),
    }
}

fn open_database(path: &Path) -> Result<CatalogReader<BufReader<GzDecoder<std::fs::File>>>, VendorError> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(GzDecoder::new(file));
    Ok(CatalogReader::new(reader, REQUIRED_COLUMNS)?)
}

/// First row whose model key equals `model` exactly
fn find_entry(
    path: &Path,
    model: &str,
    null_marker: &str,
) -> Result<Option<HardwareEntry>, VendorError> {
    for row in open_database(path)? {
        let row = row?;
        if model_key(&row, null_marker) == model {
            return Ok(Some(to_entry(&row, null_marker)));
        }
    }
    Ok(None)
}

fn read_entries(path: &Path, null_marker: &str) -> Result<Vec<HardwareEntry>, VendorError> {
    open_database(path)?
        .map(|row| Ok(to_entry(&row?, null_marker)))
        .collect()
}

/// Reads the listing table of a download directory
///
/// The header row names the columns as file name, hash algorithm, size and
/// date; the image row is the one linking to `filename`.
fn parse_image_metadata(page: &str, filename: &str) -> Result<ImageMetadata, ParseError> {
    let document = HtmlDocument::parse(page)?;
    let root = document.root();

    let table = root
        .find(|e| e.is("table"))
        .ok_or_else(|| ParseError::MissingElement("table".to_string()))?;

    let hash_type = table
        .find_all(|e| e.is("th"))
        .get(1)
        .map(|th| th.text())
        .filter(|text| !text.is_empty());

    let name_cell = table
        .find(|e| e.is("a") && e.attr("href").as_deref() == Some(filename))
        .and_then(|link| link.closest("td"))
        .ok_or_else(|| ParseError::MissingElement(format!("link to {filename}")))?;

    let hash_cell = name_cell.next_sibling_element();
    let size_cell = hash_cell.and_then(|cell| cell.next_sibling_element());
    let date_cell = size_cell.and_then(|cell| cell.next_sibling_element());

    Ok(ImageMetadata {
        hash_type,
        hash_sum: cell_text(hash_cell),
        file_size: cell_text(size_cell),
        release_date: cell_text(date_cell),
    })
}

fn cell_text(cell: Option<Element<'_>>) -> Option<String> {
    cell.map(|cell| cell.text()).filter(|text| !text.is_empty())
}
