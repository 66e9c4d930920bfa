//! Netgear support site
//!
//! Most products have a support page listing their latest firmware
//! downloads. Cable modems are the exception: their firmware is pushed by
//! the provider, so the version comes from a knowledge base table with one
//! column per provider and the model must name the provider:
//! `"CM1000 [Comcast]"`.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use reqwest::Url;
use tracing::{debug, warn};

use crate::config::NetgearConfig;
use crate::device::{Device, Release};
use crate::http::fetch::HttpFetcher;
use crate::parser::{Element, HtmlDocument, ParseError};
use crate::version::compare::max_by_version;
use crate::version::error::VendorError;
use crate::version::registry::{VendorContext, VendorDescriptor};
use crate::version::vendor::Vendor;

pub const ID: &str = "netgear";

static CABLE_MODEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]+[0-9vV]+) \[([A-Za-z]+)\]").unwrap());

static FILE_SIZE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"File\ssize:\s([0-9.]+\s*[A-Za-z]+)").unwrap());

pub fn descriptor() -> VendorDescriptor {
    VendorDescriptor::new(ID, |context| Ok(Arc::new(Netgear::new(context)?)))
}

/// A download entry from the support page
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    version: String,
    download_url: Option<String>,
    docs_url: Option<String>,
    file_size: Option<String>,
}

pub struct Netgear {
    fetcher: HttpFetcher,
    config: NetgearConfig,
    title_pattern: Regex,
}

impl Netgear {
    pub fn new(context: &VendorContext) -> Result<Self, VendorError> {
        let config = context.config.netgear.clone();
        let title_pattern = Regex::new(&config.title_pattern).map_err(|e| {
            VendorError::InvalidConfig(format!("netgear title pattern: {e}"))
        })?;

        Ok(Self {
            fetcher: context.fetcher.clone(),
            config,
            title_pattern,
        })
    }

    fn is_cable_model(&self, model: &str) -> bool {
        self.config
            .cable_model_prefixes
            .iter()
            .any(|prefix| model.starts_with(prefix.as_str()))
    }

    fn support_url(&self, model: &str) -> Result<String, VendorError> {
        let mut url = Url::parse(&self.config.support_url)
            .map_err(|e| VendorError::InvalidConfig(format!("netgear support url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| VendorError::InvalidConfig("netgear support url".to_string()))?
            .pop_if_empty()
            .push(model);
        Ok(url.to_string())
    }

    async fn support_page_latest(&self, device: &Device) -> Result<Option<Release>, VendorError> {
        let url = self.support_url(&device.model)?;
        let page = self.fetcher.get_document(&url).await?;
        let candidates = parse_support_page(&page, &self.title_pattern)?;

        let latest = max_by_version(candidates, |candidate| candidate.version.as_str());

        let Some(latest) = latest else {
            warn!("Failed to find any released versions for {}", device.model);
            return Ok(None);
        };

        Ok(Some(Release {
            version: latest.version,
            download_url: latest.download_url,
            docs_url: latest.docs_url,
            file_size: latest.file_size,
            ..Default::default()
        }))
    }

    async fn cable_modem_latest(&self, device: &Device) -> Result<Option<Release>, VendorError> {
        let captures = CABLE_MODEL_REGEX.captures(&device.model).ok_or_else(|| {
            VendorError::InvalidModel {
                model: device.model.clone(),
                reason: "cable modems must be named \"<model id> [<provider>]\"".to_string(),
            }
        })?;
        let model_id = &captures[1];
        let provider = self
            .config
            .provider_aliases
            .get(&captures[2])
            .map(String::as_str)
            .unwrap_or(&captures[2]);

        let url = &self.config.cable_firmware_url;
        let page = self.fetcher.get_document(url).await?;

        let Some(version) = parse_cable_table(&page, model_id, provider)? else {
            warn!("{} is not listed in the cable modem firmware table", model_id);
            return Ok(None);
        };

        Ok(Some(Release {
            version,
            docs_url: Some(url.clone()),
            notes: Some(format!("See {url} for more information")),
            ..Default::default()
        }))
    }
}

#[async_trait::async_trait]
impl Vendor for Netgear {
    fn id(&self) -> &'static str {
        ID
    }

    fn name(&self) -> &'static str {
        "Netgear"
    }

    async fn get_latest(&self, device: &Device) -> Result<Option<Release>, VendorError> {
        if self.is_cable_model(&device.model) {
            self.cable_modem_latest(device).await
        } else {
            self.support_page_latest(device).await
        }
    }
}

fn is_heading(element: &Element<'_>) -> bool {
    element.tag_name().is_some_and(|tag| {
        tag.len() == 2 && tag.starts_with('h') && tag[1..].chars().all(|c| c.is_ascii_digit())
    })
}

/// Download entries of the latest-version section that carry release notes
fn parse_support_page(page: &str, title_pattern: &Regex) -> Result<Vec<Candidate>, ParseError> {
    let document = HtmlDocument::parse(page)?;
    let downloads = document
        .root()
        .find_by_id("topicsdownload")
        .ok_or_else(|| ParseError::MissingElement("#topicsdownload".to_string()))?;
    let latest = downloads
        .find_by_class("latest-version")
        .ok_or_else(|| ParseError::MissingElement(".latest-version".to_string()))?;

    let notes_links = latest.find_all(|e| e.is("a") && e.text().starts_with("Release Notes"));

    let mut candidates = Vec::new();
    for link in notes_links {
        let Some(block) = link.parent().and_then(|p| p.parent()) else {
            continue;
        };

        let title = block.find(is_heading).map(|h| h.text()).unwrap_or_default();
        let Some(version) = title_pattern
            .captures(&title)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
        else {
            debug!("Skipping non-release {:?}", title);
            continue;
        };

        let download_url = block
            .find(|e| e.is("a") && e.has_class("btn"))
            .and_then(|a| a.attr("href"));
        let file_size = FILE_SIZE_REGEX
            .captures(&block.text())
            .map(|c| c[1].to_string());

        candidates.push(Candidate {
            version,
            download_url,
            docs_url: link.attr("href"),
            file_size,
        });
    }

    Ok(candidates)
}

/// Version listed for `model_id` in the `provider` column, `None` when the
/// model is not in the table
fn parse_cable_table(
    page: &str,
    model_id: &str,
    provider: &str,
) -> Result<Option<String>, ParseError> {
    let document = HtmlDocument::parse(page)?;
    let root = document.root();

    // Cells may list several models: "CM500/CM500V"
    let model_pattern = Regex::new(&format!("^([^/]+/)?{}", regex::escape(model_id)))
        .map_err(|e| ParseError::ParseFailed(e.to_string()))?;

    let Some(model_cell) = root
        .find_text(|text| model_pattern.is_match(text))
        .and_then(|e| e.closest("td"))
    else {
        return Ok(None);
    };

    let row = model_cell
        .closest("tr")
        .ok_or_else(|| ParseError::MissingElement(format!("row of {model_id}")))?;
    let table = row
        .closest("table")
        .ok_or_else(|| ParseError::MissingElement("firmware table".to_string()))?;

    let provider_cell = table
        .find_text(|text| text.starts_with(provider))
        .and_then(|e| e.closest("td"))
        .ok_or_else(|| ParseError::MissingElement(format!("{provider} column")))?;
    let header = provider_cell
        .closest("tr")
        .ok_or_else(|| ParseError::MissingElement("table header".to_string()))?;

    let provider_position = cells(&header)
        .iter()
        .position(|cell| *cell == provider_cell)
        .ok_or_else(|| ParseError::MissingElement(format!("{provider} column")))?;

    let row_cells = cells(&row);
    let model_position = row_cells
        .iter()
        .position(|cell| *cell == model_cell)
        .unwrap_or_default();

    let version = row_cells
        .get(model_position + provider_position)
        .map(|cell| cell.text())
        .ok_or_else(|| ParseError::MissingElement(format!("{provider} cell for {model_id}")))?;

    Ok((!version.is_empty()).then_some(version))
}

fn cells<'a>(row: &Element<'a>) -> Vec<Element<'a>> {
    row.children().into_iter().filter(|e| e.is("td")).collect()
}
