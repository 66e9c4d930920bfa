use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// Constants
// =============================================================================

/// Default timeout for vendor HTTP requests in milliseconds (30 seconds)
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;

/// User agent sent with every vendor request
pub const USER_AGENT: &str = concat!("homenet-check/", env!("CARGO_PKG_VERSION"));

const APP_DIR: &str = "homenet-check";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path:?}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Top-level configuration file
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// Directory for cached vendor datasets
    pub cache_dir: Option<PathBuf>,
    /// Timeout for each vendor HTTP request in milliseconds
    pub fetch_timeout_ms: u64,
    pub log: LogConfig,
    pub vendors: VendorsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            log: LogConfig::default(),
            vendors: VendorsConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Configured cache directory, or the platform default
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_dir)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Default level filter; `RUST_LOG` takes precedence
    pub level: String,
    /// Append log output to this file instead of stderr
    pub file: Option<PathBuf>,
    /// Emit JSON lines
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            json: false,
        }
    }
}

/// Vendor-specific settings and normalization rules
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct VendorsConfig {
    pub openwrt: OpenWrtConfig,
    pub netgear: NetgearConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct OpenWrtConfig {
    /// Gzipped tab-separated table of hardware
    pub database_url: String,
    /// Base of the per-release notes pages
    pub release_notes_url: String,
    /// Value of the `version` column meaning "no hardware revision"
    pub null_version_marker: String,
    /// Values of the current release column meaning "not supported"
    pub unsupported_release_markers: Vec<String>,
}

impl Default for OpenWrtConfig {
    fn default() -> Self {
        Self {
            database_url: "https://openwrt.org/_media/toh_dump_tab_separated_csv.csv.gz"
                .to_string(),
            release_notes_url: "https://openwrt.org/releases".to_string(),
            null_version_marker: "NULL".to_string(),
            unsupported_release_markers: vec![String::new(), "-".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct NetgearConfig {
    /// Base of the per-product support pages
    pub support_url: String,
    /// Page listing cable modem firmware per provider
    pub cable_firmware_url: String,
    /// Regex whose first group extracts the version from a release title
    pub title_pattern: String,
    /// Model prefixes whose firmware is distributed by the provider
    pub cable_model_prefixes: Vec<String>,
    /// Provider names as typed by users mapped to the table's column headers
    pub provider_aliases: HashMap<String, String>,
}

impl Default for NetgearConfig {
    fn default() -> Self {
        Self {
            support_url: "https://www.netgear.com/support/product".to_string(),
            cable_firmware_url: "https://kb.netgear.com/000036375/What-s-the-latest-firmware-version-of-my-NETGEAR-cable-modem-or-modem-router".to_string(),
            title_pattern: "Version ([0-9a-z.]+)".to_string(),
            cable_model_prefixes: vec!["C".to_string(), "N450".to_string()],
            provider_aliases: HashMap::from([(
                "Other".to_string(),
                "All other ISPs".to_string(),
            )]),
        }
    }
}

/// Returns the default cache directory for homenet-check.
/// Uses $XDG_CACHE_HOME/homenet-check if XDG_CACHE_HOME is set,
/// otherwise falls back to ~/.cache/homenet-check,
/// or ./homenet-check if neither is available.
pub fn default_cache_dir() -> PathBuf {
    cache_dir_with_env(std::env::var("XDG_CACHE_HOME").ok(), dirs::home_dir())
}

fn cache_dir_with_env(xdg_cache_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let cache_dir = xdg_cache_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".cache")))
        .unwrap_or_else(|| PathBuf::from("."));

    cache_dir.join(APP_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn app_config_from_partial_object_uses_defaults_for_missing_fields() {
        let result = serde_json::from_value::<AppConfig>(json!({
            "cacheDir": "/var/cache/homenet",
            "log": { "level": "debug" }
        }))
        .unwrap();

        assert_eq!(result.cache_dir(), PathBuf::from("/var/cache/homenet"));
        assert_eq!(result.fetch_timeout(), Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS));
        assert_eq!(result.log.level, "debug");
        assert_eq!(result.log.file, None);
        assert_eq!(result.vendors, VendorsConfig::default());
    }

    #[test]
    fn app_config_parses_vendor_rules() {
        let result = serde_json::from_value::<AppConfig>(json!({
            "fetchTimeoutMs": 5000,
            "vendors": {
                "openwrt": {
                    "nullVersionMarker": "none",
                    "unsupportedReleaseMarkers": ["n/a"]
                },
                "netgear": {
                    "titlePattern": "Firmware ([0-9.]+)",
                    "cableModelPrefixes": ["CM"],
                    "providerAliases": { "Any": "All ISPs" }
                }
            }
        }))
        .unwrap();

        assert_eq!(result.fetch_timeout(), Duration::from_secs(5));
        assert_eq!(result.vendors.openwrt.null_version_marker, "none");
        assert_eq!(result.vendors.openwrt.unsupported_release_markers, vec!["n/a"]);
        assert_eq!(
            result.vendors.openwrt.database_url,
            OpenWrtConfig::default().database_url
        );
        assert_eq!(result.vendors.netgear.title_pattern, "Firmware ([0-9.]+)");
        assert_eq!(result.vendors.netgear.cable_model_prefixes, vec!["CM"]);
        assert_eq!(
            result.vendors.netgear.provider_aliases.get("Any").map(String::as_str),
            Some("All ISPs")
        );
    }

    #[test]
    fn load_reports_invalid_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Json { .. })));
    }

    #[test]
    fn load_reports_missing_file() {
        let result = AppConfig::load(Path::new("/nonexistent/homenet-check.json"));

        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn cache_dir_with_env_uses_xdg_cache_home_when_set() {
        let path = cache_dir_with_env(
            Some("/tmp/test-cache".to_string()),
            Some(PathBuf::from("/home/user")),
        );

        assert_eq!(path, PathBuf::from("/tmp/test-cache/homenet-check"));
    }

    #[test]
    fn cache_dir_with_env_falls_back_to_home_cache() {
        let path = cache_dir_with_env(None, Some(PathBuf::from("/home/user")));

        assert_eq!(path, PathBuf::from("/home/user/.cache/homenet-check"));
    }

    #[test]
    fn cache_dir_with_env_falls_back_to_current_dir_when_no_dirs_available() {
        let path = cache_dir_with_env(None, None);
        assert_eq!(path, PathBuf::from("./homenet-check"));
    }
}
