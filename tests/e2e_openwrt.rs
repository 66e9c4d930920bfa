//! OpenWrt vendor E2E tests

mod helper;

use mockito::{Mock, Server, ServerGuard};

use helper::{create_test_context, gzip};
use homenet_check::config::{OpenWrtConfig, VendorsConfig};
use homenet_check::device::{Device, Release};
use homenet_check::version::error::VendorError;
use homenet_check::version::vendor::Vendor;
use homenet_check::version::vendors::OpenWrt;

const IMAGE_DIR: &str = "/releases/23.05.3/targets/ath79/generic/";
const IMAGE: &str = "openwrt-23.05.3-ath79-generic-tplink_archer-c7-v2-squashfs-sysupgrade.bin";

fn table(server_url: &str) -> String {
    format!(
        "pid\tbrand\tmodel\tversion\tsupportedcurrentrel\tfirmwareopenwrtupgradeurl\n\
         1\tTP-Link\tArcher C7\tv2\t23.05.3\t{server_url}{IMAGE_DIR}{IMAGE}\n\
         2\tTP-Link\tArcher C7\tv5\t-\t\n\
         3\tGL.iNet\tGL-MT300N\tNULL\t22.03.7\t\n"
    )
}

fn index_page() -> String {
    format!(
        r#"<!DOCTYPE html>
<html><head><title>Index of {IMAGE_DIR}</title></head>
<body>
<h1>Index of <a href="/">(root)</a> / releases / 23.05.3 / targets / ath79 / generic /</h1>
<table>
<tr><th class="n">File Name</th><th class="sh">sha256sum</th><th class="s">File Size</th><th class="d">Date</th></tr>
<tr><td class="n"><a href="{IMAGE}">{IMAGE}</a></td><td class="sh"><code>9d3e4f5a6b7c</code></td><td class="s">6912.0 KB</td><td class="d">Fri Mar 22 23:12:05 2024</td></tr>
</table>
</body></html>"#
    )
}

async fn mock_database(server: &mut ServerGuard, hits: usize) -> Mock {
    let body = gzip(&table(&server.url()));
    server
        .mock("GET", "/toh.csv.gz")
        .with_status(200)
        .with_header("etag", "\"toh-1\"")
        .with_header("cache-control", "max-age=86400")
        .with_body(body)
        .expect(hits)
        .create_async()
        .await
}

fn config(server: &ServerGuard) -> VendorsConfig {
    VendorsConfig {
        openwrt: OpenWrtConfig {
            database_url: format!("{}/toh.csv.gz", server.url()),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn get_latest_returns_release_with_image_metadata() {
    let mut server = Server::new_async().await;
    let database = mock_database(&mut server, 1).await;
    let index = server
        .mock("GET", IMAGE_DIR)
        .with_status(200)
        .with_body(index_page())
        .create_async()
        .await;
    let (_temp_dir, context) = create_test_context(config(&server));
    let vendor = OpenWrt::new(&context);

    let release = vendor
        .get_latest(&Device::new("openwrt", "TP-Link Archer C7 v2").with_version("22.03.5"))
        .await
        .unwrap();

    database.assert_async().await;
    index.assert_async().await;
    assert_eq!(
        release,
        Some(Release {
            version: "23.05.3".to_string(),
            download_url: Some(format!("{}{IMAGE_DIR}{IMAGE}", server.url())),
            docs_url: Some("https://openwrt.org/releases/23.05/notes-23.05.3".to_string()),
            hash_type: Some("sha256sum".to_string()),
            hash_sum: Some("9d3e4f5a6b7c".to_string()),
            file_size: Some("6912.0 KB".to_string()),
            release_date: Some("Fri Mar 22 23:12:05 2024".to_string()),
            notes: None,
        })
    );
}

#[tokio::test]
async fn missing_metadata_page_does_not_fail_lookup() {
    let mut server = Server::new_async().await;
    let _database = mock_database(&mut server, 1).await;
    let _index = server
        .mock("GET", IMAGE_DIR)
        .with_status(404)
        .create_async()
        .await;
    let (_temp_dir, context) = create_test_context(config(&server));

    let release = OpenWrt::new(&context)
        .get_latest(&Device::new("openwrt", "TP-Link Archer C7 v2"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(release.version, "23.05.3");
    assert!(release.download_url.is_some());
    assert_eq!(release.hash_sum, None);
}

#[tokio::test]
async fn database_is_downloaded_once_within_freshness_window() {
    let mut server = Server::new_async().await;
    let database = mock_database(&mut server, 1).await;
    let (_temp_dir, context) = create_test_context(config(&server));
    let vendor = OpenWrt::new(&context);

    let first = vendor
        .get_latest(&Device::new("openwrt", "GL.iNet GL-MT300N"))
        .await
        .unwrap();
    let unknown = vendor
        .get_latest(&Device::new("openwrt", "Acme Router 9000"))
        .await
        .unwrap();
    let devices = vendor.supported_devices().await.unwrap();

    database.assert_async().await;
    assert_eq!(first.map(|r| r.version).as_deref(), Some("22.03.7"));
    assert_eq!(unknown, None);
    assert_eq!(
        devices,
        Some(vec![
            "TP-Link Archer C7 v2".to_string(),
            "GL.iNet GL-MT300N".to_string(),
        ])
    );
}

#[tokio::test]
async fn unreachable_database_is_retrieval_error() {
    let mut server = Server::new_async().await;
    let _database = server
        .mock("GET", "/toh.csv.gz")
        .with_status(503)
        .create_async()
        .await;
    let (_temp_dir, context) = create_test_context(config(&server));

    let result = OpenWrt::new(&context)
        .get_latest(&Device::new("openwrt", "TP-Link Archer C7 v2"))
        .await;

    let error = result.unwrap_err();
    assert!(error.is_retrieval(), "unexpected error: {error}");
    assert!(matches!(error, VendorError::Cache(_)));
}

#[tokio::test]
async fn changed_table_layout_is_parse_error() {
    let mut server = Server::new_async().await;
    let _database = server
        .mock("GET", "/toh.csv.gz")
        .with_status(200)
        .with_body(gzip("brand\tmodel\nTP-Link\tArcher C7\n"))
        .create_async()
        .await;
    let (_temp_dir, context) = create_test_context(config(&server));

    let result = OpenWrt::new(&context)
        .get_latest(&Device::new("openwrt", "TP-Link Archer C7"))
        .await;

    assert!(result.unwrap_err().is_parse());
}
