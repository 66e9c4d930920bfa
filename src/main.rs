use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use serde_json::json;

use homenet_check::config::AppConfig;
use homenet_check::device::Device;
use homenet_check::logging::init_logging;
use homenet_check::version::checker::{Resolver, UpdateStatus};
use homenet_check::version::registry::VendorRegistry;

#[derive(Parser)]
#[command(name = "homenet-check")]
#[command(version, about = "Check home network devices for newer firmware")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List available vendors
    Vendors,
    /// List models a vendor knows about
    Devices { vendor_id: String },
    /// Check a single device for an update
    Check {
        #[arg(long)]
        vendor_id: String,
        #[arg(long)]
        model: String,
        /// Installed firmware version
        #[arg(long = "version")]
        installed_version: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Check every device listed in a JSON file
    CheckAll { devices: PathBuf },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    let _guard = init_logging(&config.log).context("Failed to initialize logging")?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli.command, &config, cli.json))
}

async fn run(command: Command, config: &AppConfig, json: bool) -> anyhow::Result<()> {
    let mut registry = VendorRegistry::with_defaults();
    registry.configure(config)?;

    match command {
        Command::Vendors => {
            for vendor in registry.vendors()? {
                println!("{}\t{}", vendor.id(), vendor.name());
            }
        }
        Command::Devices { vendor_id } => {
            let vendor = registry
                .get(&vendor_id)?
                .ok_or_else(|| anyhow!("Vendor not found: {vendor_id}"))?;
            match vendor.supported_devices().await? {
                Some(models) => {
                    for model in models {
                        println!("{model}");
                    }
                }
                None => println!("{} does not support listing devices", vendor.name()),
            }
        }
        Command::Check {
            vendor_id,
            model,
            installed_version,
            address,
            description,
        } => {
            let device = Device {
                vendor_id,
                model,
                version: installed_version,
                address,
                description,
            };
            let resolver = Resolver::new(registry);
            let status = resolver.device_has_update(&device).await?;
            print_status(&device, &status, json)?;
        }
        Command::CheckAll { devices } => {
            let content = std::fs::read_to_string(&devices)
                .with_context(|| format!("Failed to read {}", devices.display()))?;
            let devices: Vec<Device> =
                serde_json::from_str(&content).context("Invalid device list")?;

            let resolver = Resolver::new(registry);
            let results = resolver.check_devices(&devices).await;
            for (device, result) in devices.iter().zip(results) {
                match result {
                    Ok(status) => print_status(device, &status, json)?,
                    Err(e) => eprintln!("{} {}: {}", device.vendor_id, device.model, e),
                }
            }
        }
    }

    Ok(())
}

fn print_status(device: &Device, status: &UpdateStatus, json: bool) -> anyhow::Result<()> {
    if json {
        let line = json!({
            "vendor_id": device.vendor_id,
            "model": device.model,
            "version": device.version,
            "update_available": status.update_available,
            "release": status.release,
        });
        println!("{}", serde_json::to_string(&line)?);
        return Ok(());
    }

    let installed = device.version.as_deref().unwrap_or("unknown");
    match &status.release {
        None => println!("{}: no release found (installed {})", device.model, installed),
        Some(release) if status.update_available => {
            println!(
                "{}: update available {} -> {}",
                device.model, installed, release.version
            );
            if let Some(url) = &release.download_url {
                println!("  download: {url}");
            }
            if let Some(url) = &release.docs_url {
                println!("  notes: {url}");
            }
        }
        Some(release) => println!("{}: up to date ({})", device.model, release.version),
    }

    Ok(())
}
