//! Binary entry point: a tracing-subscriber registry wired to
//! `EnvFilter::from_default_env`, then config-file-or-default startup.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gpu_controller::cli::{Cli, Command};
use gpu_controller::vendor_stub::{FilesystemCdiCache, UnavailableMigLibrary};
use gpu_controller::{Controller, ControllerConfig};
use gpu_hw::{CompositeCdiWriter, MigAdapter, MpsAdapter, StandardCdiWriter, VfioAdapter, VfioCdiWriter};
use gpu_prepare::{Adapters, MpsEnvironment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve { config } => serve(&config).await,
        Command::PrintDefaultConfig => {
            print!("{}", toml::to_string_pretty(&ControllerConfig::default())?);
            Ok(())
        }
    }
}

async fn serve(config_path: &std::path::Path) -> anyhow::Result<()> {
    let config = if config_path.exists() {
        ControllerConfig::from_file(config_path)?
    } else {
        tracing::warn!(path = %config_path.display(), "config file not found, using defaults");
        ControllerConfig::default()
    };

    tracing::info!("GPU control plane controller starting...");

    let client = kube::Client::try_default().await?;
    let adapters = Arc::new(build_adapters(&config));
    let controller = Controller::new(client, adapters);
    controller.run(Duration::from_secs(config.resync_period_secs)).await
}

fn build_adapters(config: &ControllerConfig) -> Adapters {
    let cdi_cache: Arc<dyn gpu_hw::CdiCache> =
        Arc::new(FilesystemCdiCache::new(config.mps_plugin_root.join("cdi")));

    let standard = StandardCdiWriter::new(
        cdi_cache.clone(),
        config.cdi_vendor.clone(),
        config.cdi_class.clone(),
        |host_path: &str| host_path.to_string(),
    );
    let vfio = VfioCdiWriter::new(cdi_cache, config.cdi_vendor.clone(), config.cdi_class.clone());

    Adapters {
        mig: Arc::new(MigAdapter::new(Arc::new(UnavailableMigLibrary))),
        mps: Arc::new(MpsAdapter::new()),
        vfio: Arc::new(VfioAdapter::new(config.sysfs_root.clone(), config.drivers_root.clone())),
        cdi: Arc::new(CompositeCdiWriter::new(standard, vfio)),
        mps_env: MpsEnvironment {
            control_binary: config.mps_control_binary.clone(),
            plugin_root: config.mps_plugin_root.clone(),
            driver_library_dirs: config.mps_driver_library_dirs.clone(),
        },
    }
}
