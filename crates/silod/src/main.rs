//! silod - Silo volume plugin daemon.
//!
//! Serves the docker volume-plugin HTTP API and, optionally, a separate
//! administrative API for one-shot permission opening on freshly
//! provisioned remote filesystems.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use silo_driver::config::{DEFAULT_FSTYPE, DEFAULT_MOUNT_OPTIONS, DEFAULT_MOUNT_ROOT};
use silo_driver::mounter::{ExecMounter, Mounter, SyscallMounter};
use silo_driver::probe::{ExecProber, MountProber, StatProber};
use silo_driver::{DriverConfig, PermsOpener, SiloDriver};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;

/// Mount execution strategy.
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum MounterKind {
    /// Shell out to mount(8)/umount(8).
    Exec,
    /// Call the kernel mount facility directly (Linux only).
    Syscall,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// host:port to serve volume management functions on
    #[arg(long, default_value = "0.0.0.0:9750")]
    listen_addr: SocketAddr,

    /// host:port to serve administrative volume tools on (disabled unless set)
    #[arg(long)]
    admin_addr: Option<SocketAddr>,

    /// Directory volumes are mounted under
    #[arg(long, default_value = DEFAULT_MOUNT_ROOT)]
    mount_root: PathBuf,

    /// Availability zone this host runs in, for zone-aware source maps
    #[arg(long)]
    availability_zone: Option<String>,

    /// Mount execution strategy
    #[arg(long, value_enum, default_value = "exec")]
    mounter: MounterKind,

    /// Filesystem type passed to mount
    #[arg(long, default_value = DEFAULT_FSTYPE)]
    fstype: String,

    /// Options passed to mount
    #[arg(long, default_value = DEFAULT_MOUNT_OPTIONS)]
    mount_options: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = DriverConfig::with_mount_root(&args.mount_root)
        .fstype(&args.fstype)
        .mount_options(&args.mount_options);
    if let Some(zone) = &args.availability_zone {
        config = config.availability_zone(zone);
    }

    let mounter: Arc<dyn Mounter> = match args.mounter {
        MounterKind::Exec => Arc::new(ExecMounter::new(&config)),
        MounterKind::Syscall => Arc::new(SyscallMounter::new(&config)),
    };
    let prober: Arc<dyn MountProber> = match args.mounter {
        MounterKind::Exec => Arc::new(ExecProber::default()),
        MounterKind::Syscall => Arc::new(StatProber::default()),
    };

    let driver = Arc::new(
        SiloDriver::new(config.clone(), Arc::clone(&mounter), Arc::clone(&prober)).await?,
    );

    let plugin_app = api::server::app(driver);
    let plugin_listener = tokio::net::TcpListener::bind(args.listen_addr).await?;
    tracing::info!("Volume plugin API listening on {}", args.listen_addr);

    let Some(admin_addr) = args.admin_addr else {
        axum::serve(plugin_listener, plugin_app).await?;
        return Ok(());
    };

    let opener = Arc::new(PermsOpener::new(&config, mounter, prober)?);
    let admin_app = api::admin::app(opener);
    let admin_listener = tokio::net::TcpListener::bind(admin_addr).await?;
    tracing::info!("Administrative API listening on {admin_addr}");

    let plugin_handle = tokio::spawn(async move { axum::serve(plugin_listener, plugin_app).await });
    let admin_handle = tokio::spawn(async move { axum::serve(admin_listener, admin_app).await });

    tokio::select! {
        result = plugin_handle => {
            tracing::error!("Volume plugin API server exited unexpectedly");
            result??;
        }
        result = admin_handle => {
            tracing::error!("Administrative API server exited unexpectedly");
            result??;
        }
    }

    Ok(())
}
