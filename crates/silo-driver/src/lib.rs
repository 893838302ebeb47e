//! # Silo Volume Driver
//!
//! Silo attaches NFS-backed volumes to local paths on behalf of a container
//! orchestrator, speaking the docker volume-plugin protocol.
//!
//! This crate is the core: the volume registry (state, persistence,
//! startup reconciliation), the mount executors, the mountpoint existence
//! prober, and the lifecycle driver that ties them together. The HTTP
//! transport lives in the `silod` binary crate.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use silo_driver::{DriverConfig, SiloDriver};
//! use silo_driver::mounter::ExecMounter;
//! use silo_driver::probe::ExecProber;
//!
//! # async fn example() -> silo_common::SiloResult<()> {
//! let config = DriverConfig::with_mount_root("/var/lib/silo/volumes");
//! let mounter = Arc::new(ExecMounter::new(&config));
//! let prober = Arc::new(ExecProber::default());
//! let driver = SiloDriver::new(config, mounter, prober).await?;
//!
//! let mountpoint = driver
//!     .mount(silo_driver::protocol::MountRequest {
//!         name: "scratch".into(),
//!         opts: serde_json::Map::new(),
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod driver;
pub mod mounter;
pub mod probe;
pub mod protocol;
pub mod registry;
pub mod voltools;

pub use config::DriverConfig;
pub use driver::SiloDriver;
pub use registry::{VolumeRecord, VolumeRegistry};
pub use voltools::PermsOpener;
