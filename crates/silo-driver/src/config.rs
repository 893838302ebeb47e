//! Driver configuration.
//!
//! One [`DriverConfig`] is built at startup (from CLI flags in `silod`) and
//! handed to the constructors that need it. Nothing reads ambient globals
//! mid-operation.

use std::path::PathBuf;

/// Default directory under which volume mountpoints and the state file live.
pub const DEFAULT_MOUNT_ROOT: &str = "/var/lib/silo/volumes";

/// Filesystem type handed to the mount executor.
pub const DEFAULT_FSTYPE: &str = "nfs4";

/// Default NFS mount options.
pub const DEFAULT_MOUNT_OPTIONS: &str =
    "vers=4.0,rsize=1048576,wsize=1048576,hard,timeo=600,retrans=2,actimeo=0";

/// Configuration for the volume driver and its mount executors.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Directory under which per-volume mountpoints are created.
    pub mount_root: PathBuf,
    /// Availability zone of this host, for zone-aware source mapping.
    pub availability_zone: Option<String>,
    /// Filesystem type passed to mount.
    pub fstype: String,
    /// Option string passed to mount.
    pub mount_options: String,
}

impl DriverConfig {
    /// Configuration with the given mount root and default NFS settings.
    pub fn with_mount_root(mount_root: impl Into<PathBuf>) -> Self {
        Self {
            mount_root: mount_root.into(),
            ..Self::default()
        }
    }

    /// Set the availability zone this host runs in.
    #[must_use]
    pub fn availability_zone(mut self, zone: impl Into<String>) -> Self {
        self.availability_zone = Some(zone.into());
        self
    }

    /// Set the filesystem type passed to the mount executor.
    #[must_use]
    pub fn fstype(mut self, fstype: impl Into<String>) -> Self {
        self.fstype = fstype.into();
        self
    }

    /// Set the option string passed to the mount executor.
    #[must_use]
    pub fn mount_options(mut self, options: impl Into<String>) -> Self {
        self.mount_options = options.into();
        self
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            mount_root: PathBuf::from(DEFAULT_MOUNT_ROOT),
            availability_zone: None,
            fstype: DEFAULT_FSTYPE.to_string(),
            mount_options: DEFAULT_MOUNT_OPTIONS.to_string(),
        }
    }
}
