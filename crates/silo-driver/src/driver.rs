//! Volume lifecycle driver.
//!
//! Implements the plugin operation set on top of the registry and the
//! mount executor. Requests are validated before any state mutation or OS
//! call; every state change is persisted before the operation returns.
//!
//! Lock discipline: the slow executor calls (mount/unmount syscalls or
//! subprocesses) run *outside* the registry lock, so one volume's slow
//! mount never blocks reads of other volumes. The count/mountpoint
//! mutation afterwards re-fetches the live record under the exclusive
//! lock. The check-count-then-mount window this leaves open is the known
//! inconsistency closed by restart-time reconciliation, not something the
//! design pretends to eliminate.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use silo_common::{SiloError, SiloResult};

use crate::config::DriverConfig;
use crate::mounter::Mounter;
use crate::probe::MountProber;
use crate::protocol::{
    ActivateResponse, CapabilitiesResponse, CapabilityInfo, CreateRequest, GetRequest,
    MountRequest, PathRequest, RemoveRequest, UnmountRequest, source_opt,
};
use crate::registry::{VolumeRecord, VolumeRegistry};

/// The volume lifecycle manager.
pub struct SiloDriver {
    mount_root: PathBuf,
    registry: VolumeRegistry,
    mounter: Arc<dyn Mounter>,
    prober: Arc<dyn MountProber>,
}

impl SiloDriver {
    /// Build the driver: ensure the mount root exists, restore persisted
    /// volume state, and reconcile it against live mounts.
    ///
    /// # Errors
    ///
    /// Failing to resolve or create the mount root is fatal to startup —
    /// the only class of error this system does not return to a caller.
    pub async fn new(
        config: DriverConfig,
        mounter: Arc<dyn Mounter>,
        prober: Arc<dyn MountProber>,
    ) -> SiloResult<Self> {
        let mount_root = std::path::absolute(&config.mount_root)?;
        std::fs::create_dir_all(&mount_root)?;

        let registry = VolumeRegistry::new(&mount_root);
        registry.restore();
        registry.reconcile(prober.as_ref()).await;

        tracing::info!(mount_root = %mount_root.display(), "Volume driver ready");

        Ok(Self {
            mount_root,
            registry,
            mounter,
            prober,
        })
    }

    /// Plugin activation handshake.
    #[must_use]
    pub fn activate(&self) -> ActivateResponse {
        ActivateResponse {
            implements: vec!["VolumeDriver".to_string()],
        }
    }

    /// Static capability advertisement.
    #[must_use]
    pub fn capabilities(&self) -> CapabilitiesResponse {
        CapabilitiesResponse {
            capabilities: CapabilityInfo {
                scope: "local".to_string(),
            },
        }
    }

    /// Register a volume. Idempotent for identical requests; a divergent
    /// source for an existing name is rejected.
    pub fn create(&self, request: CreateRequest) -> SiloResult<()> {
        if request.name.is_empty() {
            return Err(SiloError::MissingVolumeName);
        }
        let source = source_opt(&request.opts)?;

        if self.registry.create(&request.name, source)? {
            tracing::info!(volume = %request.name, %source, "Volume created");
        } else {
            tracing::debug!(volume = %request.name, "Volume already exists");
        }
        Ok(())
    }

    /// Attach a volume, or take another reference on an existing mount.
    /// Returns the mountpoint.
    pub async fn mount(&self, request: MountRequest) -> SiloResult<PathBuf> {
        if request.name.is_empty() {
            return Err(SiloError::MissingVolumeName);
        }
        let volume = self
            .registry
            .get(&request.name)
            .ok_or_else(|| SiloError::NotCreated {
                name: request.name.clone(),
            })?;

        let mountpoint = self.mount_path(&volume.name);

        if volume.mount_count < 1 {
            std::fs::create_dir_all(&mountpoint).map_err(|err| SiloError::Mount {
                src: volume.source.clone(),
                target: mountpoint.clone(),
                reason: format!("creating mountpoint directory: {err}"),
            })?;

            // Executor failure leaves the registry untouched; the caller
            // retries or gives up.
            self.mounter
                .mount(&volume.source, &mountpoint, &request.opts)
                .await?;
        }

        let volume = self.registry.bump_mount(&volume.name, &mountpoint)?;
        tracing::info!(
            volume = %volume.name,
            count = volume.mount_count,
            mountpoint = %mountpoint.display(),
            "Volume mounted"
        );

        Ok(mountpoint)
    }

    /// Release one reference on a volume's mount, detaching at zero.
    pub async fn unmount(&self, request: UnmountRequest) -> SiloResult<()> {
        if request.name.is_empty() {
            return Err(SiloError::MissingVolumeName);
        }
        let volume = self
            .registry
            .get(&request.name)
            .ok_or_else(|| SiloError::VolumeNotFound {
                name: request.name.clone(),
            })?;

        let Some(mountpoint) = volume.mountpoint.clone() else {
            return Err(SiloError::NotPreviouslyMounted {
                name: request.name.clone(),
            });
        };

        // The recorded mountpoint may have been torn down out-of-band.
        // That inconsistency is reported, not silently dropped; Remove or
        // restart-time reconciliation resolves it.
        if !self.prober.probe(&mountpoint).await? {
            return Err(SiloError::MountpointGone {
                name: request.name.clone(),
                path: mountpoint,
            });
        }

        if volume.mount_count == 1 {
            self.detach(&mountpoint).await?;
        }

        let volume = self.registry.release_mount(&volume.name)?;
        tracing::info!(
            volume = %volume.name,
            count = volume.mount_count,
            "Volume unmounted"
        );
        Ok(())
    }

    /// Delete a volume, forcing a detach first when it is still mounted.
    /// Removing an unknown name succeeds — orchestrators retry deletes.
    pub async fn remove(&self, request: RemoveRequest) -> SiloResult<()> {
        if request.name.is_empty() {
            return Err(SiloError::MissingVolumeName);
        }

        let Some(volume) = self.registry.get(&request.name) else {
            tracing::warn!(volume = %request.name, "Remove for unknown volume, nothing to do");
            return Ok(());
        };

        if let Some(mountpoint) = volume.mountpoint.clone() {
            if self.prober.probe(&mountpoint).await? {
                self.detach(&mountpoint).await?;
            } else {
                tracing::warn!(
                    volume = %volume.name,
                    mountpoint = %mountpoint.display(),
                    "Recorded mountpoint no longer mounted, skipping detach"
                );
            }
        }

        self.registry.remove(&volume.name)?;
        tracing::info!(volume = %volume.name, "Volume removed");
        Ok(())
    }

    /// Look up one volume.
    pub fn get(&self, request: GetRequest) -> SiloResult<VolumeRecord> {
        self.registry
            .get(&request.name)
            .ok_or_else(|| SiloError::VolumeNotFound {
                name: request.name.clone(),
            })
    }

    /// Snapshot of all registered volumes. Never fails.
    #[must_use]
    pub fn list(&self) -> Vec<VolumeRecord> {
        self.registry.list()
    }

    /// A volume's current mountpoint.
    pub fn path(&self, request: PathRequest) -> SiloResult<PathBuf> {
        if request.name.is_empty() {
            return Err(SiloError::MissingVolumeName);
        }
        let volume = self
            .registry
            .get(&request.name)
            .ok_or_else(|| SiloError::VolumeNotFound {
                name: request.name.clone(),
            })?;

        volume
            .mountpoint
            .ok_or_else(|| SiloError::NotPreviouslyMounted {
                name: request.name.clone(),
            })
    }

    /// The absolute directory volumes are mounted under.
    #[must_use]
    pub fn mount_root(&self) -> &Path {
        &self.mount_root
    }

    /// Deterministic mountpoint for a volume name.
    fn mount_path(&self, name: &str) -> PathBuf {
        self.mount_root.join(name)
    }

    /// Detach a mountpoint and remove its directory.
    async fn detach(&self, mountpoint: &Path) -> SiloResult<()> {
        self.mounter.unmount(mountpoint).await?;

        std::fs::remove_dir_all(mountpoint).map_err(|err| SiloError::Unmount {
            target: mountpoint.to_path_buf(),
            reason: format!("removing mountpoint directory: {err}"),
        })?;

        tracing::debug!(mountpoint = %mountpoint.display(), "Mountpoint detached");
        Ok(())
    }
}
