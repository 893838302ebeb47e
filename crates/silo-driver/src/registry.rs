//! Volume registry: state, persistence, and startup reconciliation.
//!
//! The registry is the single source of truth for which volumes exist and
//! where they are mounted. The kernel mount table is treated as a cache of
//! registry intent that can drift (a crash between the mount syscall and
//! the state write, or a reboot tearing mounts down out-of-band) and is
//! reconciled at startup, never trusted blindly.
//!
//! The map lives behind a readers-writer lock and every mutation persists
//! the whole map synchronously before the mutating call returns. All
//! mutations re-fetch the live record under the exclusive lock — there is
//! no read-a-copy-then-write-back path that could lose updates.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use silo_common::{SiloError, SiloResult};

use crate::probe::MountProber;

/// File under the mount root holding the serialized volume map.
pub const STATE_FILE: &str = "silo-state.json";

/// One registered volume.
///
/// Invariant: `mount_count > 0` if and only if `mountpoint` is set; the
/// two fields are only ever updated together, by the registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeRecord {
    /// Unique volume name, immutable once created.
    pub name: String,
    /// Remote filesystem source, fixed at creation.
    pub source: String,
    /// Local path the volume is attached at; `None` when unmounted.
    pub mountpoint: Option<PathBuf>,
    /// Number of outstanding mount requests not yet balanced by unmount.
    pub mount_count: u32,
}

impl VolumeRecord {
    /// Whether the volume currently holds a mount.
    #[must_use]
    pub const fn is_mounted(&self) -> bool {
        self.mount_count > 0
    }
}

/// The authoritative volume map with synchronous JSON persistence.
#[derive(Debug)]
pub struct VolumeRegistry {
    state_file: PathBuf,
    volumes: RwLock<HashMap<String, VolumeRecord>>,
}

impl VolumeRegistry {
    /// Empty registry persisting under `mount_root`.
    #[must_use]
    pub fn new(mount_root: &Path) -> Self {
        Self {
            state_file: mount_root.join(STATE_FILE),
            volumes: RwLock::new(HashMap::new()),
        }
    }

    /// Load persisted state, replacing the in-memory map.
    ///
    /// Fail-open: a missing or unparsable state file leaves the registry
    /// empty and is never fatal — availability over recovered state. A
    /// stale belief of "mounted" is pruned afterwards by [`Self::reconcile`].
    pub fn restore(&self) {
        let data = match std::fs::read(&self.state_file) {
            Ok(data) => data,
            Err(err) => {
                tracing::info!(
                    state_file = %self.state_file.display(),
                    %err,
                    "No volume state restored"
                );
                return;
            }
        };

        match serde_json::from_slice::<HashMap<String, VolumeRecord>>(&data) {
            Ok(state) => {
                tracing::info!(
                    state_file = %self.state_file.display(),
                    volumes = state.len(),
                    "Volume state restored"
                );
                *self.volumes.write() = state;
            }
            Err(err) => {
                tracing::warn!(
                    state_file = %self.state_file.display(),
                    %err,
                    "Volume state file unparsable, starting empty"
                );
            }
        }
    }

    /// Drop every restored record whose mountpoint is not a live mount.
    ///
    /// Records that were created but never mounted have no mountpoint and
    /// are dropped too. A probe that cannot decide counts as dead: keeping
    /// a record we cannot verify would let a stale "mounted" answer escape
    /// to callers. The state file is not rewritten here — it is corrected
    /// on the next mutating call.
    pub async fn reconcile(&self, prober: &dyn MountProber) {
        let snapshot: Vec<(String, Option<PathBuf>)> = {
            let volumes = self.volumes.read();
            volumes
                .values()
                .map(|vol| (vol.name.clone(), vol.mountpoint.clone()))
                .collect()
        };

        let mut dead = Vec::new();
        for (name, mountpoint) in snapshot {
            let live = match mountpoint {
                Some(ref path) => match prober.probe(path).await {
                    Ok(live) => live,
                    Err(err) => {
                        tracing::warn!(volume = %name, %err, "Unable to verify volume");
                        false
                    }
                },
                None => false,
            };

            if !live {
                dead.push(name);
            }
        }

        if dead.is_empty() {
            return;
        }

        let mut volumes = self.volumes.write();
        for name in dead {
            volumes.remove(&name);
            tracing::info!(volume = %name, "Dropped stale volume during reconciliation");
        }
    }

    /// Look up a volume by name, returning a snapshot of its record.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<VolumeRecord> {
        self.volumes.read().get(name).cloned()
    }

    /// Snapshot of all registered volumes.
    #[must_use]
    pub fn list(&self) -> Vec<VolumeRecord> {
        self.volumes.read().values().cloned().collect()
    }

    /// Register a volume. Returns `Ok(true)` when a record was created,
    /// `Ok(false)` when the name already existed with the same source, and
    /// an error when the recorded source differs — the source is fixed at
    /// first creation.
    pub fn create(&self, name: &str, source: &str) -> SiloResult<bool> {
        let mut volumes = self.volumes.write();

        if let Some(existing) = volumes.get(name) {
            if existing.source == source {
                return Ok(false);
            }
            return Err(SiloError::SourceMismatch {
                name: name.to_string(),
                existing: existing.source.clone(),
            });
        }

        volumes.insert(
            name.to_string(),
            VolumeRecord {
                name: name.to_string(),
                source: source.to_string(),
                mountpoint: None,
                mount_count: 0,
            },
        );
        self.persist(&volumes)?;
        Ok(true)
    }

    /// Record one more consumer of a volume's mount, setting the
    /// mountpoint on the first. Returns the updated record.
    pub fn bump_mount(&self, name: &str, mountpoint: &Path) -> SiloResult<VolumeRecord> {
        let mut volumes = self.volumes.write();
        let volume = volumes
            .get_mut(name)
            .ok_or_else(|| SiloError::VolumeNotFound {
                name: name.to_string(),
            })?;

        volume.mount_count += 1;
        volume.mountpoint = Some(mountpoint.to_path_buf());
        let updated = volume.clone();

        self.persist(&volumes)?;
        Ok(updated)
    }

    /// Record one consumer releasing a volume's mount, clearing the
    /// mountpoint when the count reaches zero. Returns the updated record.
    pub fn release_mount(&self, name: &str) -> SiloResult<VolumeRecord> {
        let mut volumes = self.volumes.write();
        let volume = volumes
            .get_mut(name)
            .ok_or_else(|| SiloError::VolumeNotFound {
                name: name.to_string(),
            })?;

        volume.mount_count = volume.mount_count.saturating_sub(1);
        if volume.mount_count == 0 {
            volume.mountpoint = None;
        }
        let updated = volume.clone();

        self.persist(&volumes)?;
        Ok(updated)
    }

    /// Delete a volume's record.
    pub fn remove(&self, name: &str) -> SiloResult<()> {
        let mut volumes = self.volumes.write();
        if volumes.remove(name).is_none() {
            return Err(SiloError::VolumeNotFound {
                name: name.to_string(),
            });
        }
        self.persist(&volumes)
    }

    /// Serialize the whole map to the state file.
    ///
    /// Called with the write lock held so persisted state always matches
    /// some consistent in-memory state. A torn write on crash is an
    /// accepted residual risk; restore is fail-open and reconciliation
    /// prunes whatever survives.
    fn persist(&self, volumes: &HashMap<String, VolumeRecord>) -> SiloResult<()> {
        let data = serde_json::to_vec(volumes).map_err(|err| SiloError::Persist {
            reason: err.to_string(),
        })?;

        std::fs::write(&self.state_file, data).map_err(|err| SiloError::Persist {
            reason: format!("{}: {err}", self.state_file.display()),
        })?;

        tracing::debug!(
            state_file = %self.state_file.display(),
            volumes = volumes.len(),
            "Volume state saved"
        );
        Ok(())
    }
}
