//! Administrative volume tools.
//!
//! OpenPerms is a one-shot maintenance operation for freshly provisioned
//! remote filesystems: mount at a scratch path, open the permissions,
//! unmount. It reuses the same mount executor and prober as the driver but
//! never touches the volume registry — nothing here survives the call.

use std::path::PathBuf;
use std::sync::Arc;

use silo_common::{SiloError, SiloResult};

use crate::config::DriverConfig;
use crate::mounter::Mounter;
use crate::probe::MountProber;
use crate::protocol::{OpenPermsRequest, source_opt};

/// Stateless permission opener, exposed on the administrative interface.
pub struct PermsOpener {
    mount_root: PathBuf,
    mounter: Arc<dyn Mounter>,
    prober: Arc<dyn MountProber>,
}

impl PermsOpener {
    /// Build the opener, ensuring the mount root exists.
    ///
    /// # Errors
    ///
    /// Failing to resolve or create the mount root is fatal to startup.
    pub fn new(
        config: &DriverConfig,
        mounter: Arc<dyn Mounter>,
        prober: Arc<dyn MountProber>,
    ) -> SiloResult<Self> {
        let mount_root = std::path::absolute(&config.mount_root)?;
        std::fs::create_dir_all(&mount_root)?;

        Ok(Self {
            mount_root,
            mounter,
            prober,
        })
    }

    /// Mount the requested filesystem, chmod it world-writable, unmount.
    pub async fn open_perms(&self, request: OpenPermsRequest) -> SiloResult<()> {
        if request.name.is_empty() {
            return Err(SiloError::MissingVolumeName);
        }
        let source = source_opt(&request.opts)?;

        let mountpoint = self.mount_root.join(&request.name);
        tracing::info!(
            volume = %request.name,
            %source,
            mountpoint = %mountpoint.display(),
            "Opening permissions"
        );

        std::fs::create_dir_all(&mountpoint).map_err(|err| SiloError::Mount {
            src: source.to_string(),
            target: mountpoint.clone(),
            reason: format!("creating mountpoint directory: {err}"),
        })?;

        self.mounter
            .mount(source, &mountpoint, &request.opts)
            .await?;

        if let Err(err) = open_permissions(&mountpoint) {
            // Do not leave the scratch mount behind on failure.
            if let Err(unmount_err) = self.mounter.unmount(&mountpoint).await {
                tracing::warn!(
                    mountpoint = %mountpoint.display(),
                    %unmount_err,
                    "Failed to clean up scratch mount after chmod failure"
                );
            }
            return Err(err);
        }

        // Mirror the unmount precondition of the driver path: never detach
        // something that is not actually mounted.
        if !self.prober.probe(&mountpoint).await? {
            return Err(SiloError::MountpointGone {
                name: request.name.clone(),
                path: mountpoint,
            });
        }

        self.mounter.unmount(&mountpoint).await?;
        std::fs::remove_dir_all(&mountpoint).map_err(|err| SiloError::Unmount {
            target: mountpoint.clone(),
            reason: format!("removing mountpoint directory: {err}"),
        })?;

        tracing::info!(volume = %request.name, "Permissions opened");
        Ok(())
    }
}

/// chmod 0777.
fn open_permissions(path: &std::path::Path) -> SiloResult<()> {
    use rustix::fs::Mode;

    rustix::fs::chmod(path, Mode::RWXU | Mode::RWXG | Mode::RWXO).map_err(|errno| {
        SiloError::Chmod {
            path: path.to_path_buf(),
            reason: std::io::Error::from(errno).to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_permissions_sets_mode_bits() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        open_permissions(dir.path()).unwrap();

        let mode = std::fs::metadata(dir.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o777);
    }
}
