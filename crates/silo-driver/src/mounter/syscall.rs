//! Direct-syscall mount strategy (Linux).

use std::path::Path;

use async_trait::async_trait;
use silo_common::{SiloError, SiloResult};

use super::{Mounter, resolve_source};
use crate::config::DriverConfig;
use crate::protocol::RequestOpts;

/// Mounter that calls the kernel mount facility directly via `rustix`.
///
/// No external processes, no PATH dependence. Requires the NFS client to
/// be compiled into the running kernel and the daemon to hold
/// `CAP_SYS_ADMIN`. Only available on Linux; on other hosts every call
/// returns [`SiloError::Unsupported`].
#[derive(Debug, Clone)]
pub struct SyscallMounter {
    fstype: String,
    mount_options: String,
    zone: Option<String>,
}

impl SyscallMounter {
    /// Mounter using the config's filesystem type, options, and zone.
    #[must_use]
    pub fn new(config: &DriverConfig) -> Self {
        Self {
            fstype: config.fstype.clone(),
            mount_options: config.mount_options.clone(),
            zone: config.availability_zone.clone(),
        }
    }
}

#[async_trait]
impl Mounter for SyscallMounter {
    async fn mount(&self, source: &str, target: &Path, opts: &RequestOpts) -> SiloResult<()> {
        let source = resolve_source(source, opts, self.zone.as_deref());

        #[cfg(target_os = "linux")]
        {
            use rustix::mount::{MountFlags, mount};

            tracing::debug!(
                %source,
                target = %target.display(),
                fstype = %self.fstype,
                "Mounting via syscall"
            );

            let fstype = std::ffi::CString::new(self.fstype.clone()).map_err(|_| {
                SiloError::Config {
                    message: format!("filesystem type '{}' contains a NUL byte", self.fstype),
                }
            })?;
            let data = std::ffi::CString::new(self.mount_options.clone()).map_err(|_| {
                SiloError::Config {
                    message: "mount options contain a NUL byte".to_string(),
                }
            })?;

            mount(
                source.as_str(),
                target,
                fstype.as_c_str(),
                MountFlags::empty(),
                data.as_c_str(),
            )
            .map_err(|errno| SiloError::Mount {
                src: source,
                target: target.to_path_buf(),
                reason: std::io::Error::from(errno).to_string(),
            })?;

            Ok(())
        }

        #[cfg(not(target_os = "linux"))]
        {
            let _ = (source, target, opts);
            Err(SiloError::Unsupported {
                feature: "direct mount syscalls".to_string(),
            })
        }
    }

    async fn unmount(&self, target: &Path) -> SiloResult<()> {
        #[cfg(target_os = "linux")]
        {
            use rustix::mount::{UnmountFlags, unmount};

            tracing::debug!(target = %target.display(), "Unmounting via syscall");

            unmount(target, UnmountFlags::empty()).map_err(|errno| SiloError::Unmount {
                target: target.to_path_buf(),
                reason: std::io::Error::from(errno).to_string(),
            })?;

            Ok(())
        }

        #[cfg(not(target_os = "linux"))]
        {
            let _ = target;
            Err(SiloError::Unsupported {
                feature: "direct mount syscalls".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn failed_mount_is_a_returned_error() {
        // An unknown filesystem type fails immediately (ENODEV without
        // privileges it is EPERM); either way the syscall error must come
        // back as a value, not a panic.
        let config = DriverConfig::default().fstype("silo-no-such-fs");
        let mounter = SyscallMounter::new(&config);
        let dir = tempfile::tempdir().unwrap();

        let result = mounter
            .mount("203.0.113.1:/", dir.path(), &RequestOpts::new())
            .await;
        assert!(matches!(result, Err(SiloError::Mount { .. })));
    }
}
