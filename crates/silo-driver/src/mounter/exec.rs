//! Process-exec mount strategy.

use std::path::Path;
use std::process::Output;

use async_trait::async_trait;
use silo_common::{SiloError, SiloResult};
use tokio::process::Command;

use super::{Mounter, resolve_source};
use crate::config::DriverConfig;
use crate::protocol::RequestOpts;

/// Mounter that shells out to the system `mount`/`umount` utilities.
///
/// Portable across unixes and picks up whatever NFS helpers the host's
/// mount utility knows about. The utility's combined output is folded into
/// the returned error on failure.
#[derive(Debug, Clone)]
pub struct ExecMounter {
    fstype: String,
    mount_options: String,
    zone: Option<String>,
}

impl ExecMounter {
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
impl Mounter for ExecMounter {
    async fn mount(&self, source: &str, target: &Path, opts: &RequestOpts) -> SiloResult<()> {
        let source = resolve_source(source, opts, self.zone.as_deref());

        tracing::debug!(
            %source,
            target = %target.display(),
            fstype = %self.fstype,
            "Invoking mount"
        );

        let output = Command::new("mount")
            .arg("-t")
            .arg(&self.fstype)
            .arg("-o")
            .arg(&self.mount_options)
            .arg(&source)
            .arg(target)
            .output()
            .await
            .map_err(|err| SiloError::Mount {
                src: source.clone(),
                target: target.to_path_buf(),
                reason: err.to_string(),
            })?;

        if !output.status.success() {
            return Err(SiloError::Mount {
                src: source,
                target: target.to_path_buf(),
                reason: diagnostic(&output),
            });
        }

        Ok(())
    }

    async fn unmount(&self, target: &Path) -> SiloResult<()> {
        tracing::debug!(target = %target.display(), "Invoking umount");

        let output = Command::new("umount")
            .arg(target)
            .output()
            .await
            .map_err(|err| SiloError::Unmount {
                target: target.to_path_buf(),
                reason: err.to_string(),
            })?;

        if !output.status.success() {
            return Err(SiloError::Unmount {
                target: target.to_path_buf(),
                reason: diagnostic(&output),
            });
        }

        Ok(())
    }
}

/// Fold a failed utility invocation into one diagnostic line.
fn diagnostic(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let text = if stderr.trim().is_empty() {
        stdout.trim()
    } else {
        stderr.trim()
    };

    if text.is_empty() {
        output.status.to_string()
    } else {
        format!("{} ({text})", output.status)
    }
}
