//! Mountpoint existence probing.
//!
//! A probe answers one question: is this path currently a live mount?
//! Three outcomes: `Ok(true)` — live mount; `Ok(false)` — not a mount or
//! does not exist; `Err` — the probe itself failed and mount state cannot
//! be established (the caller must not guess).
//!
//! Every probe runs under a hard deadline so a hung check (a dead NFS
//! server can stall even `stat`) cannot stall the daemon.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use silo_common::{SiloError, SiloResult};

/// Default hard deadline for a single probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Determines whether a path is currently an actual mount point.
///
/// Used to gate unmount (never detach something that is not mounted) and
/// to reconcile restored registry state at startup.
#[async_trait]
pub trait MountProber: Send + Sync {
    /// Probe `path`. See the module docs for the outcome contract.
    async fn probe(&self, path: &Path) -> SiloResult<bool>;
}

/// Prober that invokes `mountpoint -q`.
#[derive(Debug, Clone)]
pub struct ExecProber {
    timeout: Duration,
}

impl ExecProber {
    /// Prober with a custom deadline.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ExecProber {
    fn default() -> Self {
        Self::new(PROBE_TIMEOUT)
    }
}

#[async_trait]
impl MountProber for ExecProber {
    async fn probe(&self, path: &Path) -> SiloResult<bool> {
        if path.as_os_str().is_empty() {
            return Ok(false);
        }

        let check = tokio::process::Command::new("mountpoint")
            .arg("-q")
            .arg(path)
            .status();

        let status = tokio::time::timeout(self.timeout, check)
            .await
            .map_err(|_| SiloError::ProbeIndeterminate {
                path: path.to_path_buf(),
                reason: format!("probe timed out after {:?}", self.timeout),
            })?
            .map_err(|err| SiloError::ProbeIndeterminate {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;

        tracing::trace!(path = %path.display(), live = status.success(), "Probed mountpoint");
        Ok(status.success())
    }
}

/// Prober that compares device IDs of a path and its parent.
///
/// A directory sitting on a different device than its parent is a mount
/// point. The stat calls run on the blocking pool because they can hang on
/// an unreachable NFS server; the deadline applies to the whole probe.
#[derive(Debug, Clone)]
pub struct StatProber {
    timeout: Duration,
}

impl StatProber {
    /// Prober with a custom deadline.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for StatProber {
    fn default() -> Self {
        Self::new(PROBE_TIMEOUT)
    }
}

#[async_trait]
impl MountProber for StatProber {
    async fn probe(&self, path: &Path) -> SiloResult<bool> {
        if path.as_os_str().is_empty() {
            return Ok(false);
        }

        let owned = path.to_path_buf();
        let check = tokio::task::spawn_blocking(move || stat_is_mountpoint(&owned));

        match tokio::time::timeout(self.timeout, check).await {
            Err(_) => Err(SiloError::ProbeIndeterminate {
                path: path.to_path_buf(),
                reason: format!("probe timed out after {:?}", self.timeout),
            }),
            Ok(Err(join_err)) => Err(SiloError::ProbeIndeterminate {
                path: path.to_path_buf(),
                reason: join_err.to_string(),
            }),
            Ok(Ok(outcome)) => outcome,
        }
    }
}

/// Point-in-time mount check: does `path` live on a different device than
/// its parent directory?
fn stat_is_mountpoint(path: &Path) -> SiloResult<bool> {
    let stat = match rustix::fs::stat(path) {
        Ok(stat) => stat,
        Err(errno) if errno == rustix::io::Errno::NOENT => return Ok(false),
        Err(errno) => {
            return Err(SiloError::ProbeIndeterminate {
                path: path.to_path_buf(),
                reason: std::io::Error::from(errno).to_string(),
            });
        }
    };

    // The filesystem root has no parent and is a mount by definition.
    let Some(parent) = path.parent() else {
        return Ok(true);
    };

    let parent_stat = rustix::fs::stat(parent).map_err(|errno| SiloError::ProbeIndeterminate {
        path: path.to_path_buf(),
        reason: std::io::Error::from(errno).to_string(),
    })?;

    Ok(stat.st_dev != parent_stat.st_dev)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_path_is_not_a_mount() {
        let prober = StatProber::default();
        assert!(!prober.probe(Path::new("")).await.unwrap());
    }

    #[tokio::test]
    async fn missing_path_is_not_a_mount() {
        let prober = StatProber::default();
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("never-created");
        assert!(!prober.probe(&gone).await.unwrap());
    }

    #[tokio::test]
    async fn plain_directory_is_not_a_mount() {
        let prober = StatProber::default();
        let dir = tempfile::tempdir().unwrap();
        assert!(!prober.probe(dir.path()).await.unwrap());
    }

    #[tokio::test]
    async fn filesystem_root_is_a_mount() {
        let prober = StatProber::default();
        assert!(prober.probe(Path::new("/")).await.unwrap());
    }
}
