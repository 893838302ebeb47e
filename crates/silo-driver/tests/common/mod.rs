//! Scripted test doubles shared by the integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use silo_common::{SiloError, SiloResult};
use silo_driver::mounter::Mounter;
use silo_driver::probe::MountProber;
use silo_driver::protocol::RequestOpts;

/// Mount executor that records calls and fails on demand.
#[derive(Default)]
pub struct FakeMounter {
    pub mounts: Mutex<Vec<(String, PathBuf)>>,
    pub unmounts: Mutex<Vec<PathBuf>>,
    pub fail_mount: Mutex<Option<String>>,
    pub fail_unmount: Mutex<Option<String>>,
}

impl FakeMounter {
    pub fn mount_calls(&self) -> usize {
        self.mounts.lock().len()
    }

    pub fn unmount_calls(&self) -> usize {
        self.unmounts.lock().len()
    }

    pub fn fail_next_mount(&self, reason: &str) {
        *self.fail_mount.lock() = Some(reason.to_string());
    }

    pub fn fail_next_unmount(&self, reason: &str) {
        *self.fail_unmount.lock() = Some(reason.to_string());
    }
}

#[async_trait]
impl Mounter for FakeMounter {
    async fn mount(&self, source: &str, target: &Path, _opts: &RequestOpts) -> SiloResult<()> {
        if let Some(reason) = self.fail_mount.lock().take() {
            return Err(SiloError::Mount {
                src: source.to_string(),
                target: target.to_path_buf(),
                reason,
            });
        }
        self.mounts
            .lock()
            .push((source.to_string(), target.to_path_buf()));
        Ok(())
    }

    async fn unmount(&self, target: &Path) -> SiloResult<()> {
        if let Some(reason) = self.fail_unmount.lock().take() {
            return Err(SiloError::Unmount {
                target: target.to_path_buf(),
                reason,
            });
        }
        self.unmounts.lock().push(target.to_path_buf());
        Ok(())
    }
}

/// Prober scripted to a fixed outcome; `None` means indeterminate.
pub struct FakeProber {
    pub outcome: Mutex<Option<bool>>,
}

impl FakeProber {
    /// Prober that reports every path as a live mount.
    pub fn mounted() -> Self {
        Self {
            outcome: Mutex::new(Some(true)),
        }
    }

    pub fn set(&self, outcome: Option<bool>) {
        *self.outcome.lock() = outcome;
    }
}

#[async_trait]
impl MountProber for FakeProber {
    async fn probe(&self, path: &Path) -> SiloResult<bool> {
        let outcome = *self.outcome.lock();
        outcome.ok_or_else(|| SiloError::ProbeIndeterminate {
            path: path.to_path_buf(),
            reason: "scripted probe failure".to_string(),
        })
    }
}

/// Build a Create request carrying a source option.
pub fn create_request(name: &str, source: &str) -> silo_driver::protocol::CreateRequest {
    let mut opts = RequestOpts::new();
    opts.insert(
        "source".to_string(),
        serde_json::Value::String(source.to_string()),
    );
    silo_driver::protocol::CreateRequest {
        name: name.to_string(),
        opts,
    }
}

/// Build a Mount request with empty options.
pub fn mount_request(name: &str) -> silo_driver::protocol::MountRequest {
    silo_driver::protocol::MountRequest {
        name: name.to_string(),
        opts: RequestOpts::new(),
    }
}
