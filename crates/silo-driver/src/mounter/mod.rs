//! Mount executors.
//!
//! The executor performs the actual attach/detach of a remote filesystem.
//! It is stateless and knows nothing about volume names — the driver hands
//! it a source, a target path, and the per-request options.
//!
//! Two interchangeable strategies:
//! - [`ExecMounter`] shells out to `mount(8)`/`umount(8)` and captures the
//!   utility's diagnostic output into the returned error.
//! - [`SyscallMounter`] calls the kernel mount facility directly via
//!   `rustix` (Linux only).

mod exec;
mod syscall;

pub use exec::ExecMounter;
pub use syscall::SyscallMounter;

use std::path::Path;

use async_trait::async_trait;
use silo_common::SiloResult;

use crate::protocol::{OPT_AZ_MAP, RequestOpts};

/// Attaches and detaches remote filesystems.
///
/// All failures are returned, never panicked; the caller decides whether
/// to retry.
#[async_trait]
pub trait Mounter: Send + Sync {
    /// Attach `source` at `target`. `opts` are the caller's per-request
    /// options (e.g. an availability-zone source map).
    async fn mount(&self, source: &str, target: &Path, opts: &RequestOpts) -> SiloResult<()>;

    /// Detach the filesystem mounted at `target`.
    async fn unmount(&self, target: &Path) -> SiloResult<()>;
}

/// Substitute the zone-local source address when the request carries an
/// availability-zone map covering this host's zone.
///
/// The map routes the mount to the nearest replica of the remote
/// filesystem: `{"az-map": {"us-east-1a": "10.0.1.1", ...}}`.
fn resolve_source(source: &str, opts: &RequestOpts, zone: Option<&str>) -> String {
    if let (Some(zone), Some(serde_json::Value::Object(az_map))) = (zone, opts.get(OPT_AZ_MAP)) {
        if let Some(serde_json::Value::String(mapped)) = az_map.get(zone) {
            tracing::debug!(%source, %mapped, zone, "Substituted zone-local source");
            return mapped.clone();
        }
    }
    source.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn az_opts() -> RequestOpts {
        serde_json::from_str(
            r#"{"az-map": {"us-east-1a": "10.0.1.1", "us-east-1b": "10.0.2.1"}}"#,
        )
        .unwrap()
    }

    #[test]
    fn zone_match_substitutes_source() {
        assert_eq!(
            resolve_source("10.0.0.1", &az_opts(), Some("us-east-1b")),
            "10.0.2.1"
        );
    }

    #[test]
    fn zone_miss_keeps_source() {
        assert_eq!(
            resolve_source("10.0.0.1", &az_opts(), Some("eu-west-1a")),
            "10.0.0.1"
        );
    }

    #[test]
    fn no_zone_keeps_source() {
        assert_eq!(resolve_source("10.0.0.1", &az_opts(), None), "10.0.0.1");
    }

    #[test]
    fn no_map_keeps_source() {
        let opts = RequestOpts::new();
        assert_eq!(
            resolve_source("10.0.0.1", &opts, Some("us-east-1a")),
            "10.0.0.1"
        );
    }
}
