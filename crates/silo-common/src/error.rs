//! Common error types for the Silo volume plugin.
//!
//! The variants follow the failure classes a volume-plugin caller must be
//! able to tell apart: validation, not-found, precondition, execution, and
//! probe-indeterminate. The `Display` strings are part of the wire contract
//! (they travel back to the orchestrator in the response's `Err` field), so
//! changing them is a breaking change.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`SiloError`].
pub type SiloResult<T> = Result<T, SiloError>;

/// Errors returned by the Silo volume driver and its collaborators.
#[derive(Error, Diagnostic, Debug)]
pub enum SiloError {
    /// Request arrived without a volume name.
    #[error("Missing mandatory 'volume_name'")]
    #[diagnostic(code(silo::request::missing_name))]
    MissingVolumeName,

    /// Create/OpenPerms request lacks the mandatory source option.
    #[error("Missing mandatory 'source' field in 'Opts'")]
    #[diagnostic(
        code(silo::request::missing_source),
        help("Pass the remote filesystem address as Opts[\"source\"]")
    )]
    MissingSource,

    /// The source option is present but not a string.
    #[error("'source' field in 'Opts' must be a string")]
    #[diagnostic(code(silo::request::invalid_source))]
    InvalidSource,

    /// Volume is not in the registry.
    #[error("Volume '{name}' not found")]
    #[diagnostic(code(silo::volume::not_found))]
    VolumeNotFound {
        /// The volume name that was not found.
        name: String,
    },

    /// Mount was requested for a volume that was never created.
    #[error("Volume '{name}' must be created before being mounted")]
    #[diagnostic(code(silo::volume::not_created))]
    NotCreated {
        /// The volume name the caller tried to mount.
        name: String,
    },

    /// Unmount/Path was requested for a volume that was never mounted.
    #[error("Volume '{name}' not previously mounted")]
    #[diagnostic(code(silo::volume::not_mounted))]
    NotPreviouslyMounted {
        /// The volume name.
        name: String,
    },

    /// A second Create supplied a source that differs from the recorded one.
    #[error("Volume '{name}' already exists with source '{existing}'")]
    #[diagnostic(
        code(silo::volume::source_mismatch),
        help("The source is fixed at first creation; remove and re-create the volume to change it")
    )]
    SourceMismatch {
        /// The volume name.
        name: String,
        /// The source recorded at creation time.
        existing: String,
    },

    /// The recorded mountpoint is no longer an actual mount.
    #[error("Mountpoint '{}' for volume '{name}' is no longer mounted, nothing to do", path.display())]
    #[diagnostic(
        code(silo::mount::gone),
        help("Remove the volume or restart the daemon to reconcile state")
    )]
    MountpointGone {
        /// The volume name.
        name: String,
        /// The recorded mountpoint path.
        path: PathBuf,
    },

    /// The existence probe itself failed; mount state cannot be established.
    #[error("Unable to determine whether '{}' is mounted: {reason}", path.display())]
    #[diagnostic(code(silo::mount::probe_indeterminate))]
    ProbeIndeterminate {
        /// The path that was probed.
        path: PathBuf,
        /// Why the probe failed.
        reason: String,
    },

    /// The mount executor failed to attach the remote filesystem.
    #[error("Error mounting volume from '{src}' at '{}': {reason}", target.display())]
    #[diagnostic(code(silo::mount::failed))]
    Mount {
        /// The remote filesystem source.
        src: String,
        /// The local target path.
        target: PathBuf,
        /// Executor diagnostic output or OS error.
        reason: String,
    },

    /// The mount executor failed to detach the filesystem.
    #[error("Error unmounting volume at '{}': {reason}", target.display())]
    #[diagnostic(code(silo::mount::unmount_failed))]
    Unmount {
        /// The local mountpoint path.
        target: PathBuf,
        /// Executor diagnostic output or OS error.
        reason: String,
    },

    /// Changing permissions on a mounted volume failed.
    #[error("Error changing permissions on '{}': {reason}", path.display())]
    #[diagnostic(code(silo::voltools::chmod))]
    Chmod {
        /// The mountpoint whose permissions were being opened.
        path: PathBuf,
        /// The underlying OS error.
        reason: String,
    },

    /// Writing the registry state file failed.
    #[error("Failed to persist volume state: {reason}")]
    #[diagnostic(
        code(silo::state::persist),
        help("The in-memory state may be ahead of the state file until the next successful write")
    )]
    Persist {
        /// The underlying write or serialization error.
        reason: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(silo::io))]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    #[diagnostic(code(silo::serialization))]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(silo::config))]
    Config {
        /// The error message.
        message: String,
    },

    /// Feature not supported on this platform.
    #[error("Feature not supported: {feature}")]
    #[diagnostic(
        code(silo::unsupported),
        help("Use the exec mounter strategy on non-Linux hosts")
    )]
    Unsupported {
        /// The unsupported feature.
        feature: String,
    },
}

impl From<serde_json::Error> for SiloError {
    fn from(err: serde_json::Error) -> Self {
        SiloError::Serialization(err.to_string())
    }
}
