//! Wire types for the docker volume-plugin protocol.
//!
//! One request/response pair per driver operation. Every response embeds an
//! `Err` string; an empty string means success. The transport returns
//! HTTP 200 in both cases — the embedded field is the error channel the
//! orchestrator actually reads.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Free-form per-request options (`Opts` in the wire contract).
pub type RequestOpts = serde_json::Map<String, serde_json::Value>;

/// Option key carrying the remote filesystem address on Create/OpenPerms.
pub const OPT_SOURCE: &str = "source";

/// Option key carrying an availability-zone → source map on Mount.
pub const OPT_AZ_MAP: &str = "az-map";

/// Extract the mandatory source option from a request's `Opts`.
///
/// Rejected before any state mutation or OS call: missing key and
/// non-string values are validation errors the caller must correct.
pub fn source_opt(opts: &RequestOpts) -> silo_common::SiloResult<&str> {
    match opts.get(OPT_SOURCE) {
        None => Err(silo_common::SiloError::MissingSource),
        Some(serde_json::Value::String(source)) => Ok(source.as_str()),
        Some(_) => Err(silo_common::SiloError::InvalidSource),
    }
}

/// Request to create a volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct CreateRequest {
    /// Volume name.
    pub name: String,
    /// Creation options; must carry [`OPT_SOURCE`].
    pub opts: RequestOpts,
}

/// Request to mount a volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct MountRequest {
    /// Volume name.
    pub name: String,
    /// Mount options; may carry [`OPT_AZ_MAP`].
    pub opts: RequestOpts,
}

/// Request to unmount a volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct UnmountRequest {
    /// Volume name.
    pub name: String,
}

/// Request to remove a volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RemoveRequest {
    /// Volume name.
    pub name: String,
}

/// Request to look up a single volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct GetRequest {
    /// Volume name.
    pub name: String,
}

/// Request for a volume's current mountpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct PathRequest {
    /// Volume name.
    pub name: String,
}

/// Administrative request to open permissions on a remote filesystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct OpenPermsRequest {
    /// Volume name (used only to derive a scratch mountpoint).
    pub name: String,
    /// Options; must carry [`OPT_SOURCE`].
    pub opts: RequestOpts,
}

/// Orchestrator-visible volume summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct VolumeInfo {
    /// Volume name.
    pub name: String,
    /// Current mountpoint; empty when not mounted.
    pub mountpoint: String,
}

impl From<&crate::registry::VolumeRecord> for VolumeInfo {
    fn from(record: &crate::registry::VolumeRecord) -> Self {
        Self {
            name: record.name.clone(),
            mountpoint: record
                .mountpoint
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_default(),
        }
    }
}

/// Response carrying only success or an error string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ErrorResponse {
    /// Error description; empty on success.
    pub err: String,
}

impl ErrorResponse {
    /// Failed response with the given error.
    pub fn error(err: impl std::fmt::Display) -> Self {
        Self {
            err: err.to_string(),
        }
    }
}

/// Response to a Mount request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct MountResponse {
    /// The local path the volume is attached at.
    pub mountpoint: String,
    /// Error description; empty on success.
    pub err: String,
}

impl MountResponse {
    /// Successful response carrying the mountpoint.
    #[must_use]
    pub fn mounted(mountpoint: &Path) -> Self {
        Self {
            mountpoint: mountpoint.display().to_string(),
            err: String::new(),
        }
    }

    /// Failed response with the given error.
    pub fn error(err: impl std::fmt::Display) -> Self {
        Self {
            mountpoint: String::new(),
            err: err.to_string(),
        }
    }
}

/// Response to a Path request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct PathResponse {
    /// The volume's current mountpoint.
    pub mountpoint: String,
    /// Error description; empty on success.
    pub err: String,
}

/// Response to a Get request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct GetResponse {
    /// The volume, when found.
    pub volume: VolumeInfo,
    /// Error description; empty on success.
    pub err: String,
}

/// Response to a List request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ListResponse {
    /// All registered volumes.
    pub volumes: Vec<VolumeInfo>,
    /// Error description; always empty — List cannot fail.
    pub err: String,
}

/// Response to plugin activation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ActivateResponse {
    /// Plugin subsystems implemented by this daemon.
    pub implements: Vec<String>,
}

/// Driver capability advertisement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct CapabilityInfo {
    /// Volume scope: `local` — each daemon owns only its host's mounts.
    pub scope: String,
}

/// Response to a Capabilities request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct CapabilitiesResponse {
    /// Advertised capabilities.
    pub capabilities: CapabilityInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_wire_shape() {
        let req: CreateRequest =
            serde_json::from_str(r#"{"Name":"v1","Opts":{"source":"10.0.0.1"}}"#).unwrap();
        assert_eq!(req.name, "v1");
        assert_eq!(
            req.opts.get(OPT_SOURCE).and_then(|v| v.as_str()),
            Some("10.0.0.1")
        );
    }

    #[test]
    fn missing_opts_defaults_to_empty() {
        let req: MountRequest = serde_json::from_str(r#"{"Name":"v1"}"#).unwrap();
        assert!(req.opts.is_empty());
    }

    #[test]
    fn error_field_is_always_serialized() {
        let resp = MountResponse::mounted(Path::new("/var/lib/silo/volumes/v1"));
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(r#""Mountpoint":"/var/lib/silo/volumes/v1""#));
        assert!(json.contains(r#""Err":"""#));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let req: UnmountRequest =
            serde_json::from_str(r#"{"Name":"v1","ID":"caller-7"}"#).unwrap();
        assert_eq!(req.name, "v1");
    }
}
