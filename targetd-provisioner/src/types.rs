//! Request and descriptor types exchanged with the orchestration layer.
//!
//! Everything here is serde-serialisable with the field names Kubernetes
//! uses, so a descriptor written by `provision` can be persisted as JSON and
//! fed back to `delete` or `resize` unchanged.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Annotation carrying the pool the volume lives in
pub const POOL_ANNOTATION: &str = "targetd-provisioner/pool";
/// Annotation carrying the comma-joined initiator list the volume is exported to
pub const INITIATORS_ANNOTATION: &str = "targetd-provisioner/initiators";

// ============================================================================
// AccessMode
// ============================================================================

/// Volume access mode as requested by a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    ReadWriteOnce,
    ReadOnlyMany,
    ReadWriteMany,
    ReadWriteOncePod,
}

impl Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::ReadWriteOnce => write!(f, "ReadWriteOnce"),
            AccessMode::ReadOnlyMany => write!(f, "ReadOnlyMany"),
            AccessMode::ReadWriteMany => write!(f, "ReadWriteMany"),
            AccessMode::ReadWriteOncePod => write!(f, "ReadWriteOncePod"),
        }
    }
}

impl FromStr for AccessMode {
    type Err = AccessModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ReadWriteOnce" | "RWO" => Ok(AccessMode::ReadWriteOnce),
            "ReadOnlyMany" | "ROX" => Ok(AccessMode::ReadOnlyMany),
            "ReadWriteMany" | "RWX" => Ok(AccessMode::ReadWriteMany),
            "ReadWriteOncePod" | "RWOP" => Ok(AccessMode::ReadWriteOncePod),
            _ => Err(AccessModeParseError(s.to_string())),
        }
    }
}

/// Error returned when parsing an invalid access mode.
#[derive(Debug, Clone)]
pub struct AccessModeParseError(String);

impl Display for AccessModeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown access mode '{}': expected ReadWriteOnce, ReadOnlyMany, ReadWriteMany or ReadWriteOncePod",
            self.0
        )
    }
}

impl std::error::Error for AccessModeParseError {}

/// Format a list of modes as `[A B]`.
pub fn format_access_modes(modes: &[AccessMode]) -> String {
    let modes: Vec<String> = modes.iter().map(ToString::to_string).collect();
    format!("[{}]", modes.join(" "))
}

// ============================================================================
// ReclaimPolicy
// ============================================================================

/// What the orchestrator does with a volume once its claim is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReclaimPolicy {
    #[default]
    Delete,
    Retain,
    Recycle,
}

impl Display for ReclaimPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReclaimPolicy::Delete => write!(f, "Delete"),
            ReclaimPolicy::Retain => write!(f, "Retain"),
            ReclaimPolicy::Recycle => write!(f, "Recycle"),
        }
    }
}

// ============================================================================
// ExportPolicy
// ============================================================================

/// How `provision` treats exports left behind by an earlier attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportPolicy {
    /// Look for exports of the volume first: reuse their LUN and skip the
    /// initiators that already have one. A retried provision ends with the
    /// same LUN and export set.
    #[default]
    Reuse,
    /// Always allocate the first free LUN and create every export. A retry
    /// allocates a new LUN, and targetd rejects the exports that already
    /// exist with the old one.
    Strict,
}

impl Display for ExportPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportPolicy::Strict => write!(f, "strict"),
            ExportPolicy::Reuse => write!(f, "reuse"),
        }
    }
}

impl FromStr for ExportPolicy {
    type Err = ExportPolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reuse" | "" => Ok(ExportPolicy::Reuse),
            "strict" => Ok(ExportPolicy::Strict),
            _ => Err(ExportPolicyParseError(s.to_string())),
        }
    }
}

/// Error returned when parsing an invalid export policy.
#[derive(Debug, Clone)]
pub struct ExportPolicyParseError(String);

impl Display for ExportPolicyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown export policy '{}': expected 'reuse' or 'strict'", self.0)
    }
}

impl std::error::Error for ExportPolicyParseError {}

// ============================================================================
// ProvisionRequest
// ============================================================================

/// A request to provision one volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    pub access_modes: Vec<AccessMode>,
    /// Requested capacity in bytes
    pub capacity_bytes: u64,
    /// Caller-assigned, unique volume name
    pub volume_name: String,
    /// Storage class parameters
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    #[serde(default)]
    pub reclaim_policy: ReclaimPolicy,
    #[serde(default)]
    pub mount_options: Vec<String>,
}

// ============================================================================
// VolumeDescriptor
// ============================================================================

/// iSCSI connection details handed to the nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IscsiVolumeSource {
    pub target_portal: String,
    pub portals: Vec<String>,
    pub iqn: String,
    pub lun: i32,
    pub fs_type: String,
}

/// A provisioned volume.
///
/// `annotations` hold the recovery metadata: they are the only state
/// `delete` and `resize` read to find the volume again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeDescriptor {
    pub name: String,
    pub access_modes: Vec<AccessMode>,
    pub reclaim_policy: ReclaimPolicy,
    #[serde(default)]
    pub mount_options: Vec<String>,
    pub capacity_bytes: u64,
    pub iscsi: IscsiVolumeSource,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl VolumeDescriptor {
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}
