//! targetd iSCSI Provisioner Library
//!
//! Dynamic volume provisioning on top of targetd: volumes are created in an
//! LVM pool and exported over iSCSI to a fixed set of initiators.
//!
//! This library provides:
//! - StorageClass parameter parsing
//! - The `Provisioner` contract and its targetd-backed implementation
//! - Classification of targetd errors into already-done and fatal outcomes
//! - Prometheus metrics for the operations

pub mod classify;
mod deprovision;
pub mod error;
pub mod metrics;
pub mod parameters;
pub mod provisioner;
mod resize;
pub mod types;

pub use error::ProvisionError;
pub use parameters::StorageClassParameters;
pub use provisioner::{IscsiProvisioner, PROVISIONER_NAME, Provisioner};
pub use types::{AccessMode, ExportPolicy, ProvisionRequest, ReclaimPolicy, VolumeDescriptor};
