//! targetd Client Library
//!
//! Client for the targetd storage management service, which manages LVM
//! volumes and their iSCSI exports on a Linux storage host.
//!
//! This library provides:
//! - `TargetdApi`, the set of operations a provisioner depends on
//! - `TargetdClient`, the JSON-RPC over HTTP implementation
//! - `MockTargetd`, an in-memory implementation for tests
//! - Error codes and the helpers to unwrap them from a failure

pub mod api;
pub mod client;
pub mod error;
pub mod jsonrpc;
pub mod metrics;
pub mod mock;

pub use api::{Export, TargetdApi};
pub use client::{TargetdClient, TargetdConfig};
pub use error::{ClientError, ErrorCode, RemoteError};
pub use mock::MockTargetd;
