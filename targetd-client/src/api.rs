//! The targetd operations the provisioner depends on.
//!
//! `TargetdApi` is the seam between the provisioning logic and the remote
//! service. `TargetdClient` implements it over HTTP; `MockTargetd` implements
//! it in memory for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// An iSCSI export as reported by `export_list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Export {
    pub initiator_wwn: String,
    pub lun: i32,
    pub vol_name: String,
    pub pool: String,
    #[serde(default)]
    pub vol_uuid: String,
    #[serde(default)]
    pub vol_size: u64,
}

#[async_trait]
pub trait TargetdApi: Send + Sync {
    /// Create a volume of `size_bytes` in `pool`.
    async fn vol_create(&self, pool: &str, name: &str, size_bytes: u64) -> Result<()>;

    async fn vol_destroy(&self, pool: &str, name: &str) -> Result<()>;

    /// Grow a volume to `size_bytes`.
    async fn vol_resize(&self, pool: &str, name: &str, size_bytes: u64) -> Result<()>;

    /// Lowest LUN not used by any existing export.
    async fn get_first_available_lun(&self) -> Result<i32>;

    async fn export_create(&self, pool: &str, name: &str, initiator: &str, lun: i32) -> Result<()>;

    async fn export_destroy(&self, pool: &str, name: &str, initiator: &str) -> Result<()>;

    async fn export_list(&self) -> Result<Vec<Export>>;
}

/// Lowest non-negative LUN absent from `exports`.
pub fn first_free_lun(exports: &[Export]) -> i32 {
    let mut used: Vec<i32> = exports.iter().map(|e| e.lun).filter(|l| *l >= 0).collect();
    used.sort_unstable();
    used.dedup();

    let mut candidate = 0;
    for lun in used {
        if lun != candidate {
            break;
        }
        candidate += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    fn export(lun: i32) -> Export {
        Export {
            initiator_wwn: "iqn.1994-05.com.redhat:init1".to_string(),
            lun,
            vol_name: format!("vol{}", lun),
            pool: "pool0".to_string(),
            vol_uuid: String::new(),
            vol_size: 0,
        }
    }

    #[test]
    fn test_first_free_lun_empty() {
        assert_eq!(first_free_lun(&[]), 0);
    }

    #[test]
    fn test_first_free_lun_fills_gaps() {
        assert_eq!(first_free_lun(&[export(0), export(1), export(3)]), 2);
        assert_eq!(first_free_lun(&[export(1), export(2)]), 0);
    }

    #[test]
    fn test_first_free_lun_shared_lun() {
        // Several initiators share the LUN of one volume
        assert_eq!(first_free_lun(&[export(0), export(0), export(1)]), 2);
    }

    #[test]
    fn test_export_deserialize_without_optional_fields() {
        let json = r#"{"initiator_wwn":"iqn.x:y","lun":4,"vol_name":"pvc-1","pool":"pool0"}"#;
        let e: Export = serde_json::from_str(json).unwrap();
        assert_eq!(e.lun, 4);
        assert_eq!(e.vol_size, 0);
    }
}
