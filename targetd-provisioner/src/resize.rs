//! Volume expansion.

use tracing::info;

use crate::classify::RemoteOp;
use crate::error::{ProvisionError, Result};
use crate::provisioner::{IscsiProvisioner, absorb};
use crate::types::{POOL_ANNOTATION, VolumeDescriptor};

impl IscsiProvisioner {
    /// Grow the volume to `new_size_bytes`.
    ///
    /// targetd answers InvalidParameter when the volume is already at least
    /// that large, which is reported as success.
    pub async fn resize_volume(&self, volume: &VolumeDescriptor, new_size_bytes: u64) -> Result<()> {
        let pool = volume
            .annotation(POOL_ANNOTATION)
            .ok_or(ProvisionError::MissingAnnotation(POOL_ANNOTATION))?;
        let name = volume.name.as_str();

        info!(
            volume = %name,
            pool = %pool,
            new_size_bytes = new_size_bytes,
            "Resizing volume"
        );

        let result = self.client().vol_resize(pool, name, new_size_bytes).await;
        absorb(RemoteOp::VolResize, name, result, "unable to resize volume")?;

        info!(volume = %name, new_size_bytes = new_size_bytes, "Volume resized");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use targetd_client::MockTargetd;

    use crate::types::{IscsiVolumeSource, ReclaimPolicy};

    #[tokio::test]
    async fn test_missing_pool_annotation() {
        let mock = Arc::new(MockTargetd::new());
        let provisioner = IscsiProvisioner::new(mock.clone());
        let volume = VolumeDescriptor {
            name: "pvc-1".to_string(),
            access_modes: vec![],
            reclaim_policy: ReclaimPolicy::Delete,
            mount_options: vec![],
            capacity_bytes: 0,
            iscsi: IscsiVolumeSource {
                target_portal: String::new(),
                portals: vec![],
                iqn: String::new(),
                lun: 0,
                fs_type: String::new(),
            },
            annotations: BTreeMap::new(),
        };

        let err = provisioner.resize_volume(&volume, 1 << 30).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "annotation `targetd-provisioner/pool` is missing on volume"
        );
        assert!(mock.calls().await.is_empty());
    }
}
