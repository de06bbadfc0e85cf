//! Volume teardown driven by the descriptor's annotations.

use tracing::{debug, info};

use crate::classify::RemoteOp;
use crate::error::{ProvisionError, Result};
use crate::parameters::split_list;
use crate::provisioner::{IscsiProvisioner, absorb};
use crate::types::{INITIATORS_ANNOTATION, POOL_ANNOTATION, VolumeDescriptor};

impl IscsiProvisioner {
    /// Remove every export of the volume, then the volume itself.
    ///
    /// Only the pool and initiator annotations written by `provision` are
    /// consulted. Exports or a volume that are already gone count as removed,
    /// so calling this again after a success, or after a partial failure,
    /// is safe. The first other failure stops the teardown: later exports and
    /// the volume are left for the next call.
    pub async fn delete_volume(&self, volume: &VolumeDescriptor) -> Result<()> {
        let pool = volume
            .annotation(POOL_ANNOTATION)
            .ok_or(ProvisionError::MissingAnnotation(POOL_ANNOTATION))?;
        let initiators = volume
            .annotation(INITIATORS_ANNOTATION)
            .ok_or(ProvisionError::MissingAnnotation(INITIATORS_ANNOTATION))?;
        let name = volume.name.as_str();

        info!(volume = %name, pool = %pool, "Deleting volume");

        for initiator in split_list(initiators) {
            debug!(volume = %name, initiator = %initiator, "Removing export");
            let result = self.client().export_destroy(pool, name, &initiator).await;
            absorb(RemoteOp::ExportDestroy, name, result, "unable to remove export")?;
        }

        let result = self.client().vol_destroy(pool, name).await;
        absorb(RemoteOp::VolDestroy, name, result, "unable to remove volume")?;

        info!(volume = %name, "Volume deleted");
        Ok(())
    }
}
