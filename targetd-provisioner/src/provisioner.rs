//! iSCSI Provisioner
//!
//! Creates volumes on targetd and exports them to the initiators named by the
//! StorageClass. Teardown lives in `deprovision`, resizing in `resize`.
//!
//! None of the operations roll back on partial failure. A volume that was
//! created before a failed export stays on targetd; the caller is expected to
//! run the same operation again, and every step tolerates the answer targetd
//! gives when that step was already done.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use targetd_client::{ClientError, TargetdApi};
use tracing::{debug, error, info, warn};

use crate::classify::{Disposition, RemoteOp, classify, describe};
use crate::error::{ProvisionError, Result};
use crate::metrics::{self, Operation, OperationTimer};
use crate::parameters::StorageClassParameters;
use crate::types::{
    AccessMode, ExportPolicy, INITIATORS_ANNOTATION, IscsiVolumeSource, POOL_ANNOTATION,
    ProvisionRequest, VolumeDescriptor, format_access_modes,
};

/// Name the orchestrator routes StorageClasses to this provisioner by.
pub const PROVISIONER_NAME: &str = "targetd-provisioner-iscsi";

/// Access modes an iSCSI LUN can honour.
pub const SUPPORTED_ACCESS_MODES: &[AccessMode] = &[AccessMode::ReadWriteOnce, AccessMode::ReadOnlyMany];

/// The operations the orchestration controller drives.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Name StorageClasses use to select this provisioner.
    fn name(&self) -> &str;

    /// Create the volume and its exports and describe the result.
    async fn provision(&self, request: &ProvisionRequest) -> Result<VolumeDescriptor>;

    /// Remove the exports and the volume described by `volume`.
    async fn delete(&self, volume: &VolumeDescriptor) -> Result<()>;

    /// Grow `volume` to `new_size_bytes`.
    async fn resize(&self, volume: &VolumeDescriptor, new_size_bytes: u64) -> Result<()>;
}

/// Returns whether every requested mode is contained in `modes`.
pub fn access_modes_contained_in_all(modes: &[AccessMode], requested: &[AccessMode]) -> bool {
    requested.iter().all(|mode| modes.contains(mode))
}

/// Provisioner backed by a targetd instance.
pub struct IscsiProvisioner {
    client: Arc<dyn TargetdApi>,
    name: String,
    export_policy: ExportPolicy,
}

impl IscsiProvisioner {
    pub fn new(client: Arc<dyn TargetdApi>) -> Self {
        Self {
            client,
            name: PROVISIONER_NAME.to_string(),
            export_policy: ExportPolicy::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_export_policy(mut self, export_policy: ExportPolicy) -> Self {
        self.export_policy = export_policy;
        self
    }

    pub fn export_policy(&self) -> ExportPolicy {
        self.export_policy
    }

    pub(crate) fn client(&self) -> &dyn TargetdApi {
        self.client.as_ref()
    }

    /// Create the volume, allocate a LUN, export it to every initiator.
    ///
    /// LUN allocation is not atomic: the first free LUN is read from targetd
    /// and used by the export calls that follow. Two volumes provisioned
    /// concurrently for the same initiator can read the same LUN, and the
    /// export of the slower one then fails with ExistsInitiator. Nothing
    /// serialises allocation here; the failed provision is left to the
    /// caller's retry, which picks a fresh LUN when no export of the volume
    /// was created.
    pub async fn provision_volume(&self, request: &ProvisionRequest) -> Result<VolumeDescriptor> {
        if !access_modes_contained_in_all(SUPPORTED_ACCESS_MODES, &request.access_modes) {
            return Err(ProvisionError::UnsupportedAccessModes {
                requested: format_access_modes(&request.access_modes),
                supported: format_access_modes(SUPPORTED_ACCESS_MODES),
            });
        }

        if request.volume_name.is_empty() {
            return Err(ProvisionError::EmptyVolumeName);
        }

        let params = StorageClassParameters::parse(&request.parameters)?;
        let name = request.volume_name.as_str();
        let size_bytes = request.capacity_bytes;

        info!(
            volume = %name,
            pool = %params.pool,
            size_bytes = size_bytes,
            initiators = params.initiators.len(),
            export_policy = %self.export_policy,
            "Provisioning volume"
        );

        let result = self.client.vol_create(&params.pool, name, size_bytes).await;
        absorb(RemoteOp::VolCreate, name, result, "unable to create volume")?;

        let (lun, exported) = match self.export_policy {
            ExportPolicy::Strict => (self.allocate_lun().await?, HashSet::new()),
            ExportPolicy::Reuse => self.existing_lun_or_allocate(&params.pool, name).await?,
        };

        for initiator in &params.initiators {
            if exported.contains(initiator) {
                debug!(volume = %name, initiator = %initiator, lun = lun, "Export already present");
                continue;
            }

            debug!(volume = %name, initiator = %initiator, lun = lun, "Creating export");
            let result = self
                .client
                .export_create(&params.pool, name, initiator, lun)
                .await;
            absorb(RemoteOp::ExportCreate, name, result, "unable to create export")?;
        }

        info!(volume = %name, lun = lun, "Volume provisioned");

        Ok(build_descriptor(request, params, lun))
    }

    async fn allocate_lun(&self) -> Result<i32> {
        self.client
            .get_first_available_lun()
            .await
            .map_err(|e| fatal("unable to find an available LUN", e))
    }

    /// LUN already used by exports of this volume, with the initiators those
    /// exports cover; a freshly allocated LUN when there are none.
    async fn existing_lun_or_allocate(&self, pool: &str, name: &str) -> Result<(i32, HashSet<String>)> {
        let exports = self
            .client
            .export_list()
            .await
            .map_err(|e| fatal("unable to list exports", e))?;

        let lun = exports
            .iter()
            .find(|e| e.pool == pool && e.vol_name == name)
            .map(|e| e.lun);

        match lun {
            Some(lun) => {
                let exported: HashSet<String> = exports
                    .into_iter()
                    .filter(|e| e.pool == pool && e.vol_name == name && e.lun == lun)
                    .map(|e| e.initiator_wwn)
                    .collect();
                info!(
                    volume = %name,
                    lun = lun,
                    exported = exported.len(),
                    "Reusing LUN of existing exports"
                );
                Ok((lun, exported))
            }
            None => Ok((self.allocate_lun().await?, HashSet::new())),
        }
    }
}

fn build_descriptor(request: &ProvisionRequest, params: StorageClassParameters, lun: i32) -> VolumeDescriptor {
    let mut annotations = BTreeMap::new();
    annotations.insert(POOL_ANNOTATION.to_string(), params.pool);
    annotations.insert(INITIATORS_ANNOTATION.to_string(), params.initiators.join(","));

    VolumeDescriptor {
        name: request.volume_name.clone(),
        // Already checked against SUPPORTED_ACCESS_MODES
        access_modes: request.access_modes.clone(),
        reclaim_policy: request.reclaim_policy,
        mount_options: request.mount_options.clone(),
        capacity_bytes: request.capacity_bytes,
        iscsi: IscsiVolumeSource {
            target_portal: params.portals.first().cloned().unwrap_or_default(),
            portals: params.portals,
            iqn: params.target,
            lun,
            fs_type: params.fs_type,
        },
        annotations,
    }
}

/// Wrap a failed call into the error returned to the caller.
pub(crate) fn fatal(action: &'static str, err: ClientError) -> ProvisionError {
    ProvisionError::Remote {
        action,
        detail: describe(&err),
        source: err,
    }
}

/// Settle the result of a call: success and already-done outcomes pass,
/// anything else becomes a fatal error.
pub(crate) fn absorb(
    op: RemoteOp,
    volume: &str,
    result: targetd_client::error::Result<()>,
    action: &'static str,
) -> Result<()> {
    let Err(err) = result else {
        return Ok(());
    };

    match classify(op, &err) {
        Disposition::AlreadyDone => {
            let code = err.kind().map(|c| c.to_string()).unwrap_or_default();
            warn!(
                volume = %volume,
                call = op.as_str(),
                code = %code,
                "targetd reports the call as already done, continuing"
            );
            metrics::record_idempotent(op.as_str(), &code);
            Ok(())
        }
        Disposition::Fatal => Err(fatal(action, err)),
    }
}

fn finish<T>(timer: OperationTimer, volume: &str, result: &Result<T>) {
    match result {
        Ok(_) => timer.observe(None),
        Err(e) => {
            error!(operation = timer.operation().as_str(), volume = %volume, error = %e, "Operation failed");
            timer.observe(Some(e.label()));
        }
    }
}

#[async_trait]
impl Provisioner for IscsiProvisioner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn provision(&self, request: &ProvisionRequest) -> Result<VolumeDescriptor> {
        let timer = OperationTimer::start(Operation::Provision);
        let result = self.provision_volume(request).await;
        finish(timer, &request.volume_name, &result);
        result
    }

    async fn delete(&self, volume: &VolumeDescriptor) -> Result<()> {
        let timer = OperationTimer::start(Operation::Delete);
        let result = self.delete_volume(volume).await;
        finish(timer, &volume.name, &result);
        result
    }

    async fn resize(&self, volume: &VolumeDescriptor, new_size_bytes: u64) -> Result<()> {
        let timer = OperationTimer::start(Operation::Resize);
        let result = self.resize_volume(volume, new_size_bytes).await;
        finish(timer, &volume.name, &result);
        result
    }
}
