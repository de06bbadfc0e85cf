//! In-memory targetd
//!
//! `MockTargetd` keeps volumes and exports in memory and answers with the
//! same error codes targetd uses. Every call is recorded, and failures can be
//! scripted per method, which makes it the test double for anything written
//! against `TargetdApi`.

use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::api::{Export, TargetdApi, first_free_lun};
use crate::error::{ClientError, ErrorCode, RemoteError, Result};

/// The targetd method a call was made to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    VolCreate,
    VolDestroy,
    VolResize,
    GetFirstAvailableLun,
    ExportCreate,
    ExportDestroy,
    ExportList,
}

/// A recorded call with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    VolCreate { pool: String, name: String, size: u64 },
    VolDestroy { pool: String, name: String },
    VolResize { pool: String, name: String, size: u64 },
    GetFirstAvailableLun,
    ExportCreate { pool: String, name: String, initiator: String, lun: i32 },
    ExportDestroy { pool: String, name: String, initiator: String },
    ExportList,
}

impl Call {
    pub fn method(&self) -> Method {
        match self {
            Call::VolCreate { .. } => Method::VolCreate,
            Call::VolDestroy { .. } => Method::VolDestroy,
            Call::VolResize { .. } => Method::VolResize,
            Call::GetFirstAvailableLun => Method::GetFirstAvailableLun,
            Call::ExportCreate { .. } => Method::ExportCreate,
            Call::ExportDestroy { .. } => Method::ExportDestroy,
            Call::ExportList => Method::ExportList,
        }
    }
}

/// A failure queued for a method.
#[derive(Debug, Clone)]
pub enum Injected {
    /// Answer with a targetd error
    Remote(RemoteError),
    /// Fail the way a broken connection would, without a targetd code
    Opaque(String),
}

impl From<Injected> for ClientError {
    fn from(value: Injected) -> Self {
        match value {
            Injected::Remote(e) => ClientError::Remote(e),
            Injected::Opaque(msg) => ClientError::InvalidResponse(msg),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    /// (pool, name) -> size in bytes
    volumes: BTreeMap<(String, String), u64>,
    exports: Vec<Export>,
    calls: Vec<Call>,
    injected: HashMap<Method, VecDeque<Injected>>,
}

impl State {
    fn take_injected(&mut self, method: Method) -> Option<ClientError> {
        self.injected
            .get_mut(&method)
            .and_then(VecDeque::pop_front)
            .map(ClientError::from)
    }
}

fn remote(code: ErrorCode, message: impl Into<String>) -> ClientError {
    RemoteError::new(code, message).into()
}

#[derive(Debug, Default)]
pub struct MockTargetd {
    state: Mutex<State>,
}

impl MockTargetd {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `error` as the answer to the next call of `method`. The call is
    /// still recorded.
    pub async fn fail_next(&self, method: Method, error: Injected) {
        self.state
            .lock()
            .await
            .injected
            .entry(method)
            .or_default()
            .push_back(error);
    }

    /// Shorthand for queueing a targetd error code.
    pub async fn fail_next_with_code(&self, method: Method, code: ErrorCode) {
        self.fail_next(method, Injected::Remote(RemoteError::new(code, "injected failure")))
            .await;
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.state.lock().await.calls.clone()
    }

    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    /// Size of a volume, if it exists.
    pub async fn volume_size(&self, pool: &str, name: &str) -> Option<u64> {
        self.state
            .lock()
            .await
            .volumes
            .get(&(pool.to_string(), name.to_string()))
            .copied()
    }

    pub async fn volume_count(&self) -> usize {
        self.state.lock().await.volumes.len()
    }

    pub async fn exports(&self) -> Vec<Export> {
        self.state.lock().await.exports.clone()
    }

    /// Seed an export that was not created through the API.
    pub async fn insert_export(&self, export: Export) {
        self.state.lock().await.exports.push(export);
    }
}

#[async_trait]
impl TargetdApi for MockTargetd {
    async fn vol_create(&self, pool: &str, name: &str, size_bytes: u64) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(Call::VolCreate {
            pool: pool.to_string(),
            name: name.to_string(),
            size: size_bytes,
        });
        if let Some(err) = state.take_injected(Method::VolCreate) {
            return Err(err);
        }

        let key = (pool.to_string(), name.to_string());
        if state.volumes.contains_key(&key) {
            return Err(remote(ErrorCode::NameConflict, "Volume with that name exists"));
        }
        state.volumes.insert(key, size_bytes);
        Ok(())
    }

    async fn vol_destroy(&self, pool: &str, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(Call::VolDestroy {
            pool: pool.to_string(),
            name: name.to_string(),
        });
        if let Some(err) = state.take_injected(Method::VolDestroy) {
            return Err(err);
        }

        let key = (pool.to_string(), name.to_string());
        if !state.volumes.contains_key(&key) {
            return Err(remote(
                ErrorCode::VolumeNotFound,
                format!("Volume {} not found in pool {}", name, pool),
            ));
        }
        if state.exports.iter().any(|e| e.pool == pool && e.vol_name == name) {
            return Err(remote(ErrorCode::VolumeMasked, "Volume is exported"));
        }
        state.volumes.remove(&key);
        Ok(())
    }

    async fn vol_resize(&self, pool: &str, name: &str, size_bytes: u64) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(Call::VolResize {
            pool: pool.to_string(),
            name: name.to_string(),
            size: size_bytes,
        });
        if let Some(err) = state.take_injected(Method::VolResize) {
            return Err(err);
        }

        let Some(size) = state.volumes.get_mut(&(pool.to_string(), name.to_string())) else {
            return Err(remote(
                ErrorCode::VolumeNotFound,
                format!("Volume {} not found in pool {}", name, pool),
            ));
        };
        if size_bytes <= *size {
            return Err(remote(
                ErrorCode::InvalidParameter,
                "New size must be larger than current size",
            ));
        }
        *size = size_bytes;
        Ok(())
    }

    async fn get_first_available_lun(&self) -> Result<i32> {
        let mut state = self.state.lock().await;
        state.calls.push(Call::GetFirstAvailableLun);
        if let Some(err) = state.take_injected(Method::GetFirstAvailableLun) {
            return Err(err);
        }
        Ok(first_free_lun(&state.exports))
    }

    async fn export_create(&self, pool: &str, name: &str, initiator: &str, lun: i32) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(Call::ExportCreate {
            pool: pool.to_string(),
            name: name.to_string(),
            initiator: initiator.to_string(),
            lun,
        });
        if let Some(err) = state.take_injected(Method::ExportCreate) {
            return Err(err);
        }

        let Some(size) = state.volumes.get(&(pool.to_string(), name.to_string())).copied() else {
            return Err(remote(
                ErrorCode::VolumeNotFound,
                format!("Volume {} not found in pool {}", name, pool),
            ));
        };

        if let Some(existing) = state
            .exports
            .iter()
            .find(|e| e.pool == pool && e.vol_name == name && e.initiator_wwn == initiator)
        {
            // Re-mapping the same LUN is a no-op, a different one conflicts
            if existing.lun == lun {
                return Ok(());
            }
            return Err(remote(
                ErrorCode::ExistsInitiator,
                format!("Volume already exported to {} as LUN {}", initiator, existing.lun),
            ));
        }

        if state
            .exports
            .iter()
            .any(|e| e.initiator_wwn == initiator && e.lun == lun)
        {
            return Err(remote(
                ErrorCode::ExistsInitiator,
                format!("LUN {} already mapped for {}", lun, initiator),
            ));
        }

        state.exports.push(Export {
            initiator_wwn: initiator.to_string(),
            lun,
            vol_name: name.to_string(),
            pool: pool.to_string(),
            vol_uuid: String::new(),
            vol_size: size,
        });
        Ok(())
    }

    async fn export_destroy(&self, pool: &str, name: &str, initiator: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(Call::ExportDestroy {
            pool: pool.to_string(),
            name: name.to_string(),
            initiator: initiator.to_string(),
        });
        if let Some(err) = state.take_injected(Method::ExportDestroy) {
            return Err(err);
        }

        let before = state.exports.len();
        state
            .exports
            .retain(|e| !(e.pool == pool && e.vol_name == name && e.initiator_wwn == initiator));
        if state.exports.len() == before {
            return Err(remote(ErrorCode::VolumeExportNotFound, "Volume export not found"));
        }
        Ok(())
    }

    async fn export_list(&self) -> Result<Vec<Export>> {
        let mut state = self.state.lock().await;
        state.calls.push(Call::ExportList);
        if let Some(err) = state.take_injected(Method::ExportList) {
            return Err(err);
        }
        Ok(state.exports.clone())
    }
}
