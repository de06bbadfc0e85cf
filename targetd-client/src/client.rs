//! targetd HTTP client
//!
//! Speaks JSON-RPC 2.0 over HTTP(S) to the targetd management service.
//! Calls are made exactly once: retries are the caller's decision, since a
//! blindly repeated `vol_create` or `export_create` changes what the caller
//! observes.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::api::{Export, TargetdApi, first_free_lun};
use crate::error::{ClientError, Result};
use crate::jsonrpc::{
    ExportCreateParams, ExportDestroyParams, NoParams, Request, Response, VolCreateParams,
    VolDestroyParams, VolResizeParams,
};
use crate::metrics::RpcTimer;

/// Default overall request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Connection establishment timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for targetd.
#[derive(Debug, Clone)]
pub struct TargetdConfig {
    /// Full RPC endpoint, e.g. `https://storage:18700/targetrpc`
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Accept self-signed or otherwise invalid certificates
    pub insecure_skip_verify: bool,
    pub timeout: Duration,
}

impl TargetdConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            insecure_skip_verify: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Client for the targetd JSON-RPC API.
#[derive(Debug, Clone)]
pub struct TargetdClient {
    http: reqwest::Client,
    url: reqwest::Url,
    username: Option<String>,
    password: Option<String>,
}

impl TargetdClient {
    /// Build a client. No connection is made until the first call.
    pub fn new(config: TargetdConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(ClientError::InvalidUrl("URL must not be empty".to_string()));
        }

        let mut url = reqwest::Url::parse(&config.url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", config.url, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::InvalidUrl(format!(
                "{}: unsupported scheme '{}'",
                config.url,
                url.scheme()
            )));
        }

        // Credentials in the URL apply when none are configured explicitly
        let (mut username, mut password) = (config.username, config.password);
        if !url.username().is_empty() {
            if username.is_none() {
                username = Some(url.username().to_string());
                password = url.password().map(str::to_string);
            }
            let _ = url.set_username("");
            let _ = url.set_password(None);
        }

        if config.insecure_skip_verify {
            warn!(url = %url, "TLS certificate verification disabled for targetd");
        }

        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(config.timeout)
            .tcp_nodelay(true)
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()?;

        Ok(Self {
            http,
            url,
            username,
            password,
        })
    }

    pub fn url(&self) -> &reqwest::Url {
        &self.url
    }

    /// Issue one JSON-RPC call and decode its result.
    async fn call<P, T>(&self, method: &'static str, params: P) -> Result<T>
    where
        P: Serialize + Send,
        T: DeserializeOwned,
    {
        let timer = RpcTimer::new(method);
        let result = self.call_inner(method, params).await;

        match &result {
            Ok(_) => timer.finish("success"),
            Err(ClientError::Remote(e)) => timer.finish(&e.kind().to_string()),
            Err(_) => timer.finish("transport"),
        }

        result
    }

    async fn call_inner<P, T>(&self, method: &'static str, params: P) -> Result<T>
    where
        P: Serialize + Send,
        T: DeserializeOwned,
    {
        let request = Request::new(method, params);

        debug!(method = method, id = %request.id, "Calling targetd");

        let mut builder = self.http.post(self.url.clone()).json(&request);
        if let Some(ref username) = self.username {
            builder = builder.basic_auth(username, self.password.as_ref());
        }

        let response = builder.send().await?.error_for_status()?;
        let envelope: Response = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(format!("{} returned malformed JSON: {}", method, e)))?;

        envelope.into_result()
    }
}

#[async_trait]
impl TargetdApi for TargetdClient {
    async fn vol_create(&self, pool: &str, name: &str, size_bytes: u64) -> Result<()> {
        self.call(
            "vol_create",
            VolCreateParams {
                pool,
                name,
                size: size_bytes,
            },
        )
        .await
    }

    async fn vol_destroy(&self, pool: &str, name: &str) -> Result<()> {
        self.call("vol_destroy", VolDestroyParams { pool, name }).await
    }

    async fn vol_resize(&self, pool: &str, name: &str, size_bytes: u64) -> Result<()> {
        self.call(
            "vol_resize",
            VolResizeParams {
                pool,
                name,
                size: size_bytes,
            },
        )
        .await
    }

    async fn get_first_available_lun(&self) -> Result<i32> {
        let exports = self.export_list().await?;
        let lun = first_free_lun(&exports);
        debug!(lun = lun, exports = exports.len(), "Found first available LUN");
        Ok(lun)
    }

    async fn export_create(&self, pool: &str, name: &str, initiator: &str, lun: i32) -> Result<()> {
        self.call(
            "export_create",
            ExportCreateParams {
                pool,
                vol: name,
                initiator_wwn: initiator,
                lun,
            },
        )
        .await
    }

    async fn export_destroy(&self, pool: &str, name: &str, initiator: &str) -> Result<()> {
        self.call(
            "export_destroy",
            ExportDestroyParams {
                pool,
                vol: name,
                initiator_wwn: initiator,
            },
        )
        .await
    }

    async fn export_list(&self) -> Result<Vec<Export>> {
        self.call("export_list", NoParams {}).await
    }
}
