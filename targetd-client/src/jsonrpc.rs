//! JSON-RPC 2.0 envelopes and targetd method parameters.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, RemoteError, Result};

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Serialize)]
pub struct Request<'a, P> {
    pub jsonrpc: &'static str,
    pub id: String,
    pub method: &'a str,
    pub params: P,
}

impl<'a, P: Serialize> Request<'a, P> {
    pub fn new(method: &'a str, params: P) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: uuid::Uuid::new_v4().to_string(),
            method,
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorObject>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl Response {
    /// Turn the envelope into the method result, surfacing targetd errors as
    /// `ClientError::Remote`.
    pub fn into_result<T: serde::de::DeserializeOwned>(self) -> Result<T> {
        if let Some(err) = self.error {
            return Err(RemoteError {
                code: err.code,
                message: err.message,
            }
            .into());
        }

        serde_json::from_value(self.result.unwrap_or(Value::Null))
            .map_err(|e| ClientError::InvalidResponse(format!("unexpected result: {}", e)))
    }
}

#[derive(Debug, Serialize)]
pub struct VolCreateParams<'a> {
    pub pool: &'a str,
    pub name: &'a str,
    pub size: u64,
}

#[derive(Debug, Serialize)]
pub struct VolDestroyParams<'a> {
    pub pool: &'a str,
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct VolResizeParams<'a> {
    pub pool: &'a str,
    pub name: &'a str,
    pub size: u64,
}

#[derive(Debug, Serialize)]
pub struct ExportCreateParams<'a> {
    pub pool: &'a str,
    pub vol: &'a str,
    pub initiator_wwn: &'a str,
    pub lun: i32,
}

#[derive(Debug, Serialize)]
pub struct ExportDestroyParams<'a> {
    pub pool: &'a str,
    pub vol: &'a str,
    pub initiator_wwn: &'a str,
}

#[derive(Debug, Serialize)]
pub struct NoParams {}
