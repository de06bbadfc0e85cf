use std::fmt::{self, Display};

use thiserror::Error;

/// Error codes returned by targetd.
///
/// targetd reports failures as JSON-RPC errors carrying a negative numeric
/// code. The codes that matter to callers are given names here; anything
/// else is preserved in `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Invalid,
    NameConflict,
    ExistsInitiator,
    VolumeNotFound,
    InvalidPool,
    VolumeExportNotFound,
    VolumeGroupNotFound,
    NoSupport,
    AccessGroupNotFound,
    VolumeMasked,
    NoFreeHostLun,
    /// JSON-RPC "method not found"
    MethodNotFound,
    /// JSON-RPC "invalid params". targetd also uses it when a resize would
    /// not grow the volume.
    InvalidParameter,
    Other(i64),
}

impl ErrorCode {
    pub const fn from_code(code: i64) -> Self {
        match code {
            -1 => ErrorCode::Invalid,
            -50 => ErrorCode::NameConflict,
            -52 => ErrorCode::ExistsInitiator,
            -103 => ErrorCode::VolumeNotFound,
            -110 => ErrorCode::InvalidPool,
            -151 => ErrorCode::VolumeExportNotFound,
            -152 => ErrorCode::VolumeGroupNotFound,
            -153 => ErrorCode::NoSupport,
            -200 => ErrorCode::AccessGroupNotFound,
            -303 => ErrorCode::VolumeMasked,
            -1000 => ErrorCode::NoFreeHostLun,
            -32601 => ErrorCode::MethodNotFound,
            -32602 => ErrorCode::InvalidParameter,
            other => ErrorCode::Other(other),
        }
    }

    pub const fn code(self) -> i64 {
        match self {
            ErrorCode::Invalid => -1,
            ErrorCode::NameConflict => -50,
            ErrorCode::ExistsInitiator => -52,
            ErrorCode::VolumeNotFound => -103,
            ErrorCode::InvalidPool => -110,
            ErrorCode::VolumeExportNotFound => -151,
            ErrorCode::VolumeGroupNotFound => -152,
            ErrorCode::NoSupport => -153,
            ErrorCode::AccessGroupNotFound => -200,
            ErrorCode::VolumeMasked => -303,
            ErrorCode::NoFreeHostLun => -1000,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParameter => -32602,
            ErrorCode::Other(code) => code,
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Invalid => write!(f, "invalid"),
            ErrorCode::NameConflict => write!(f, "name_conflict"),
            ErrorCode::ExistsInitiator => write!(f, "exists_initiator"),
            ErrorCode::VolumeNotFound => write!(f, "volume_not_found"),
            ErrorCode::InvalidPool => write!(f, "invalid_pool"),
            ErrorCode::VolumeExportNotFound => write!(f, "volume_export_not_found"),
            ErrorCode::VolumeGroupNotFound => write!(f, "volume_group_not_found"),
            ErrorCode::NoSupport => write!(f, "no_support"),
            ErrorCode::AccessGroupNotFound => write!(f, "access_group_not_found"),
            ErrorCode::VolumeMasked => write!(f, "volume_masked"),
            ErrorCode::NoFreeHostLun => write!(f, "no_free_host_lun"),
            ErrorCode::MethodNotFound => write!(f, "method_not_found"),
            ErrorCode::InvalidParameter => write!(f, "invalid_parameter"),
            ErrorCode::Other(code) => write!(f, "{}", code),
        }
    }
}

/// A structured error reported by targetd.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("targetd error {code}: {message}")]
pub struct RemoteError {
    pub code: i64,
    pub message: String,
}

impl RemoteError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorCode {
        ErrorCode::from_code(self.code)
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid response from targetd: {0}")]
    InvalidResponse(String),

    #[error("invalid targetd URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Unwrap the targetd error, if this failure was reported by targetd
    /// rather than by the transport.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            ClientError::Remote(e) => Some(e),
            _ => None,
        }
    }

    /// The named targetd code, if any.
    pub fn kind(&self) -> Option<ErrorCode> {
        self.remote().map(RemoteError::kind)
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(ErrorCode::from_code(-50), ErrorCode::NameConflict);
        assert_eq!(ErrorCode::from_code(-103), ErrorCode::VolumeNotFound);
        assert_eq!(ErrorCode::from_code(-151), ErrorCode::VolumeExportNotFound);
        assert_eq!(ErrorCode::from_code(-32602), ErrorCode::InvalidParameter);
        assert_eq!(ErrorCode::from_code(-9999), ErrorCode::Other(-9999));
    }

    #[test]
    fn test_error_code_is_stable() {
        for code in [-1, -50, -52, -103, -110, -151, -152, -153, -200, -303, -1000, -32601, -32602, 7] {
            assert_eq!(ErrorCode::from_code(code).code(), code);
        }
    }

    #[test]
    fn test_remote_error_display() {
        let err = RemoteError::new(ErrorCode::VolumeNotFound, "volume pvc-1 not found");
        assert_eq!(err.to_string(), "targetd error -103: volume pvc-1 not found");
        assert_eq!(err.kind(), ErrorCode::VolumeNotFound);
    }

    #[test]
    fn test_client_error_unwrap() {
        let err: ClientError = RemoteError::new(ErrorCode::NameConflict, "exists").into();
        assert_eq!(err.kind(), Some(ErrorCode::NameConflict));
        assert_eq!(err.to_string(), "targetd error -50: exists");

        let err = ClientError::InvalidResponse("empty body".to_string());
        assert!(err.remote().is_none());
        assert_eq!(err.kind(), None);
    }
}
