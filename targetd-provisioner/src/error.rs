use targetd_client::ClientError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("invalid AccessModes {requested}: only {supported} are supported")]
    UnsupportedAccessModes { requested: String, supported: String },

    #[error("volume name is required")]
    EmptyVolumeName,

    #[error("StorageClass parameter {0} is required")]
    MissingParameter(&'static str),

    #[error("StorageClass parameter {0} must not be empty")]
    EmptyParameter(&'static str),

    #[error("annotation `{0}` is missing on volume")]
    MissingAnnotation(&'static str),

    /// A targetd call failed in a way that is not an idempotent outcome.
    #[error("{action}: {detail}")]
    Remote {
        action: &'static str,
        detail: String,
        #[source]
        source: ClientError,
    },
}

impl ProvisionError {
    /// True for failures detected before any call to targetd.
    pub fn is_validation(&self) -> bool {
        !matches!(self, ProvisionError::Remote { .. })
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ProvisionError::UnsupportedAccessModes { .. } => "unsupported_access_modes",
            ProvisionError::EmptyVolumeName => "empty_volume_name",
            ProvisionError::MissingParameter(_) => "missing_parameter",
            ProvisionError::EmptyParameter(_) => "empty_parameter",
            ProvisionError::MissingAnnotation(_) => "missing_annotation",
            ProvisionError::Remote { .. } => "remote",
        }
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
