//! Classification of targetd failures.
//!
//! Several targetd error codes mean that the state an operation wanted is
//! already in place. Which codes count depends on the operation, and that
//! table lives here and nowhere else.

use targetd_client::{ClientError, ErrorCode, RemoteError};

/// The remote call whose failure is being classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOp {
    VolCreate,
    VolDestroy,
    VolResize,
    FirstAvailableLun,
    ExportCreate,
    ExportDestroy,
    ExportList,
}

impl RemoteOp {
    pub fn as_str(self) -> &'static str {
        match self {
            RemoteOp::VolCreate => "vol_create",
            RemoteOp::VolDestroy => "vol_destroy",
            RemoteOp::VolResize => "vol_resize",
            RemoteOp::FirstAvailableLun => "first_available_lun",
            RemoteOp::ExportCreate => "export_create",
            RemoteOp::ExportDestroy => "export_destroy",
            RemoteOp::ExportList => "export_list",
        }
    }
}

/// What a failed call means for the operation that made it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The desired end state already holds; carry on as if the call succeeded.
    AlreadyDone,
    /// Abort the operation.
    Fatal,
}

/// Classify a failed call.
///
/// - `vol_create` failing with NameConflict: volume names are unique, so the
///   volume is ours from an earlier attempt.
/// - `vol_destroy` failing with VolumeNotFound and `export_destroy` failing
///   with VolumeExportNotFound: already removed.
/// - `vol_resize` failing with InvalidParameter: targetd answers this when
///   the volume is already at or above the requested size.
///
/// Everything else, transport failures included, is fatal.
pub fn classify(op: RemoteOp, err: &ClientError) -> Disposition {
    let Some(code) = err.kind() else {
        return Disposition::Fatal;
    };

    match (op, code) {
        (RemoteOp::VolCreate, ErrorCode::NameConflict)
        | (RemoteOp::VolDestroy, ErrorCode::VolumeNotFound)
        | (RemoteOp::ExportDestroy, ErrorCode::VolumeExportNotFound)
        | (RemoteOp::VolResize, ErrorCode::InvalidParameter) => Disposition::AlreadyDone,
        _ => Disposition::Fatal,
    }
}

/// The targetd error behind a failure, if targetd produced one.
pub fn unwrap_remote(err: &ClientError) -> Option<&RemoteError> {
    err.remote()
}

/// Human-readable description used in every fatal error message.
pub fn describe(err: &ClientError) -> String {
    match unwrap_remote(err) {
        Some(remote) => remote.to_string(),
        None => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(code: ErrorCode) -> ClientError {
        RemoteError::new(code, "boom").into()
    }

    #[test]
    fn test_idempotent_codes() {
        assert_eq!(
            classify(RemoteOp::VolCreate, &remote(ErrorCode::NameConflict)),
            Disposition::AlreadyDone
        );
        assert_eq!(
            classify(RemoteOp::VolDestroy, &remote(ErrorCode::VolumeNotFound)),
            Disposition::AlreadyDone
        );
        assert_eq!(
            classify(RemoteOp::ExportDestroy, &remote(ErrorCode::VolumeExportNotFound)),
            Disposition::AlreadyDone
        );
        assert_eq!(
            classify(RemoteOp::VolResize, &remote(ErrorCode::InvalidParameter)),
            Disposition::AlreadyDone
        );
    }

    #[test]
    fn test_codes_only_count_for_their_operation() {
        assert_eq!(
            classify(RemoteOp::VolDestroy, &remote(ErrorCode::NameConflict)),
            Disposition::Fatal
        );
        assert_eq!(
            classify(RemoteOp::VolResize, &remote(ErrorCode::VolumeNotFound)),
            Disposition::Fatal
        );
        assert_eq!(
            classify(RemoteOp::ExportDestroy, &remote(ErrorCode::VolumeNotFound)),
            Disposition::Fatal
        );
        assert_eq!(
            classify(RemoteOp::VolCreate, &remote(ErrorCode::InvalidParameter)),
            Disposition::Fatal
        );
        assert_eq!(
            classify(RemoteOp::ExportCreate, &remote(ErrorCode::ExistsInitiator)),
            Disposition::Fatal
        );
    }

    #[test]
    fn test_non_remote_failures_are_fatal() {
        let err = ClientError::InvalidResponse("truncated body".to_string());
        assert_eq!(classify(RemoteOp::VolDestroy, &err), Disposition::Fatal);
        assert!(unwrap_remote(&err).is_none());
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(&remote(ErrorCode::InvalidPool)), "targetd error -110: boom");
        assert_eq!(
            describe(&ClientError::InvalidResponse("truncated body".to_string())),
            "invalid response from targetd: truncated body"
        );
    }
}
