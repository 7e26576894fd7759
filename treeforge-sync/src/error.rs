//! Error types for treeforge-sync.
//!
//! [`HostError`] is the closed taxonomy every reconciler matches on. It is
//! decided once, inside the hosting backend, from whatever the transport
//! reported; nothing upstream inspects status codes.

use std::path::PathBuf;

use thiserror::Error;

use treeforge_core::{DeviceId, ManifestError};
use treeforge_renderer::RenderError;

/// Failure to obtain a bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The configured environment variable is unset or empty.
    #[error("credential variable {0} is not set")]
    MissingToken(String),

    /// The token source failed for another reason.
    #[error("credential source failed: {0}")]
    Source(String),
}

/// Classified outcome of a failed hosting call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The addressed resource (or one of its parents) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A create raced with an existing resource.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A content write was made against a stale or missing version handle.
    #[error("version conflict: {0}")]
    VersionConflict(String),

    /// Network, timeout, throttling, 5xx, or any unclassified response.
    #[error("transport error: {message}")]
    Transport { retryable: bool, message: String },

    /// No usable credential for the request.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
}

impl HostError {
    /// A transient fault that the retry policy may repeat.
    pub fn transient(message: impl Into<String>) -> Self {
        HostError::Transport {
            retryable: true,
            message: message.into(),
        }
    }

    /// A transport-class failure that retrying cannot fix.
    pub fn permanent(message: impl Into<String>) -> Self {
        HostError::Transport {
            retryable: false,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, HostError::Transport { retryable: true, .. })
    }
}

/// Errors raised outside the per-target reconciliation loop: building target
/// sets, resolving devices, rendering seeded files.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An error from the manifest store.
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// An error from the rendering engine.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// Two file entries in one target share a path.
    #[error("duplicate path '{path}' in target '{repository}'")]
    DuplicatePath { repository: String, path: String },

    /// A local file name cannot be expressed as a UTF-8 repository path.
    #[error("path {0} is not valid UTF-8")]
    NonUtf8Path(PathBuf),

    /// The device declares no repositories, so there is nothing to upload.
    #[error("no repositories configured for device '{0}'")]
    NoRepositories(DeviceId),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_retryable_transport_is_retryable() {
        assert!(HostError::transient("502").is_retryable());
        assert!(!HostError::permanent("401").is_retryable());
        assert!(!HostError::NotFound("x".into()).is_retryable());
        assert!(!HostError::VersionConflict("x".into()).is_retryable());
        assert!(!HostError::from(AuthError::MissingToken("T".into())).is_retryable());
    }
}
