use std::path::PathBuf;

use thiserror::Error;

/// Failures talking to the backing service's HTTP control surface.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to backing service failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backing service returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected response from backing service: {0}")]
    Protocol(String),
}

/// Outcomes of reading the model manifest that are not a usable list.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest not found at {0}")]
    NotFound(PathBuf),
    #[error("manifest at {0} lists no models")]
    Empty(PathBuf),
    #[error("manifest at {path} is unreadable: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ManifestError {
    /// Missing and empty manifests only skip the preload step.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ManifestError::Unreadable { .. })
    }
}

/// Terminal failures of a bootstrap run.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("backing service was not ready after {attempts} attempts")]
    ReadinessTimeout { attempts: u32 },
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("failed to start backing service `{program}`: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("backing service exited before becoming ready ({status})")]
    BackendExited { status: String },
    #[error("interrupted by {0} before handoff")]
    Interrupted(&'static str),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BootstrapError {
    pub fn exit_code(&self) -> u8 {
        match self {
            BootstrapError::ReadinessTimeout { .. } => 2,
            BootstrapError::Manifest(ManifestError::Unreadable { .. }) => 3,
            BootstrapError::Manifest(_) => 1,
            BootstrapError::SpawnFailed { .. } => 4,
            BootstrapError::BackendExited { .. } => 5,
            BootstrapError::Interrupted(_) => 130,
            BootstrapError::Backend(_) | BootstrapError::Io(_) => 1,
        }
    }
}
