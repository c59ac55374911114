use std::{io, path::PathBuf};
use thiserror::Error;

/// Failures of the install pipeline. Glue code wraps these in `anyhow`.
#[derive(Debug, Error)]
pub enum ModError {
    #[error("registry unreachable at {url}")]
    RegistryUnavailable {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("registry returned HTTP {status} for {url}")]
    RegistryBadStatus { url: String, status: u16 },

    #[error("could not decode registry response from {url}")]
    RegistryMalformedResponse {
        url: String,
        #[source]
        source: io::Error,
    },

    #[error("download of {url} still rate limited after {attempts} attempts")]
    DownloadExhausted { url: String, attempts: u32 },

    #[error("archive entry {entry:?} escapes the extraction directory")]
    PathTraversal { entry: String },

    #[error("failed to extract {}", archive.display())]
    ExtractionFailed {
        archive: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot merge into {}: destination is not a directory", path.display())]
    MergeConflict { path: PathBuf },

    #[error("manifest not found at {}", path.display())]
    ManifestNotFound { path: PathBuf },

    #[error("malformed manifest at {}", path.display())]
    ManifestMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid dependency format: {dependency:?}")]
    InvalidDependencyFormat { dependency: String },

    #[error("{parent}: failed to install dependency {dependency}")]
    DependencyInstallFailed {
        parent: String,
        dependency: String,
        #[source]
        source: Box<ModError>,
    },

    #[error("invalid mod name segment: {value:?}")]
    InvalidModName { value: String },

    #[error("invalid profile name: {value:?}")]
    InvalidProfileName { value: String },

    #[error("I/O error at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type ModResult<T> = Result<T, ModError>;

impl ModError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ModError::Io {
            path: path.into(),
            source,
        }
    }

    /// Innermost error of a dependency chain.
    pub fn root_cause(&self) -> &ModError {
        match self {
            ModError::DependencyInstallFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
