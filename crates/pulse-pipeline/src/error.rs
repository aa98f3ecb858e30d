//! Pipeline error types.

use std::path::PathBuf;

use pulse_crm::CrmError;
use thiserror::Error;

/// Failures reading or writing the submission cache file.
///
/// A missing file is not an error; [`load`](crate::submissions::cache::load)
/// answers `Ok(None)` for it.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The file exists but could not be read.
    #[error("failed to read cache {path}: {source}")]
    Read {
        /// Cache file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not a valid cache document.
    #[error("malformed cache {path}: {source}")]
    Parse {
        /// Cache file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// Writing the cache failed.
    #[error("failed to write cache {path}: {source}")]
    Write {
        /// Cache file (or its directory).
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Run-aborting pipeline failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A remote call on a fatal path failed.
    #[error(transparent)]
    Crm(#[from] CrmError),
    /// The submission cache could not be read or written.
    #[error(transparent)]
    Cache(#[from] CacheError),
    /// An association batch window failed.
    #[error("association lookup for {relationship} failed: {source}")]
    Association {
        /// Configured relationship name.
        relationship: String,
        /// Underlying error.
        #[source]
        source: CrmError,
    },
    /// A detail batch window failed.
    #[error("detail read for {object_type} failed: {source}")]
    Detail {
        /// Object type being read.
        object_type: String,
        /// Underlying error.
        #[source]
        source: CrmError,
    },
}

impl PipelineError {
    /// HTTP status of the underlying remote failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Crm(e) | Self::Association { source: e, .. } | Self::Detail { source: e, .. } => {
                e.status()
            }
            Self::Cache(_) => None,
        }
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn association_error_names_relationship() {
        let err = PipelineError::Association {
            relationship: "deals".into(),
            source: CrmError::Api {
                status: 500,
                body: "boom".into(),
            },
        };
        assert_eq!(
            err.to_string(),
            "association lookup for deals failed: API error (500): boom"
        );
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn cache_error_carries_path() {
        let err = CacheError::Read {
            path: PathBuf::from("/tmp/c.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/tmp/c.json"));
        assert_eq!(PipelineError::from(err).status(), None);
    }
}
