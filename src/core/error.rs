use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while validating arguments, loading the bootstrap
/// configuration or loading the filter definitions.
///
/// Every variant aborts the operation that produced it; nothing in this
/// crate hands back a partially loaded registry or a partial filter list.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// An argument failed validation before any state was touched.
    #[error("{0}")]
    InvalidArgument(String),

    /// The bootstrap properties file was located but could not be read.
    #[error("failed to load configuration properties from {}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to resolve the current working directory")]
    WorkingDirectory(#[source] io::Error),

    #[error("failed to read filter definitions from {}", path.display())]
    FilterRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid filter definitions in {}", path.display())]
    FilterSyntax {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid filter type `{0}`")]
    UnknownFilterType(String),

    #[error("filter #{index} ({kind}) is missing required field `{field}`")]
    MissingField {
        index: usize,
        kind: String,
        field: &'static str,
    },

    #[error("invalid pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl ConfigurationError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        ConfigurationError::InvalidArgument(message.into())
    }
}

/// Result type for registry, loader and filter operations.
pub type Result<T> = std::result::Result<T, ConfigurationError>;

/// A failure scoped to a single classpath root.
///
/// Scans record these per root and keep going with the remaining roots.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to read classpath root {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open archive {}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

impl ScanError {
    /// The classpath root the failure belongs to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            ScanError::Io { path, .. } | ScanError::Archive { path, .. } => path,
        }
    }
}

/// Validates a key-like argument and returns it trimmed.
pub(crate) fn require_non_empty<'a>(value: &'a str, name: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigurationError::invalid_argument(format!("{name} is empty")));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_non_empty_trims() {
        assert_eq!(require_non_empty("  key ", "key").unwrap(), "key");
    }

    #[test]
    fn test_require_non_empty_rejects_blank() {
        let err = require_non_empty("   ", "key").unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidArgument(_)));
        assert_eq!(err.to_string(), "key is empty");
    }
}
