//! Error types for scanning and tree operations.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// A single directory could not be listed.
///
/// Read errors are per-directory and never abort a scan: the affected
/// subtree is simply absent from the tree.
#[derive(Debug, Error)]
pub enum ReadError {
    /// Permission denied for a directory.
    #[error("Permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    /// Directory disappeared before it could be read.
    #[error("Path not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Path exists but is not a directory.
    #[error("Not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReadError {
    /// Create a read error with path context, classifying the I/O error kind.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::NotADirectory => Self::NotADirectory { path },
            _ => Self::Io { path, source },
        }
    }

    /// Path of the directory that failed.
    pub fn path(&self) -> &Path {
        match self {
            Self::PermissionDenied { path }
            | Self::NotFound { path }
            | Self::NotADirectory { path }
            | Self::Io { path, .. } => path,
        }
    }
}

/// Errors from mutating the live tree.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    /// No directory or file with this path exists in the tree.
    #[error("Path not found in tree: {}", path.display())]
    NotFound { path: PathBuf },

    /// The root itself cannot be removed.
    #[error("Cannot remove the tree root: {}", path.display())]
    RootRemoval { path: PathBuf },

    /// A sibling with the target name already exists.
    #[error("Already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },

    /// Renames must stay within the same parent directory.
    #[error("Rename must keep the same parent: {} -> {}", from.display(), to.display())]
    CrossDirectoryRename { from: PathBuf, to: PathBuf },
}

/// Errors that prevent a scan from starting.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The pipeline must be started from inside a tokio runtime.
    #[error("No async runtime available to start the scan")]
    NoRuntime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_error_io() {
        let err = ReadError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, ReadError::PermissionDenied { .. }));
        assert_eq!(err.path(), Path::new("/test/path"));
    }

    #[test]
    fn test_read_error_keeps_unknown_source() {
        let err = ReadError::io("/x", std::io::Error::other("boom"));
        assert!(matches!(err, ReadError::Io { .. }));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_tree_error_display() {
        let err = TreeError::RootRemoval {
            path: PathBuf::from("/root"),
        };
        assert!(err.to_string().contains("/root"));
    }
}
