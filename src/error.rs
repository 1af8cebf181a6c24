use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while configuring, scanning, reporting or recycling.
///
/// Only `Config`, `ReportWrite` and `Pool` are fatal to a run. `Traversal`
/// and `Read` are confined to the file that produced them: the scanner logs
/// them and keeps going.
#[derive(Debug, Error)]
pub enum DedupeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("cannot read config file '{path}': {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot traverse '{path}': {message}")]
    Traversal { path: PathBuf, message: String },

    #[error("cannot read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write report '{path}': {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot recycle '{path}': {message}")]
    Recycle { path: PathBuf, message: String },

    #[error("console I/O failed: {0}")]
    Console(#[from] io::Error),

    #[error("cannot start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl DedupeError {
    pub fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// True for errors that must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::ConfigRead { .. } | Self::ReportWrite { .. } | Self::Pool(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DedupeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality_follows_taxonomy() {
        assert!(DedupeError::Config("bad".into()).is_fatal());
        assert!(
            DedupeError::ReportWrite {
                path: "duplicates.log".into(),
                source: io::Error::other("disk full"),
            }
            .is_fatal()
        );
        assert!(!DedupeError::read("a.txt", io::Error::other("gone")).is_fatal());
        assert!(
            !DedupeError::Traversal {
                path: "/root/secret".into(),
                message: "permission denied".into(),
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_read_error_names_path() {
        let err = DedupeError::read("/data/a.bin", io::Error::other("short read"));
        assert_eq!(err.to_string(), "cannot read '/data/a.bin': short read");
    }
}
