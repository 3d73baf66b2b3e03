use std::path::PathBuf;
use thiserror::Error;

/// Failure taxonomy for the crypto/container/extraction pipeline (C1-C4).
///
/// `TransformError` and `RestoreWarning` never reach this type: they are
/// swallowed at the point of failure and surfaced as warning strings
/// instead (see [`crate::restore`] and [`crate::transform`]).
#[derive(Debug, Error)]
pub enum WxapkgError {
    #[error("cannot derive a key from identifier {0:?}: identifier too short")]
    BadIdentifier(String),

    #[error("archive too short: need at least {needed} bytes, got {got}")]
    ArchiveTooShort { needed: usize, got: usize },

    #[error("invalid container header: first_mark={first_mark:#x} last_mark={last_mark:#x}")]
    BadMarks { first_mark: u8, last_mark: u8 },

    #[error("entry name length {0} exceeds the 10 MiB limit")]
    NameTooLong(u32),

    #[error("entry {name:?} offset+size ({end}) exceeds plaintext length ({len})")]
    EntryOutOfBounds {
        name: String,
        end: u64,
        len: usize,
    },

    #[error("truncated container: {0}")]
    Truncated(&'static str),

    #[error("entry name is not valid UTF-8")]
    InvalidEntryName,

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no .wxapkg files found under {0}")]
    NoArchives(PathBuf),

    #[error("could not infer a wxid from path {0}")]
    UnresolvedIdentifier(PathBuf),
}

impl WxapkgError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WxapkgError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, WxapkgError>;
