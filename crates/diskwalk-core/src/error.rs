use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("short read at offset {offset:#x}: wanted {wanted} bytes, got {got}")]
    ShortRead { offset: u64, wanted: usize, got: usize },

    #[error("cannot seek to offset {offset:#x}: {source}")]
    SeekFailure {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}: not found")]
    NotFound(String),

    #[error("unknown file system")]
    UnsupportedFormat,

    #[error("corrupt filesystem: {0}")]
    Corrupt(String),

    #[error("decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("entry belongs to a different filesystem")]
    ForeignEntry,
}

impl FsError {
    /// Name lookups that came up empty are ordinary control flow.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound(_))
    }
}

pub type Result<T> = core::result::Result<T, FsError>;
