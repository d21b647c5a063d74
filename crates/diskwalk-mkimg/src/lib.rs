//! In-memory builders for small EXT2 and FAT16 images.
//!
//! Both builders take the same calls: create directories and files by
//! slash-separated path, then [`ImageBuilder::build`] lays everything out and
//! returns the raw image. Missing parent directories are created on the way.

use std::fs;
use std::path::Path;
use thiserror::Error;

pub mod ext2;
pub mod fat16;
mod tree;

pub use ext2::Ext2Builder;
pub use fat16::Fat16Builder;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{0}: already exists")]
    Exists(String),

    #[error("{0}: a file is in the way")]
    NotADirectory(String),

    #[error("{0}: name cannot be stored on this filesystem")]
    BadName(String),

    #[error("{path}: {size} bytes do not fit in {limit}")]
    TooLarge { path: String, size: usize, limit: usize },

    #[error("unsupported geometry: {0}")]
    BadGeometry(String),

    #[error("image is full: {0}")]
    Full(&'static str),

    #[error("encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BuildError>;

pub trait ImageBuilder {
    fn dir(&mut self, path: &str) -> Result<&mut Self>;
    fn file(&mut self, path: &str, contents: &[u8]) -> Result<&mut Self>;
    fn build(&self) -> Result<Vec<u8>>;
}

/// Copy a host directory tree into `builder`, entries sorted by name.
///
/// Symlinks and other special files are skipped.
pub fn populate_from_host<B: ImageBuilder>(builder: &mut B, root: &Path) -> Result<()> {
    copy_dir(builder, root, "")
}

fn copy_dir<B: ImageBuilder>(builder: &mut B, dir: &Path, prefix: &str) -> Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            log::warn!("skipping non UTF-8 name {:?}", entry.path());
            continue;
        };
        let path = format!("{prefix}/{name}");
        let kind = entry.file_type()?;
        if kind.is_dir() {
            builder.dir(&path)?;
            copy_dir(builder, &entry.path(), &path)?;
        } else if kind.is_file() {
            builder.file(&path, &fs::read(entry.path())?)?;
        } else {
            log::debug!("skipping special file {}", entry.path().display());
        }
    }
    Ok(())
}
