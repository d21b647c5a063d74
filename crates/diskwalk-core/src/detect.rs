//! Filesystem kind detection. Pure reads, no state.

use crate::error::{FsError, Result};
use crate::source::ByteSource;
use diskwalk_fs::{ext2, fat16};
use log::debug;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsKind {
    Ext2,
    Fat16,
}

impl fmt::Display for FsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsKind::Ext2 => write!(f, "EXT2"),
            FsKind::Fat16 => write!(f, "FAT16"),
        }
    }
}

/// How a FAT16 volume is recognised. EXT2 is always found by its magic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Detection {
    /// `"FAT16   "` in the extended BPB type field.
    #[default]
    Signature,
    /// Cluster count derived from the BPB within `[4085, 65525)`.
    ClusterCount,
}

pub fn is_ext2<S: ByteSource + ?Sized>(source: &mut S) -> Result<bool> {
    let mut magic = [0u8; 2];
    match source.read_at(ext2::MAGIC_OFFSET, &mut magic) {
        Ok(()) => Ok(u16::from_le_bytes(magic) == ext2::MAGIC),
        Err(FsError::ShortRead { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

pub fn is_fat16<S: ByteSource + ?Sized>(source: &mut S, detection: Detection) -> Result<bool> {
    let mut raw = [0u8; fat16::BOOT_SECTOR_SIZE];
    match source.read_at(0, &mut raw) {
        Ok(()) => {}
        Err(FsError::ShortRead { .. }) => return Ok(false),
        Err(e) => return Err(e),
    }
    let boot: fat16::BootSector = diskwalk_fs::decode(&raw)?;
    Ok(match detection {
        Detection::Signature => boot.has_fat16_signature(),
        Detection::ClusterCount => {
            boot.bytes_per_sector != 0 && boot.sectors_per_cluster != 0 && boot.has_fat16_cluster_count()
        }
    })
}

/// EXT2 is checked first; an image carrying both signatures reads as EXT2.
pub fn detect<S: ByteSource + ?Sized>(source: &mut S, detection: Detection) -> Result<FsKind> {
    if is_ext2(source)? {
        debug!("detected EXT2 magic at {:#x}", ext2::MAGIC_OFFSET);
        return Ok(FsKind::Ext2);
    }
    if is_fat16(source, detection)? {
        debug!("detected FAT16 ({detection:?})");
        return Ok(FsKind::Fat16);
    }
    Err(FsError::UnsupportedFormat)
}
