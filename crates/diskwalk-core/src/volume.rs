//! The capability interface both formats share, and the closed set of
//! volumes a detector can hand back.

use crate::detect::{detect, Detection, FsKind};
use crate::error::{FsError, Result};
use crate::ext2::Ext2Volume;
use crate::extract::{extract_ext2, extract_fat16};
use crate::fat16::Fat16Volume;
use crate::source::{ByteSource, DiskImage};
use crate::walk::{Ext2Walk, Fat16Walk, NodeRef, TreeEvent, WalkOptions};
use log::debug;
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub type Events<'a> = Box<dyn Iterator<Item = Result<TreeEvent>> + 'a>;

pub trait Filesystem {
    fn kind(&self) -> FsKind;

    /// Lazy pre-order walk of the whole tree. Every call starts over from
    /// the root.
    fn walk(&mut self, options: WalkOptions) -> Events<'_>;

    /// Write the contents of a file entry to `out`, returning the byte count.
    fn extract(&mut self, node: &NodeRef, out: &mut dyn Write) -> Result<u64>;

    /// Immediate children of the root directory.
    fn list_root(&mut self, options: WalkOptions) -> Result<Vec<TreeEvent>> {
        let options = WalkOptions {
            max_depth: Some(0),
            ..options
        };
        self.walk(options).collect()
    }

    /// First file, in walk order, whose name matches `target`.
    fn find_file(&mut self, target: &str) -> Result<TreeEvent> {
        let kind = self.kind();
        for event in self.walk(WalkOptions::all()) {
            let event = event?;
            if !event.is_dir && kind.name_matches(&event.raw_name, target) {
                debug!("{target} found at depth {}", event.depth);
                return Ok(event);
            }
        }
        Err(FsError::NotFound(target.to_owned()))
    }

    /// Find `target` and stream its contents to `out`.
    fn cat(&mut self, target: &str, out: &mut dyn Write) -> Result<u64> {
        let event = self.find_file(target)?;
        self.extract(&event.node, out)
    }
}

impl FsKind {
    /// EXT2 names compare byte for byte. FAT16 short names compare against
    /// the trimmed `NAME.EXT` form, ignoring ASCII case.
    pub fn name_matches(self, raw_name: &[u8], target: &str) -> bool {
        match self {
            FsKind::Ext2 => raw_name == target.as_bytes(),
            FsKind::Fat16 => raw_name.eq_ignore_ascii_case(target.as_bytes()),
        }
    }
}

impl<S: ByteSource> Filesystem for Ext2Volume<S> {
    fn kind(&self) -> FsKind {
        FsKind::Ext2
    }

    fn walk(&mut self, options: WalkOptions) -> Events<'_> {
        Box::new(Ext2Walk::new(self, options))
    }

    fn extract(&mut self, node: &NodeRef, out: &mut dyn Write) -> Result<u64> {
        let NodeRef::Ext2 { inode } = *node else {
            return Err(FsError::ForeignEntry);
        };
        let inode = self.inode(inode)?;
        let (source, superblock) = self.parts();
        extract_ext2(source, superblock, &inode, out)
    }
}

impl<S: ByteSource> Filesystem for Fat16Volume<S> {
    fn kind(&self) -> FsKind {
        FsKind::Fat16
    }

    fn walk(&mut self, options: WalkOptions) -> Events<'_> {
        Box::new(Fat16Walk::new(self, options))
    }

    fn extract(&mut self, node: &NodeRef, out: &mut dyn Write) -> Result<u64> {
        let NodeRef::Fat16 {
            start_cluster,
            size,
        } = *node
        else {
            return Err(FsError::ForeignEntry);
        };
        let (source, boot) = self.parts();
        extract_fat16(source, boot, start_cluster, size, out)
    }
}

/// A volume of whichever kind the detector found.
pub enum Volume<S> {
    Ext2(Ext2Volume<S>),
    Fat16(Fat16Volume<S>),
}

impl<S: ByteSource> Volume<S> {
    pub fn open(mut source: S, detection: Detection) -> Result<Self> {
        match detect(&mut source, detection)? {
            FsKind::Ext2 => Ok(Volume::Ext2(Ext2Volume::open(source)?)),
            FsKind::Fat16 => Ok(Volume::Fat16(Fat16Volume::open(source)?)),
        }
    }

    fn as_filesystem(&mut self) -> &mut dyn Filesystem {
        match self {
            Volume::Ext2(volume) => volume,
            Volume::Fat16(volume) => volume,
        }
    }
}

impl Volume<DiskImage<File>> {
    pub fn open_path(path: impl AsRef<Path>, detection: Detection) -> Result<Self> {
        Self::open(DiskImage::open(path)?, detection)
    }
}

impl<S: ByteSource> Filesystem for Volume<S> {
    fn kind(&self) -> FsKind {
        match self {
            Volume::Ext2(_) => FsKind::Ext2,
            Volume::Fat16(_) => FsKind::Fat16,
        }
    }

    fn walk(&mut self, options: WalkOptions) -> Events<'_> {
        self.as_filesystem().walk(options)
    }

    fn extract(&mut self, node: &NodeRef, out: &mut dyn Write) -> Result<u64> {
        self.as_filesystem().extract(node, out)
    }
}
