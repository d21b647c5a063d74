//! EXT2 decoding: superblock, group descriptors, inodes, directory blocks.
//!
//! Block size and inode size are read once from the superblock and used for
//! every offset computed afterwards. Inodes are re-read on each lookup; no
//! caching is done. Only the twelve direct block pointers are followed.

use crate::error::{FsError, Result};
use crate::source::ByteSource;
use diskwalk_fs::ext2::{
    DirEntryHeader, GroupDescriptor, Inode, Superblock, DIR_ENTRY_HEADER_SIZE, GROUP_DESC_SIZE,
    MAGIC, N_DIRECT_BLOCKS, SUPERBLOCK_OFFSET, SUPERBLOCK_SIZE,
};
use log::{debug, info, warn};

pub use diskwalk_fs::ext2::{FT_DIR, FT_REG_FILE, ROOT_INODE};

/// One live record from a directory block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub inode: u32,
    pub rec_len: u16,
    pub file_type: u8,
    pub name: Vec<u8>,
}

impl DirEntry {
    pub fn is_dir(&self) -> bool {
        self.file_type == FT_DIR
    }

    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

pub fn read_superblock<S: ByteSource + ?Sized>(source: &mut S) -> Result<Superblock> {
    let raw = source.read_vec(SUPERBLOCK_OFFSET, SUPERBLOCK_SIZE)?;
    let superblock: Superblock = diskwalk_fs::decode(&raw)?;
    if superblock.magic != MAGIC {
        return Err(FsError::UnsupportedFormat);
    }
    Ok(superblock)
}

/// Byte size of one block, validated.
pub fn block_size(superblock: &Superblock) -> Result<u32> {
    superblock.block_size().ok_or_else(|| {
        FsError::Corrupt(format!(
            "log_block_size {} out of range",
            superblock.log_block_size
        ))
    })
}

/// The descriptor table starts in the block right after the superblock's.
pub fn read_group_descriptor<S: ByteSource + ?Sized>(
    source: &mut S,
    superblock: &Superblock,
    group: u32,
) -> Result<GroupDescriptor> {
    let block_size = u64::from(block_size(superblock)?);
    let table_block = u64::from(superblock.first_data_block) + 1;
    let offset = table_block * block_size + u64::from(group) * GROUP_DESC_SIZE as u64;
    debug!("group {group} descriptor at {offset:#x}");

    let raw = source.read_vec(offset, GROUP_DESC_SIZE)?;
    Ok(diskwalk_fs::decode(&raw)?)
}

pub fn read_inode<S: ByteSource + ?Sized>(
    source: &mut S,
    superblock: &Superblock,
    inode_num: u32,
) -> Result<Inode> {
    if inode_num == 0 {
        return Err(FsError::Corrupt("inode 0 does not exist".into()));
    }
    if superblock.inodes_per_group == 0 {
        return Err(FsError::Corrupt("inodes_per_group is zero".into()));
    }

    let group = (inode_num - 1) / superblock.inodes_per_group;
    let index = (inode_num - 1) % superblock.inodes_per_group;
    let descriptor = read_group_descriptor(source, superblock, group)?;

    let block_size = u64::from(block_size(superblock)?);
    let inode_size = usize::from(superblock.inode_size());
    let offset =
        u64::from(descriptor.inode_table) * block_size + u64::from(index) * inode_size as u64;
    debug!("inode {inode_num}: group {group}, index {index}, offset {offset:#x}");

    let raw = source.read_vec(offset, inode_size)?;
    Ok(diskwalk_fs::decode(&raw)?)
}

/// Scan one directory block, following `rec_len` from record to record.
///
/// Records with inode 0 are unused space and are skipped. A record whose
/// `rec_len` is too small to advance, or would run past the block, ends the
/// scan of this block.
pub fn parse_directory_block(block: &[u8]) -> Vec<DirEntry> {
    let mut entries = Vec::new();
    let mut offset = 0;

    while offset + DIR_ENTRY_HEADER_SIZE <= block.len() {
        let header: DirEntryHeader = match diskwalk_fs::decode(&block[offset..]) {
            Ok(header) => header,
            Err(_) => break,
        };
        let rec_len = usize::from(header.rec_len);
        if rec_len < DIR_ENTRY_HEADER_SIZE || offset + rec_len > block.len() {
            warn!(
                "directory record at {offset} has rec_len {rec_len}, abandoning rest of block"
            );
            break;
        }

        if header.inode != 0 {
            let name_start = offset + DIR_ENTRY_HEADER_SIZE;
            let name_len = usize::from(header.name_len).min(rec_len - DIR_ENTRY_HEADER_SIZE);
            entries.push(DirEntry {
                inode: header.inode,
                rec_len: header.rec_len,
                file_type: header.file_type,
                name: block[name_start..name_start + name_len].to_vec(),
            });
        }
        offset += rec_len;
    }
    entries
}

/// Data block numbers of a directory or file, in logical order.
///
/// Covers at most the twelve direct pointers; anything beyond that is
/// reachable only through indirect blocks, which are not resolved.
pub fn direct_blocks(inode: &Inode, block_size: u32) -> Vec<u32> {
    let span = inode.block_span(block_size) as usize;
    if span > N_DIRECT_BLOCKS {
        warn!(
            "{} bytes need {span} blocks; only the first {N_DIRECT_BLOCKS} direct blocks are read",
            inode.size
        );
    }
    inode.direct_blocks(block_size).collect()
}

pub fn read_block<S: ByteSource + ?Sized>(
    source: &mut S,
    superblock: &Superblock,
    block: u32,
) -> Result<Vec<u8>> {
    let block_size = block_size(superblock)?;
    source.read_vec(u64::from(block) * u64::from(block_size), block_size as usize)
}

/// An opened EXT2 image.
pub struct Ext2Volume<S> {
    source: S,
    superblock: Superblock,
    block_size: u32,
}

impl<S: ByteSource> Ext2Volume<S> {
    pub fn open(mut source: S) -> Result<Self> {
        let superblock = read_superblock(&mut source)?;
        let block_size = block_size(&superblock)?;
        if superblock.inodes_per_group == 0 {
            return Err(FsError::Corrupt("inodes_per_group is zero".into()));
        }
        info!(
            "EXT2 volume: {} blocks of {} bytes, {} inodes ({} bytes each)",
            superblock.blocks_count,
            block_size,
            superblock.inodes_count,
            superblock.inode_size()
        );
        Ok(Self {
            source,
            superblock,
            block_size,
        })
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn group_descriptor(&mut self, group: u32) -> Result<GroupDescriptor> {
        read_group_descriptor(&mut self.source, &self.superblock, group)
    }

    pub fn inode(&mut self, inode_num: u32) -> Result<Inode> {
        read_inode(&mut self.source, &self.superblock, inode_num)
    }

    pub fn block(&mut self, block: u32) -> Result<Vec<u8>> {
        read_block(&mut self.source, &self.superblock, block)
    }

    pub fn directory_block(&mut self, block: u32) -> Result<Vec<DirEntry>> {
        Ok(parse_directory_block(&self.block(block)?))
    }

    pub(crate) fn parts(&mut self) -> (&mut S, &Superblock) {
        (&mut self.source, &self.superblock)
    }
}
