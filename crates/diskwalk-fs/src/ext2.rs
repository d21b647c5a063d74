//! EXT2 records: superblock, block-group descriptor, inode, directory entry.

use serde::{Deserialize, Serialize};

pub const SUPERBLOCK_OFFSET: u64 = 1024;
pub const SUPERBLOCK_SIZE: usize = 1024;
pub const MAGIC_OFFSET: u64 = SUPERBLOCK_OFFSET + 56;
pub const MAGIC: u16 = 0xEF53;
pub const ROOT_INODE: u32 = 2;
pub const GOOD_OLD_INODE_SIZE: u16 = 128;
pub const GOOD_OLD_FIRST_INO: u32 = 11;
pub const GROUP_DESC_SIZE: usize = 32;
pub const DIR_ENTRY_HEADER_SIZE: usize = 8;
pub const N_BLOCK_POINTERS: usize = 15;
/// Pointers past this index are indirect and never read as data.
pub const N_DIRECT_BLOCKS: usize = 12;
/// Largest `log_block_size` accepted (64 KiB blocks).
pub const MAX_LOG_BLOCK_SIZE: u32 = 6;

pub const S_IFMT: u16 = 0xF000;
pub const S_IFDIR: u16 = 0x4000;
pub const S_IFREG: u16 = 0x8000;

pub const FT_REG_FILE: u8 = 1;
pub const FT_DIR: u8 = 2;

/// Leading part of the superblock, up to and including the volume name.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Superblock {
    pub inodes_count: u32,
    pub blocks_count: u32,
    pub r_blocks_count: u32,
    pub free_blocks_count: u32,
    pub free_inodes_count: u32,
    pub first_data_block: u32,
    pub log_block_size: u32,
    pub log_frag_size: u32,
    pub blocks_per_group: u32,
    pub frags_per_group: u32,
    pub inodes_per_group: u32,
    pub mtime: u32,
    pub wtime: u32,
    pub mnt_count: u16,
    pub max_mnt_count: u16,
    pub magic: u16,
    pub state: u16,
    pub errors: u16,
    pub minor_rev_level: u16,
    pub lastcheck: u32,
    pub checkinterval: u32,
    pub creator_os: u32,
    pub rev_level: u32,
    pub def_resuid: u16,
    pub def_resgid: u16,
    // EXT2_DYNAMIC_REV fields
    pub first_ino: u32,
    pub inode_size: u16,
    pub block_group_nr: u16,
    pub feature_compat: u32,
    pub feature_incompat: u32,
    pub feature_ro_compat: u32,
    pub uuid: [u8; 16],
    pub volume_name: [u8; 16],
}

impl Superblock {
    /// `1024 << log_block_size`, or `None` when the shift is out of range.
    pub fn block_size(&self) -> Option<u32> {
        (self.log_block_size <= MAX_LOG_BLOCK_SIZE).then(|| 1024u32 << self.log_block_size)
    }

    /// Revision 0 filesystems leave `inode_size` zero and use 128-byte inodes.
    pub fn inode_size(&self) -> u16 {
        if self.rev_level == 0 || self.inode_size == 0 {
            GOOD_OLD_INODE_SIZE
        } else {
            self.inode_size
        }
    }

    /// First inode available to ordinary files.
    pub fn first_inode(&self) -> u32 {
        if self.rev_level == 0 {
            GOOD_OLD_FIRST_INO
        } else {
            self.first_ino
        }
    }

    pub fn group_count(&self) -> u32 {
        if self.blocks_per_group == 0 {
            return 0;
        }
        let data_blocks = self.blocks_count.saturating_sub(self.first_data_block);
        data_blocks.div_ceil(self.blocks_per_group)
    }

    pub fn volume_name(&self) -> &[u8] {
        let end = self
            .volume_name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(self.volume_name.len());
        &self.volume_name[..end]
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupDescriptor {
    pub block_bitmap: u32,
    pub inode_bitmap: u32,
    pub inode_table: u32,
    pub free_blocks_count: u16,
    pub free_inodes_count: u16,
    pub used_dirs_count: u16,
    pub pad: u16,
    pub reserved: [u32; 3],
}

/// The fixed 128-byte inode prefix shared by every revision.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Inode {
    pub mode: u16,
    pub uid: u16,
    pub size: u32,
    pub atime: u32,
    pub ctime: u32,
    pub mtime: u32,
    pub dtime: u32,
    pub gid: u16,
    pub links_count: u16,
    pub blocks: u32,
    pub flags: u32,
    pub osd1: u32,
    pub block: [u32; N_BLOCK_POINTERS],
    pub generation: u32,
    pub file_acl: u32,
    pub dir_acl: u32,
    pub faddr: u32,
    pub osd2: [u32; 3],
}

impl Inode {
    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    /// Number of blocks `size` spans: `ceil(size / block_size)`.
    pub fn block_span(&self, block_size: u32) -> u32 {
        self.size.div_ceil(block_size)
    }

    /// Direct data pointers covering `size`, stopping at the first zero.
    pub fn direct_blocks(&self, block_size: u32) -> impl Iterator<Item = u32> + '_ {
        let span = (self.block_span(block_size) as usize).min(N_DIRECT_BLOCKS);
        self.block[..span].iter().copied().take_while(|&b| b != 0)
    }
}

/// Fixed header of a variable-length directory record; the name follows.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirEntryHeader {
    pub inode: u32,
    pub rec_len: u16,
    pub name_len: u8,
    pub file_type: u8,
}

/// Smallest record able to hold a name of `name_len` bytes, 4-byte aligned.
pub fn dir_rec_len(name_len: usize) -> usize {
    (DIR_ENTRY_HEADER_SIZE + name_len + 3) & !3
}
