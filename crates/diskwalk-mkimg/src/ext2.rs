//! Single-group EXT2 images.
//!
//! Layout, counted from the superblock's block (`first_data_block`: 1 for
//! 1 KiB blocks, 0 otherwise):
//!   +0: superblock (always at byte 1024)
//!   +1: group descriptor table
//!   +2: block bitmap
//!   +3: inode bitmap
//!   +4..: inode table, then data
//!
//! The root directory is inode 2 and `lost+found` inode 11. Everything else
//! is numbered from 12 in the order it was added.

use crate::tree::{Kind, Tree, ROOT};
use crate::{BuildError, ImageBuilder, Result};
use diskwalk_fs::encode;
use diskwalk_fs::ext2::{
    dir_rec_len, DirEntryHeader, GroupDescriptor, Inode, Superblock, DIR_ENTRY_HEADER_SIZE,
    FT_DIR, FT_REG_FILE, MAGIC, N_DIRECT_BLOCKS, ROOT_INODE, SUPERBLOCK_OFFSET, S_IFDIR, S_IFREG,
};
use log::debug;

/// Default block size.
pub const BLOCK_SIZE: usize = 1024;
pub const LOST_AND_FOUND_INODE: u32 = 11;
pub const FIRST_INODE: u32 = 12;

/// Block numbers of the metadata in front of the data area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub block_size: usize,
    pub first_data_block: u32,
    pub group_descriptors: u32,
    pub block_bitmap: u32,
    pub inode_bitmap: u32,
    pub inode_table: u32,
}

impl Layout {
    fn new(block_size: usize) -> Self {
        let first_data_block = u32::from(block_size == 1024);
        Self {
            block_size,
            first_data_block,
            group_descriptors: first_data_block + 1,
            block_bitmap: first_data_block + 2,
            inode_bitmap: first_data_block + 3,
            inode_table: first_data_block + 4,
        }
    }

    /// Blocks (or inodes) one single-block bitmap can describe.
    fn bitmap_capacity(&self) -> u32 {
        self.block_size as u32 * 8
    }
}

pub struct Ext2Builder {
    tree: Tree,
    block_size: usize,
    blocks: u32,
    inodes: u32,
    inode_size: u16,
    rev_level: u32,
    timestamp: u32,
    volume_name: [u8; 16],
}

impl Default for Ext2Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Ext2Builder {
    pub fn new() -> Self {
        let mut tree = Tree::new();
        let lost_found = tree.push_dir(ROOT, "lost+found");
        debug_assert_eq!(lost_found, 1);
        Self {
            tree,
            block_size: BLOCK_SIZE,
            blocks: 2048,
            inodes: 128,
            inode_size: 128,
            rev_level: 1,
            timestamp: 0,
            volume_name: [0; 16],
        }
    }

    /// 1024, 2048 or 4096; anything else is refused at build time.
    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    /// Total block count. A single group holds at most `8 * block_size`.
    pub fn blocks(mut self, blocks: u32) -> Self {
        self.blocks = blocks;
        self
    }

    pub fn inodes(mut self, inodes: u32) -> Self {
        self.inodes = inodes;
        self
    }

    /// On-disk inode record size for revision 1 images.
    pub fn inode_size(mut self, size: u16) -> Self {
        self.inode_size = size;
        self
    }

    /// Write a revision 0 superblock, which always implies 128-byte inodes.
    pub fn revision_zero(mut self) -> Self {
        self.rev_level = 0;
        self.inode_size = 128;
        self
    }

    pub fn timestamp(mut self, secs: u32) -> Self {
        self.timestamp = secs;
        self
    }

    pub fn volume_name(mut self, name: &str) -> Self {
        self.volume_name = [0; 16];
        for (dst, src) in self.volume_name.iter_mut().zip(name.bytes()) {
            *dst = src;
        }
        self
    }

    pub fn layout(&self) -> Layout {
        Layout::new(self.block_size)
    }

    /// Add a second entry `path` for the existing directory `target`.
    pub fn alias(&mut self, path: &str, target: &str) -> Result<&mut Self> {
        let target = self.tree.find_dir(target)?;
        self.tree.insert(path, Kind::Alias(target))?;
        Ok(self)
    }

    /// A record with inode 0: space a deleted entry left behind.
    pub fn unused_record(&mut self, dir: &str, name: &str) -> Result<&mut Self> {
        let dir = self.tree.find_dir(dir)?;
        let record = encode_record(0, name.as_bytes(), 0)?;
        self.tree.push_raw(dir, record);
        Ok(self)
    }

    fn check_geometry(&self, layout: &Layout) -> Result<()> {
        if !matches!(self.block_size, 1024 | 2048 | 4096) {
            return Err(BuildError::BadGeometry(format!(
                "block size {} is not 1024, 2048 or 4096",
                self.block_size
            )));
        }
        if self.blocks > layout.bitmap_capacity() {
            return Err(BuildError::Full("block bitmap"));
        }
        if self.inodes > layout.bitmap_capacity() || self.inodes > u32::from(u16::MAX) {
            return Err(BuildError::Full("inode bitmap"));
        }
        if self.inodes < LOST_AND_FOUND_INODE {
            return Err(BuildError::Full("inodes"));
        }
        Ok(())
    }

    fn inode_numbers(&self) -> Result<Vec<u32>> {
        let mut numbers = vec![0u32; self.tree.nodes.len()];
        let mut next = FIRST_INODE;
        for (index, node) in self.tree.nodes.iter().enumerate() {
            numbers[index] = match (index, &node.kind) {
                (ROOT, _) => ROOT_INODE,
                (1, _) => LOST_AND_FOUND_INODE,
                (_, Kind::Dir(_) | Kind::File(_)) => {
                    next += 1;
                    next - 1
                }
                _ => 0,
            };
        }
        if next - 1 > self.inodes {
            return Err(BuildError::Full("inodes"));
        }
        Ok(numbers)
    }

    /// The records of one directory packed into blocks.
    fn directory_blocks(&self, dir: usize, numbers: &[u32]) -> Result<Vec<Vec<u8>>> {
        let node = &self.tree.nodes[dir];
        let mut records = vec![
            encode_record(numbers[dir], b".", FT_DIR)?,
            encode_record(numbers[node.parent], b"..", FT_DIR)?,
        ];
        for &child in self.tree.children(dir) {
            let child_node = &self.tree.nodes[child];
            let name = child_node.name.as_bytes();
            if name.len() > usize::from(u8::MAX) {
                return Err(BuildError::BadName(child_node.name.clone()));
            }
            records.push(match &child_node.kind {
                Kind::Dir(_) => encode_record(numbers[child], name, FT_DIR)?,
                Kind::File(_) => encode_record(numbers[child], name, FT_REG_FILE)?,
                Kind::Alias(target) => encode_record(numbers[*target], name, FT_DIR)?,
                Kind::Raw(record) => record.clone(),
            });
        }
        Ok(pack_records(records, self.block_size))
    }

    fn inode(&self, mode: u16, size: usize, blocks: &[u32], links: u16) -> Inode {
        let mut inode = Inode {
            mode,
            size: size as u32,
            atime: self.timestamp,
            ctime: self.timestamp,
            mtime: self.timestamp,
            links_count: links,
            blocks: (blocks.len() * self.block_size / 512) as u32,
            ..Default::default()
        };
        inode.block[..blocks.len()].copy_from_slice(blocks);
        inode
    }
}

impl ImageBuilder for Ext2Builder {
    fn dir(&mut self, path: &str) -> Result<&mut Self> {
        self.tree.mkdir_all(path)?;
        Ok(self)
    }

    fn file(&mut self, path: &str, contents: &[u8]) -> Result<&mut Self> {
        let limit = N_DIRECT_BLOCKS * self.block_size;
        if contents.len() > limit {
            return Err(BuildError::TooLarge {
                path: path.to_owned(),
                size: contents.len(),
                limit,
            });
        }
        self.tree.insert(path, Kind::File(contents.to_vec()))?;
        Ok(self)
    }

    fn build(&self) -> Result<Vec<u8>> {
        let layout = self.layout();
        self.check_geometry(&layout)?;
        let block_size = self.block_size;
        let numbers = self.inode_numbers()?;
        let inode_table_blocks =
            (self.inodes as usize * usize::from(self.inode_size)).div_ceil(block_size) as u32;
        let data_start = layout.inode_table + inode_table_blocks;
        let mut next_block = data_start;
        let mut image = vec![0u8; self.blocks as usize * block_size];
        let mut used_dirs = 0u16;

        for (index, node) in self.tree.nodes.iter().enumerate() {
            let (mode, size, chunks, links) = match &node.kind {
                Kind::Dir(children) => {
                    used_dirs += 1;
                    let subdirs = children
                        .iter()
                        .filter(|&&c| matches!(self.tree.nodes[c].kind, Kind::Dir(_)))
                        .count();
                    let blocks = self.directory_blocks(index, &numbers)?;
                    (
                        S_IFDIR | 0o755,
                        blocks.len() * block_size,
                        blocks,
                        2 + subdirs as u16,
                    )
                }
                Kind::File(contents) => (
                    S_IFREG | 0o644,
                    contents.len(),
                    contents.chunks(block_size).map(<[u8]>::to_vec).collect(),
                    1,
                ),
                Kind::Alias(_) | Kind::Raw(_) => continue,
            };

            if chunks.len() > N_DIRECT_BLOCKS {
                return Err(BuildError::TooLarge {
                    path: node.name.clone(),
                    size,
                    limit: N_DIRECT_BLOCKS * block_size,
                });
            }
            let mut pointers = Vec::with_capacity(chunks.len());
            for chunk in &chunks {
                if next_block >= self.blocks {
                    return Err(BuildError::Full("data blocks"));
                }
                let start = next_block as usize * block_size;
                image[start..start + chunk.len()].copy_from_slice(chunk);
                pointers.push(next_block);
                next_block += 1;
            }

            let inode = self.inode(mode, size, &pointers, links);
            let offset = layout.inode_table as usize * block_size
                + (numbers[index] - 1) as usize * usize::from(self.inode_size);
            encode(&inode, &mut image[offset..])?;
            debug!(
                "inode {} ({:?}): {size} bytes in blocks {pointers:?}",
                numbers[index], node.name
            );
        }

        let last_inode = numbers.iter().copied().max().unwrap_or(ROOT_INODE);
        let used_blocks = next_block - layout.first_data_block;
        set_bits(&mut image, &layout, layout.block_bitmap, used_blocks as usize);
        set_bits(&mut image, &layout, layout.inode_bitmap, last_inode as usize);

        let free_blocks = self.blocks - next_block;
        let free_inodes = self.inodes - last_inode;
        let log_block_size = (block_size / 1024).trailing_zeros();
        let superblock = Superblock {
            inodes_count: self.inodes,
            blocks_count: self.blocks,
            free_blocks_count: free_blocks,
            free_inodes_count: free_inodes,
            first_data_block: layout.first_data_block,
            log_block_size,
            log_frag_size: log_block_size,
            blocks_per_group: layout.bitmap_capacity(),
            frags_per_group: layout.bitmap_capacity(),
            inodes_per_group: self.inodes,
            mtime: self.timestamp,
            wtime: self.timestamp,
            max_mnt_count: u16::MAX,
            magic: MAGIC,
            state: 1,
            errors: 1,
            lastcheck: self.timestamp,
            rev_level: self.rev_level,
            first_ino: if self.rev_level == 0 { 0 } else { LOST_AND_FOUND_INODE },
            inode_size: if self.rev_level == 0 { 0 } else { self.inode_size },
            volume_name: self.volume_name,
            ..Default::default()
        };
        encode(&superblock, &mut image[SUPERBLOCK_OFFSET as usize..])?;

        // Both counts are bounded by the bitmap capacity, at most 32768.
        let descriptor = GroupDescriptor {
            block_bitmap: layout.block_bitmap,
            inode_bitmap: layout.inode_bitmap,
            inode_table: layout.inode_table,
            free_blocks_count: free_blocks as u16,
            free_inodes_count: free_inodes as u16,
            used_dirs_count: used_dirs,
            ..Default::default()
        };
        encode(
            &descriptor,
            &mut image[layout.group_descriptors as usize * block_size..],
        )?;
        Ok(image)
    }
}

fn encode_record(inode: u32, name: &[u8], file_type: u8) -> Result<Vec<u8>> {
    let mut record = vec![0u8; dir_rec_len(name.len())];
    let header = DirEntryHeader {
        inode,
        rec_len: record.len() as u16,
        name_len: name.len() as u8,
        file_type,
    };
    encode(&header, &mut record)?;
    record[DIR_ENTRY_HEADER_SIZE..DIR_ENTRY_HEADER_SIZE + name.len()].copy_from_slice(name);
    Ok(record)
}

/// Lay records out block by block. The final record of every block has its
/// `rec_len` stretched to the end of the block.
fn pack_records(records: Vec<Vec<u8>>, block_size: usize) -> Vec<Vec<u8>> {
    let mut blocks = Vec::new();
    let mut block = vec![0u8; block_size];
    let mut offset = 0;
    let mut last = 0;
    for record in records {
        if offset + record.len() > block_size {
            stretch(&mut block, last);
            blocks.push(std::mem::replace(&mut block, vec![0u8; block_size]));
            offset = 0;
        }
        block[offset..offset + record.len()].copy_from_slice(&record);
        last = offset;
        offset += record.len();
    }
    stretch(&mut block, last);
    blocks.push(block);
    blocks
}

fn stretch(block: &mut [u8], last: usize) {
    let rec_len = (block.len() - last) as u16;
    block[last + 4..last + 6].copy_from_slice(&rec_len.to_le_bytes());
}

/// Mark the first `count` entries of the bitmap in `block` as used.
fn set_bits(image: &mut [u8], layout: &Layout, block: u32, count: usize) {
    let size = layout.block_size;
    let bitmap = &mut image[block as usize * size..][..size];
    for bit in 0..count.min(size * 8) {
        bitmap[bit / 8] |= 1 << (bit % 8);
    }
}
