//! Streams file contents by following block pointers or cluster chains.
//!
//! Output is capped at the size recorded in the inode or directory entry, so
//! the slack at the end of the final block or sector never leaks out.

use crate::error::Result;
use crate::ext2::{block_size, read_block};
use crate::fat16::{first_sector_of_cluster, ClusterChain};
use crate::source::ByteSource;
use diskwalk_fs::ext2::{Inode, Superblock, N_DIRECT_BLOCKS};
use diskwalk_fs::fat16::BootSector;
use log::{debug, warn};
use std::io::Write;

/// Copy an EXT2 file's direct blocks to `out`.
///
/// Hole pointers (0) are skipped. Blocks past the twelfth are reachable only
/// through indirect pointers and are not emitted.
pub fn extract_ext2<S, W>(
    source: &mut S,
    superblock: &Superblock,
    inode: &Inode,
    out: &mut W,
) -> Result<u64>
where
    S: ByteSource + ?Sized,
    W: Write + ?Sized,
{
    let block_size = u64::from(block_size(superblock)?);
    let size = u64::from(inode.size);
    let span = inode.block_span(block_size as u32) as usize;
    if span > N_DIRECT_BLOCKS {
        warn!(
            "file of {size} bytes spans {span} blocks; output stops after {N_DIRECT_BLOCKS}"
        );
    }

    let mut written = 0;
    for (index, &block) in inode.block.iter().take(span.min(N_DIRECT_BLOCKS)).enumerate() {
        if block == 0 {
            debug!("logical block {index} is a hole");
            continue;
        }
        let start = index as u64 * block_size;
        let len = (size - start).min(block_size) as usize;
        let data = read_block(source, superblock, block)?;
        out.write_all(&data[..len])?;
        written += len as u64;
    }
    Ok(written)
}

/// Copy `file_size` bytes of a FAT16 file starting at `start_cluster`.
pub fn extract_fat16<S, W>(
    source: &mut S,
    boot: &BootSector,
    start_cluster: u16,
    file_size: u32,
    out: &mut W,
) -> Result<u64>
where
    S: ByteSource + ?Sized,
    W: Write + ?Sized,
{
    let sector_size = u64::from(boot.bytes_per_sector);
    let mut remaining = u64::from(file_size);
    let mut written = 0;
    let mut chain = ClusterChain::new(start_cluster, boot);

    while remaining > 0 {
        let Some(cluster) = chain.advance(source, boot)? else {
            warn!("cluster chain ended {remaining} bytes short of the recorded size");
            break;
        };
        let first = first_sector_of_cluster(cluster, boot);
        for sector in first..first + u64::from(boot.sectors_per_cluster) {
            if remaining == 0 {
                break;
            }
            let len = remaining.min(sector_size) as usize;
            let data = source.read_vec(sector * sector_size, len)?;
            out.write_all(&data)?;
            remaining -= len as u64;
            written += len as u64;
        }
    }
    Ok(written)
}
