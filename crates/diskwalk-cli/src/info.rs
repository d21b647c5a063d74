//! Superblock and boot sector dumps for `diskwalk info`.

use diskwalk_fs::ext2::Superblock;
use diskwalk_fs::fat16::BootSector;
use std::io::{self, Write};

const HEADER: &str = "---- Filesystem Information ----";

pub fn write_ext2<W: Write>(out: &mut W, sb: &Superblock) -> io::Result<()> {
    writeln!(out, "{HEADER}\n")?;
    writeln!(out, "Filesystem: EXT2\n")?;

    writeln!(out, "INODE INFO")?;
    writeln!(out, "Inode Size: {} bytes", sb.inode_size())?;
    writeln!(out, "Num Inodes: {}", sb.inodes_count)?;
    writeln!(out, "First Inode: {}", sb.first_inode())?;
    writeln!(out, "Inodes per Group: {}", sb.inodes_per_group)?;
    writeln!(out, "Free Inodes: {}\n", sb.free_inodes_count)?;

    writeln!(out, "BLOCK INFO")?;
    match sb.block_size() {
        Some(size) => writeln!(out, "Block Size: {size} bytes")?,
        None => writeln!(out, "Block Size: invalid (log {})", sb.log_block_size)?,
    }
    writeln!(out, "Reserved Blocks: {}", sb.r_blocks_count)?;
    writeln!(out, "Free Blocks: {}", sb.free_blocks_count)?;
    writeln!(out, "Total Blocks: {}", sb.blocks_count)?;
    writeln!(out, "First Block: {}", sb.first_data_block)?;
    writeln!(out, "Group Count: {}", sb.group_count())?;
    writeln!(out, "Blocks per Group: {}", sb.blocks_per_group)?;
    writeln!(out, "Frags per Group: {}\n", sb.frags_per_group)?;

    writeln!(out, "VOLUME INFO")?;
    writeln!(
        out,
        "Volume Name: {}",
        String::from_utf8_lossy(sb.volume_name())
    )?;
    // Unix seconds, as stored.
    writeln!(out, "Last Checked: {}", sb.lastcheck)?;
    writeln!(out, "Last Mounted: {}", sb.mtime)?;
    writeln!(out, "Last Written: {}", sb.wtime)?;
    Ok(())
}

pub fn write_fat16<W: Write>(out: &mut W, boot: &BootSector) -> io::Result<()> {
    writeln!(out, "{HEADER}\n")?;
    writeln!(out, "Filesystem: FAT16\n")?;
    writeln!(out, "System Name: {}", trimmed(&boot.oem_name))?;
    writeln!(out, "Sector Size: {} bytes", boot.bytes_per_sector)?;
    writeln!(out, "Sectors per Cluster: {}", boot.sectors_per_cluster)?;
    writeln!(out, "Reserved Sectors: {}", boot.reserved_sectors)?;
    writeln!(out, "# of FATs: {}", boot.num_fats)?;
    writeln!(out, "Max Root Entries: {}", boot.root_entries)?;
    writeln!(out, "Sectors per FAT: {}", boot.fat_size_16)?;
    writeln!(out, "Total Sectors: {}", boot.total_sectors())?;
    writeln!(out, "Clusters: {}", boot.cluster_count())?;
    writeln!(out, "Label: {}", trimmed(&boot.volume_label))?;
    Ok(())
}

fn trimmed(field: &[u8]) -> String {
    String::from_utf8_lossy(field)
        .trim_end_matches([' ', '\0'])
        .to_owned()
}
