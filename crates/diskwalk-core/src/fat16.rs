//! FAT16 decoding: boot sector geometry, the FAT, and directory sectors.

use crate::error::{FsError, Result};
use crate::source::ByteSource;
use diskwalk_fs::fat16::{
    BootSector, DirEntry, BAD_CLUSTER, BOOT_SECTOR_SIZE, DIR_ENTRY_SIZE, END_OF_CHAIN,
    FIRST_DATA_CLUSTER,
};
use log::{debug, info};

pub fn read_boot_sector<S: ByteSource + ?Sized>(source: &mut S) -> Result<BootSector> {
    let raw = source.read_vec(0, BOOT_SECTOR_SIZE)?;
    Ok(diskwalk_fs::decode(&raw)?)
}

/// The fixed root region: byte offset and number of 32-byte records.
pub fn root_directory_region(boot: &BootSector) -> (u64, u32) {
    let start = u64::from(boot.root_dir_sector()) * u64::from(boot.bytes_per_sector);
    (start, u32::from(boot.root_entries))
}

/// `cluster` must be a data cluster (>= 2).
pub fn first_sector_of_cluster(cluster: u16, boot: &BootSector) -> u64 {
    u64::from(cluster - FIRST_DATA_CLUSTER) * u64::from(boot.sectors_per_cluster)
        + u64::from(boot.first_data_sector())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Next(u16),
    EndOfChain,
}

/// Look up `cluster` in the first FAT.
pub fn next_cluster_in_chain<S: ByteSource + ?Sized>(
    source: &mut S,
    cluster: u16,
    boot: &BootSector,
) -> Result<Link> {
    let offset = u64::from(boot.reserved_sectors) * u64::from(boot.bytes_per_sector)
        + u64::from(cluster) * 2;
    let mut raw = [0u8; 2];
    source.read_at(offset, &mut raw)?;
    let value = u16::from_le_bytes(raw);
    debug!("FAT[{cluster}] = {value:#06x}");

    match value {
        v if v >= END_OF_CHAIN => Ok(Link::EndOfChain),
        BAD_CLUSTER => Err(FsError::Corrupt(format!(
            "cluster {cluster} links to a bad cluster"
        ))),
        v if v < FIRST_DATA_CLUSTER => Err(FsError::Corrupt(format!(
            "cluster {cluster} links to reserved cluster {v}"
        ))),
        v if u32::from(v) > boot.cluster_count() + 1 => Err(FsError::Corrupt(format!(
            "cluster {cluster} links past the last cluster ({v})"
        ))),
        v => Ok(Link::Next(v)),
    }
}

/// Result of scanning one run of directory records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirScan {
    pub entries: Vec<DirEntry>,
    /// A terminator record was hit; the directory has nothing after it.
    pub ended: bool,
}

/// Parse up to `limit` records from `raw`, keeping only nameable entries:
/// deleted slots, `.`/`..`, long-name fragments and volume labels are dropped.
pub fn parse_directory_entries(raw: &[u8], limit: usize) -> Result<DirScan> {
    let mut scan = DirScan::default();
    for record in raw.chunks_exact(DIR_ENTRY_SIZE).take(limit) {
        let entry: DirEntry = diskwalk_fs::decode(record)?;
        if entry.is_end() {
            scan.ended = true;
            break;
        }
        if entry.is_deleted() || entry.is_dot() || entry.is_long_name() || entry.is_volume_label()
        {
            continue;
        }
        scan.entries.push(entry);
    }
    Ok(scan)
}

/// Records of one directory sector, stopping after `limit`.
pub fn read_directory_records<S: ByteSource + ?Sized>(
    source: &mut S,
    sector: u64,
    boot: &BootSector,
    limit: usize,
) -> Result<DirScan> {
    let sector_size = usize::from(boot.bytes_per_sector);
    let raw = source.read_vec(sector * sector_size as u64, sector_size)?;
    parse_directory_entries(&raw, limit)
}

pub fn records_per_sector(boot: &BootSector) -> usize {
    usize::from(boot.bytes_per_sector) / DIR_ENTRY_SIZE
}

/// Follows a cluster chain, refusing to visit more clusters than the volume has.
///
/// The FAT entry of a cluster is only looked up when the cluster after it is
/// asked for.
pub struct ClusterChain {
    next: Option<u16>,
    last: Option<u16>,
    visited: u32,
    limit: u32,
}

impl ClusterChain {
    pub fn new(start: u16, boot: &BootSector) -> Self {
        Self {
            next: (start >= FIRST_DATA_CLUSTER).then_some(start),
            last: None,
            visited: 0,
            limit: boot.cluster_count().max(1),
        }
    }

    /// The next cluster, or `None` once the chain has ended.
    pub fn advance<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        boot: &BootSector,
    ) -> Result<Option<u16>> {
        if let Some(last) = self.last.take() {
            self.next = match next_cluster_in_chain(source, last, boot)? {
                Link::Next(next) => Some(next),
                Link::EndOfChain => None,
            };
        }
        let Some(cluster) = self.next.take() else {
            return Ok(None);
        };
        self.visited += 1;
        if self.visited > self.limit {
            return Err(FsError::Corrupt(format!(
                "cluster chain longer than the {} clusters on the volume",
                self.limit
            )));
        }
        self.last = Some(cluster);
        Ok(Some(cluster))
    }
}

/// An opened FAT16 image.
pub struct Fat16Volume<S> {
    source: S,
    boot: BootSector,
}

impl<S: ByteSource> Fat16Volume<S> {
    pub fn open(mut source: S) -> Result<Self> {
        let boot = read_boot_sector(&mut source)?;
        if boot.bytes_per_sector == 0 || usize::from(boot.bytes_per_sector) % DIR_ENTRY_SIZE != 0 {
            return Err(FsError::Corrupt(format!(
                "sector size {} is not a multiple of {DIR_ENTRY_SIZE}",
                boot.bytes_per_sector
            )));
        }
        if boot.sectors_per_cluster == 0 {
            return Err(FsError::Corrupt("sectors_per_cluster is zero".into()));
        }
        info!(
            "FAT16 volume: {} sectors of {} bytes, {} per cluster, {} clusters",
            boot.total_sectors(),
            boot.bytes_per_sector,
            boot.sectors_per_cluster,
            boot.cluster_count()
        );
        Ok(Self { source, boot })
    }

    pub fn boot_sector(&self) -> &BootSector {
        &self.boot
    }

    /// Every cluster of a chain, in order.
    pub fn chain(&mut self, start: u16) -> Result<Vec<u16>> {
        let mut chain = ClusterChain::new(start, &self.boot);
        let mut clusters = Vec::new();
        while let Some(cluster) = chain.advance(&mut self.source, &self.boot)? {
            clusters.push(cluster);
        }
        Ok(clusters)
    }

    pub(crate) fn parts(&mut self) -> (&mut S, &BootSector) {
        (&mut self.source, &self.boot)
    }
}
