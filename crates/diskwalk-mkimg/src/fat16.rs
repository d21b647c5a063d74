//! FAT16 images with 512-byte sectors, two FATs and a 512-entry root.
//!
//! Clusters are handed out sequentially from 2 in the order nodes were
//! added, so every chain is contiguous unless a test patches the FAT.

use crate::tree::{Kind, Tree, ROOT};
use crate::{BuildError, ImageBuilder, Result};
use diskwalk_fs::encode;
use diskwalk_fs::fat16::{
    pack_short_name, Attributes, BootSector, DirEntry, DIR_ENTRY_SIZE, ENTRY_DELETED,
    FIRST_DATA_CLUSTER, FS_TYPE,
};
use log::debug;

pub const SECTOR_SIZE: usize = 512;
const RESERVED_SECTORS: u16 = 1;
const NUM_FATS: u8 = 2;
const ROOT_ENTRIES: u16 = 512;
const MEDIA_FIXED: u8 = 0xF8;
const CHAIN_END: u16 = 0xFFFF;

pub struct Fat16Builder {
    tree: Tree,
    total_sectors: u32,
    sectors_per_cluster: u8,
    signature: bool,
    volume_label: Option<[u8; 11]>,
}

impl Default for Fat16Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Fat16Builder {
    pub fn new() -> Self {
        Self {
            tree: Tree::new(),
            total_sectors: 8192,
            sectors_per_cluster: 1,
            signature: true,
            volume_label: None,
        }
    }

    pub fn total_sectors(mut self, sectors: u32) -> Self {
        self.total_sectors = sectors;
        self
    }

    pub fn sectors_per_cluster(mut self, sectors: u8) -> Self {
        self.sectors_per_cluster = sectors;
        self
    }

    /// Leave the `"FAT16   "` type string out of the boot sector.
    pub fn without_signature(mut self) -> Self {
        self.signature = false;
        self
    }

    /// Record a label in the boot sector and as the first root entry.
    pub fn volume_label(mut self, label: &str) -> Self {
        let mut packed = [b' '; 11];
        for (dst, src) in packed.iter_mut().zip(label.bytes()) {
            *dst = src.to_ascii_uppercase();
        }
        self.volume_label = Some(packed);
        self
    }

    /// Append a record to `dir` exactly as given.
    pub fn raw_entry(&mut self, dir: &str, entry: DirEntry) -> Result<&mut Self> {
        let dir = self.tree.find_dir(dir)?;
        let mut record = vec![0u8; DIR_ENTRY_SIZE];
        encode(&entry, &mut record)?;
        self.tree.push_raw(dir, record);
        Ok(self)
    }

    /// A slot freed by deleting `name`.
    pub fn deleted(&mut self, dir: &str, name: &str) -> Result<&mut Self> {
        let (mut base, ext) = pack_short_name(name);
        base[0] = ENTRY_DELETED;
        self.raw_entry(
            dir,
            DirEntry {
                name: base,
                ext,
                attributes: Attributes::ARCHIVE.bits(),
                ..Default::default()
            },
        )
    }

    /// One long-name fragment, as VFAT writes ahead of a short entry.
    pub fn long_name_fragment(&mut self, dir: &str) -> Result<&mut Self> {
        self.raw_entry(
            dir,
            DirEntry {
                name: *b"Al\0o\0n\0g",
                ext: *b"\0n\0",
                attributes: Attributes::LONG_NAME.bits(),
                ..Default::default()
            },
        )
    }

    /// Add a second entry `path` for the existing directory `target`.
    pub fn alias(&mut self, path: &str, target: &str) -> Result<&mut Self> {
        check_path(path)?;
        let target = self.tree.find_dir(target)?;
        self.tree.insert(path, Kind::Alias(target))?;
        Ok(self)
    }

    fn boot_sector(&self) -> Result<BootSector> {
        let mut boot = BootSector {
            jump: [0xEB, 0x3C, 0x90],
            oem_name: *b"DISKWALK",
            bytes_per_sector: SECTOR_SIZE as u16,
            sectors_per_cluster: self.sectors_per_cluster,
            reserved_sectors: RESERVED_SECTORS,
            num_fats: NUM_FATS,
            root_entries: ROOT_ENTRIES,
            media: MEDIA_FIXED,
            sectors_per_track: 32,
            num_heads: 64,
            drive_number: 0x80,
            boot_signature: 0x29,
            volume_id: 0x1234_5678,
            volume_label: self.volume_label.unwrap_or(*b"NO NAME    "),
            fs_type: if self.signature { *FS_TYPE } else { *b"        " },
            ..Default::default()
        };
        if self.total_sectors <= u32::from(u16::MAX) {
            boot.total_sectors_16 = self.total_sectors as u16;
        } else {
            boot.total_sectors_32 = self.total_sectors;
        }

        // Smallest FAT that still covers every cluster it leaves room for.
        for fat_size in 1..=u16::MAX {
            boot.fat_size_16 = fat_size;
            if boot.first_data_sector() >= self.total_sectors {
                break;
            }
            let entries = usize::from(fat_size) * SECTOR_SIZE / 2;
            if boot.cluster_count() as usize + 2 <= entries {
                return Ok(boot);
            }
        }
        Err(BuildError::Full("no room for the FAT"))
    }

    /// Clusters each node occupies, indexed like the tree.
    fn allocate(&self, boot: &BootSector) -> Result<Vec<Vec<u16>>> {
        let cluster_size = boot.cluster_size() as usize;
        let last = boot.cluster_count() + 1;
        let mut next = u32::from(FIRST_DATA_CLUSTER);
        let mut clusters = Vec::with_capacity(self.tree.nodes.len());

        for (index, node) in self.tree.nodes.iter().enumerate() {
            let needed = match &node.kind {
                Kind::Dir(children) if index != ROOT => {
                    ((children.len() + 2) * DIR_ENTRY_SIZE).div_ceil(cluster_size)
                }
                Kind::File(contents) => contents.len().div_ceil(cluster_size),
                _ => 0,
            };
            if next as usize + needed > last as usize + 1 {
                return Err(BuildError::Full("clusters"));
            }
            clusters.push((next..next + needed as u32).map(|c| c as u16).collect());
            next += needed as u32;
        }
        Ok(clusters)
    }

    fn entry_for(&self, node: usize, clusters: &[Vec<u16>]) -> DirEntry {
        let first = |n: usize| clusters[n].first().copied().unwrap_or(0);
        let node_ref = &self.tree.nodes[node];
        let (name, ext) = pack_short_name(&node_ref.name);
        let (attributes, first_cluster, file_size) = match &node_ref.kind {
            Kind::Dir(_) => (Attributes::DIRECTORY, first(node), 0),
            Kind::Alias(target) => (Attributes::DIRECTORY, first(*target), 0),
            Kind::File(contents) => (Attributes::ARCHIVE, first(node), contents.len() as u32),
            Kind::Raw(_) => (Attributes::empty(), 0, 0),
        };
        DirEntry {
            name,
            ext,
            attributes: attributes.bits(),
            first_cluster,
            file_size,
            ..Default::default()
        }
    }

    /// Every 32-byte record of one directory, in order.
    fn directory_records(&self, dir: usize, clusters: &[Vec<u16>]) -> Result<Vec<Vec<u8>>> {
        let mut records = Vec::new();
        let mut push = |entry: DirEntry| -> Result<()> {
            let mut record = vec![0u8; DIR_ENTRY_SIZE];
            encode(&entry, &mut record)?;
            records.push(record);
            Ok(())
        };

        if dir == ROOT {
            if let Some(label) = self.volume_label {
                let (name, ext) = label.split_at(8);
                push(DirEntry {
                    name: name.try_into().unwrap_or([b' '; 8]),
                    ext: ext.try_into().unwrap_or([b' '; 3]),
                    attributes: Attributes::VOLUME_ID.bits(),
                    ..Default::default()
                })?;
            }
        } else {
            let parent = self.tree.nodes[dir].parent;
            let cluster_of = |n: usize| clusters[n].first().copied().unwrap_or(0);
            push(DirEntry {
                name: *b".       ",
                ext: *b"   ",
                attributes: Attributes::DIRECTORY.bits(),
                first_cluster: cluster_of(dir),
                ..Default::default()
            })?;
            push(DirEntry {
                name: *b"..      ",
                ext: *b"   ",
                attributes: Attributes::DIRECTORY.bits(),
                first_cluster: if parent == ROOT { 0 } else { cluster_of(parent) },
                ..Default::default()
            })?;
        }

        for &child in self.tree.children(dir) {
            match &self.tree.nodes[child].kind {
                Kind::Raw(record) => records.push(record.clone()),
                _ => {
                    let entry = self.entry_for(child, clusters);
                    let mut record = vec![0u8; DIR_ENTRY_SIZE];
                    encode(&entry, &mut record)?;
                    records.push(record);
                }
            }
        }
        Ok(records)
    }
}

impl ImageBuilder for Fat16Builder {
    fn dir(&mut self, path: &str) -> Result<&mut Self> {
        check_path(path)?;
        self.tree.mkdir_all(path)?;
        Ok(self)
    }

    fn file(&mut self, path: &str, contents: &[u8]) -> Result<&mut Self> {
        check_path(path)?;
        self.tree.insert(path, Kind::File(contents.to_vec()))?;
        Ok(self)
    }

    fn build(&self) -> Result<Vec<u8>> {
        let boot = self.boot_sector()?;
        let clusters = self.allocate(&boot)?;
        let mut image = vec![0u8; self.total_sectors as usize * SECTOR_SIZE];

        encode(&boot, &mut image)?;
        image[510] = 0x55;
        image[511] = 0xAA;

        let fat_bytes = usize::from(boot.fat_size_16) * SECTOR_SIZE;
        let mut fat = vec![0u8; fat_bytes];
        fat[0..2].copy_from_slice(&(0xFF00 | u16::from(MEDIA_FIXED)).to_le_bytes());
        fat[2..4].copy_from_slice(&CHAIN_END.to_le_bytes());
        for chain in &clusters {
            for (i, &cluster) in chain.iter().enumerate() {
                let link = chain.get(i + 1).copied().unwrap_or(CHAIN_END);
                let at = usize::from(cluster) * 2;
                fat[at..at + 2].copy_from_slice(&link.to_le_bytes());
            }
        }
        for copy in 0..usize::from(NUM_FATS) {
            let start = (usize::from(RESERVED_SECTORS) + copy * usize::from(boot.fat_size_16))
                * SECTOR_SIZE;
            image[start..start + fat_bytes].copy_from_slice(&fat);
        }

        let cluster_size = boot.cluster_size() as usize;
        let cluster_offset = |cluster: u16| {
            (boot.first_data_sector() as usize
                + usize::from(cluster - FIRST_DATA_CLUSTER) * usize::from(boot.sectors_per_cluster))
                * SECTOR_SIZE
        };

        for dir in self.tree.dirs() {
            let records = self.directory_records(dir, &clusters)?;
            if dir == ROOT {
                if records.len() > usize::from(ROOT_ENTRIES) {
                    return Err(BuildError::Full("root directory entries"));
                }
                let start = boot.root_dir_sector() as usize * SECTOR_SIZE;
                for (i, record) in records.iter().enumerate() {
                    let at = start + i * DIR_ENTRY_SIZE;
                    image[at..at + DIR_ENTRY_SIZE].copy_from_slice(record);
                }
                continue;
            }
            let per_cluster = cluster_size / DIR_ENTRY_SIZE;
            for (i, record) in records.iter().enumerate() {
                let at = cluster_offset(clusters[dir][i / per_cluster])
                    + (i % per_cluster) * DIR_ENTRY_SIZE;
                image[at..at + DIR_ENTRY_SIZE].copy_from_slice(record);
            }
        }

        for (index, node) in self.tree.nodes.iter().enumerate() {
            let Kind::File(contents) = &node.kind else {
                continue;
            };
            for (chunk, &cluster) in contents.chunks(cluster_size).zip(&clusters[index]) {
                let at = cluster_offset(cluster);
                image[at..at + chunk.len()].copy_from_slice(chunk);
            }
            debug!("{}: {} bytes in clusters {:?}", node.name, contents.len(), clusters[index]);
        }
        Ok(image)
    }
}

fn check_path(path: &str) -> Result<()> {
    path.split('/')
        .filter(|c| !c.is_empty())
        .try_for_each(check_short_name)
}

/// Names must already be valid 8.3: a 1-8 byte base, an optional 1-3 byte
/// extension, printable ASCII only.
fn check_short_name(name: &str) -> Result<()> {
    let bad = || BuildError::BadName(name.to_owned());
    let (base, ext) = match name.rsplit_once('.') {
        Some((base, ext)) if !ext.is_empty() => (base, ext),
        Some(_) => return Err(bad()),
        None => (name, ""),
    };
    let valid = |part: &str| {
        part.bytes()
            .all(|c| c.is_ascii_graphic() && !b".\"*/:<>?\\|".contains(&c))
    };
    if base.is_empty() || base.len() > 8 || ext.len() > 3 || !valid(base) || !valid(ext) {
        return Err(bad());
    }
    Ok(())
}
