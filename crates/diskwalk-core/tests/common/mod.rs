#![allow(dead_code)]

use diskwalk_core::{
    Detection, DiskImage, Filesystem, Result, TreeEvent, Volume, WalkOptions,
};
use std::io::{self, Cursor, Read, Seek, SeekFrom};

pub type MemVolume = Volume<DiskImage<Cursor<Vec<u8>>>>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn open(image: Vec<u8>) -> MemVolume {
    init_logging();
    Volume::open(DiskImage::new(Cursor::new(image)), Detection::Signature).unwrap()
}

pub fn walk(volume: &mut MemVolume, options: WalkOptions) -> Result<Vec<TreeEvent>> {
    volume.walk(options).collect()
}

/// `(depth, name, is_last)` for each event.
pub fn outline(events: &[TreeEvent]) -> Vec<(usize, &str, bool)> {
    events
        .iter()
        .map(|e| (e.depth, e.name.as_str(), e.is_last))
        .collect()
}

pub fn cat(volume: &mut MemVolume, target: &str) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    volume.cat(target, &mut out)?;
    Ok(out)
}

/// Overwrite the FAT entry of `cluster` in every FAT copy.
pub fn set_fat_link(image: &mut [u8], cluster: u16, value: u16) {
    let boot: diskwalk_fs::fat16::BootSector = diskwalk_fs::decode(image).unwrap();
    let sector = usize::from(boot.bytes_per_sector);
    for copy in 0..usize::from(boot.num_fats) {
        let fat = (usize::from(boot.reserved_sectors) + copy * usize::from(boot.fat_size_16)) * sector;
        let at = fat + usize::from(cluster) * 2;
        image[at..at + 2].copy_from_slice(&value.to_le_bytes());
    }
}

/// A reader whose `seek` fails for any offset past `limit`.
pub struct SeekLimit {
    inner: Cursor<Vec<u8>>,
    limit: u64,
}

impl SeekLimit {
    pub fn new(image: Vec<u8>, limit: u64) -> Self {
        Self {
            inner: Cursor::new(image),
            limit,
        }
    }
}

impl Read for SeekLimit {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for SeekLimit {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match pos {
            SeekFrom::Start(offset) if offset > self.limit => {
                Err(io::Error::new(io::ErrorKind::Other, "device ends early"))
            }
            other => self.inner.seek(other),
        }
    }
}
