//! FAT16 records: BIOS parameter block and 32-byte directory entries.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

pub const BOOT_SECTOR_SIZE: usize = 512;
pub const FS_TYPE_OFFSET: u64 = 54;
pub const FS_TYPE: &[u8; 8] = b"FAT16   ";
pub const DIR_ENTRY_SIZE: usize = 32;
pub const END_OF_CHAIN: u16 = 0xFFF8;
pub const BAD_CLUSTER: u16 = 0xFFF7;
pub const FIRST_DATA_CLUSTER: u16 = 2;
/// FAT16 volumes hold at least this many clusters...
pub const MIN_CLUSTERS: u32 = 4085;
/// ...and strictly fewer than this many.
pub const MAX_CLUSTERS: u32 = 65525;

pub const ENTRY_END: u8 = 0x00;
pub const ENTRY_DELETED: u8 = 0xE5;
/// Stored in place of a leading 0xE5 that belongs to the name itself.
pub const ENTRY_KANJI_E5: u8 = 0x05;
pub const ENTRY_DOT: u8 = 0x2E;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Attributes: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN = 0x02;
        const SYSTEM = 0x04;
        const VOLUME_ID = 0x08;
        const DIRECTORY = 0x10;
        const ARCHIVE = 0x20;
        const LONG_NAME = 0x0F;
    }
}

/// Boot sector up to the extended-BPB filesystem type string.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct BootSector {
    pub jump: [u8; 3],
    pub oem_name: [u8; 8],
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub num_fats: u8,
    pub root_entries: u16,
    pub total_sectors_16: u16,
    pub media: u8,
    pub fat_size_16: u16,
    pub sectors_per_track: u16,
    pub num_heads: u16,
    pub hidden_sectors: u32,
    pub total_sectors_32: u32,
    pub drive_number: u8,
    pub reserved1: u8,
    pub boot_signature: u8,
    pub volume_id: u32,
    pub volume_label: [u8; 11],
    pub fs_type: [u8; 8],
}

impl BootSector {
    /// The 16-bit count wins whenever it is nonzero.
    pub fn total_sectors(&self) -> u32 {
        if self.total_sectors_16 != 0 {
            u32::from(self.total_sectors_16)
        } else {
            self.total_sectors_32
        }
    }

    pub fn root_dir_sectors(&self) -> u32 {
        if self.bytes_per_sector == 0 {
            return 0;
        }
        (u32::from(self.root_entries) * DIR_ENTRY_SIZE as u32)
            .div_ceil(u32::from(self.bytes_per_sector))
    }

    /// First sector of the fixed root directory region.
    pub fn root_dir_sector(&self) -> u32 {
        u32::from(self.reserved_sectors)
            + u32::from(self.num_fats) * u32::from(self.fat_size_16)
    }

    pub fn first_data_sector(&self) -> u32 {
        self.root_dir_sector() + self.root_dir_sectors()
    }

    pub fn cluster_count(&self) -> u32 {
        if self.sectors_per_cluster == 0 {
            return 0;
        }
        self.total_sectors().saturating_sub(self.first_data_sector())
            / u32::from(self.sectors_per_cluster)
    }

    pub fn cluster_size(&self) -> u32 {
        u32::from(self.bytes_per_sector) * u32::from(self.sectors_per_cluster)
    }

    pub fn has_fat16_signature(&self) -> bool {
        &self.fs_type == FS_TYPE
    }

    pub fn has_fat16_cluster_count(&self) -> bool {
        (MIN_CLUSTERS..MAX_CLUSTERS).contains(&self.cluster_count())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirEntry {
    pub name: [u8; 8],
    pub ext: [u8; 3],
    pub attributes: u8,
    pub nt_reserved: u8,
    pub create_time_tenth: u8,
    pub create_time: u16,
    pub create_date: u16,
    pub access_date: u16,
    pub first_cluster_hi: u16,
    pub write_time: u16,
    pub write_date: u16,
    pub first_cluster: u16,
    pub file_size: u32,
}

impl DirEntry {
    pub fn attributes(&self) -> Attributes {
        Attributes::from_bits_retain(self.attributes)
    }

    pub fn is_end(&self) -> bool {
        self.name[0] == ENTRY_END
    }

    pub fn is_deleted(&self) -> bool {
        self.name[0] == ENTRY_DELETED
    }

    /// `.` and `..` records at the head of every subdirectory.
    pub fn is_dot(&self) -> bool {
        self.name[0] == ENTRY_DOT
    }

    pub fn is_long_name(&self) -> bool {
        self.attributes & Attributes::LONG_NAME.bits() == Attributes::LONG_NAME.bits()
    }

    pub fn is_volume_label(&self) -> bool {
        !self.is_long_name() && self.attributes().contains(Attributes::VOLUME_ID)
    }

    pub fn is_dir(&self) -> bool {
        self.attributes().contains(Attributes::DIRECTORY)
    }

    /// 8.3 name with padding stripped from each half, joined by `.` only
    /// when an extension is present. Case is left as stored.
    pub fn short_name(&self) -> ShortName {
        let mut out = ShortName::default();
        let base = trim_padding(&self.name);
        for (i, &c) in base.iter().enumerate() {
            let c = if i == 0 && c == ENTRY_KANJI_E5 { ENTRY_DELETED } else { c };
            out.push(c);
        }
        let ext = trim_padding(&self.ext);
        if !ext.is_empty() {
            out.push(b'.');
            ext.iter().for_each(|&c| out.push(c));
        }
        out
    }
}

fn trim_padding(field: &[u8]) -> &[u8] {
    let end = field.iter().rposition(|&c| c != b' ').map_or(0, |i| i + 1);
    &field[..end]
}

/// At most `8 + 1 + 3` bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShortName {
    bytes: [u8; 12],
    len: usize,
}

impl ShortName {
    fn push(&mut self, c: u8) {
        self.bytes[self.len] = c;
        self.len += 1;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// Split `name.ext` into space-padded 8.3 fields, upper-cased.
pub fn pack_short_name(name: &str) -> ([u8; 8], [u8; 3]) {
    let (base, ext) = name.rsplit_once('.').unwrap_or((name, ""));
    let mut packed_base = [b' '; 8];
    let mut packed_ext = [b' '; 3];
    for (dst, src) in packed_base.iter_mut().zip(base.bytes()) {
        *dst = src.to_ascii_uppercase();
    }
    for (dst, src) in packed_ext.iter_mut().zip(ext.bytes()) {
        *dst = src.to_ascii_uppercase();
    }
    (packed_base, packed_ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decode, encode};

    fn entry(name: &[u8; 8], ext: &[u8; 3], attributes: u8) -> DirEntry {
        DirEntry {
            name: *name,
            ext: *ext,
            attributes,
            ..Default::default()
        }
    }

    #[test]
    fn short_name_trims_each_half() {
        let e = entry(b"README  ", b"TXT", 0x20);
        assert_eq!(e.short_name().as_bytes(), b"README.TXT");
        let e = entry(b"DOCS    ", b"   ", 0x10);
        assert_eq!(e.short_name().as_bytes(), b"DOCS");
        let e = entry(b"A B     ", b"C  ", 0x20);
        assert_eq!(e.short_name().as_bytes(), b"A B.C");
    }

    #[test]
    fn leading_kanji_marker_reads_as_e5() {
        let e = entry(b"\x05ABC    ", b"   ", 0x20);
        assert_eq!(e.short_name().as_bytes(), b"\xE5ABC");
        assert!(!e.is_deleted());
    }

    #[test]
    fn classifies_special_records() {
        assert!(entry(b"\xE5EADME  ", b"TXT", 0x20).is_deleted());
        assert!(entry(b"\0       ", b"   ", 0).is_end());
        assert!(entry(b"..      ", b"   ", 0x10).is_dot());
        assert!(entry(b"Ab      ", b"   ", 0x0F).is_long_name());
        assert!(entry(b"VOLUME  ", b"   ", 0x08).is_volume_label());
        assert!(!entry(b"Ab      ", b"   ", 0x0F).is_volume_label());
        assert!(entry(b"SUB     ", b"   ", 0x10).is_dir());
    }

    #[test]
    fn dir_entry_is_32_bytes_with_cluster_at_26() {
        let mut buf = [0u8; 64];
        let e = DirEntry {
            first_cluster: 3,
            file_size: 11,
            ..entry(b"README  ", b"TXT", 0x20)
        };
        assert_eq!(encode(&e, &mut buf).unwrap(), DIR_ENTRY_SIZE);
        assert_eq!(&buf[26..28], &3u16.to_le_bytes());
        assert_eq!(&buf[28..32], &11u32.to_le_bytes());
        assert_eq!(decode::<DirEntry>(&buf).unwrap(), e);
    }

    #[test]
    fn fs_type_sits_at_offset_54() {
        let mut raw = [0u8; BOOT_SECTOR_SIZE];
        raw[54..62].copy_from_slice(FS_TYPE);
        let bs: BootSector = decode(&raw).unwrap();
        assert!(bs.has_fat16_signature());
    }

    #[test]
    fn geometry_follows_the_bpb() {
        let bs = BootSector {
            bytes_per_sector: 512,
            sectors_per_cluster: 1,
            reserved_sectors: 1,
            num_fats: 2,
            root_entries: 512,
            total_sectors_16: 0,
            total_sectors_32: 8192,
            fat_size_16: 32,
            ..Default::default()
        };
        assert_eq!(bs.total_sectors(), 8192);
        assert_eq!(bs.root_dir_sector(), 65);
        assert_eq!(bs.root_dir_sectors(), 32);
        assert_eq!(bs.first_data_sector(), 97);
        assert_eq!(bs.cluster_count(), 8095);
        assert!(bs.has_fat16_cluster_count());

        let short_wins = BootSector {
            total_sectors_16: 100,
            ..bs
        };
        assert_eq!(short_wins.total_sectors(), 100);
        assert!(!short_wins.has_fat16_cluster_count());
    }

    #[test]
    fn packs_names_into_8_3() {
        assert_eq!(pack_short_name("readme.txt"), (*b"README  ", *b"TXT"));
        assert_eq!(pack_short_name("docs"), (*b"DOCS    ", *b"   "));
    }
}
