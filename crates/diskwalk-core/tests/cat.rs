mod common;

use common::{cat, init_logging, open, set_fat_link, SeekLimit};
use diskwalk_core::{Detection, DiskImage, Filesystem, FsError, NodeRef, Volume};
use diskwalk_mkimg::{Ext2Builder, Fat16Builder, ImageBuilder};
use proptest::prelude::*;

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}

#[test]
fn ext2_file_contents() {
    let mut builder = Ext2Builder::new();
    builder.file("hello.txt", b"Hello, world!\n").unwrap();
    let mut volume = open(builder.build().unwrap());
    assert_eq!(cat(&mut volume, "hello.txt").unwrap(), b"Hello, world!\n");
}

#[test]
fn ext2_multi_block_file_is_cut_at_its_size() {
    let data = pattern(3 * 1024 + 100);
    let mut builder = Ext2Builder::new();
    builder.file("docs/big.bin", &data).unwrap();
    let mut volume = open(builder.build().unwrap());
    assert_eq!(cat(&mut volume, "big.bin").unwrap(), data);
}

#[test]
fn ext2_twelve_full_blocks() {
    let data = pattern(12 * 1024);
    let mut builder = Ext2Builder::new();
    builder.file("max.bin", &data).unwrap();
    let mut volume = open(builder.build().unwrap());
    assert_eq!(cat(&mut volume, "max.bin").unwrap(), data);
}

#[test]
fn ext2_names_match_exactly() {
    let mut builder = Ext2Builder::new();
    builder.file("Hello.txt", b"H").unwrap();
    let mut volume = open(builder.build().unwrap());
    assert!(cat(&mut volume, "hello.txt").unwrap_err().is_not_found());
    assert_eq!(cat(&mut volume, "Hello.txt").unwrap(), b"H");
}

#[test]
fn first_match_in_walk_order_wins() {
    let mut builder = Ext2Builder::new();
    builder.file("a/x.txt", b"nested").unwrap();
    builder.file("x.txt", b"top").unwrap();
    let mut volume = open(builder.build().unwrap());
    assert_eq!(cat(&mut volume, "x.txt").unwrap(), b"nested");
}

#[test]
fn directories_are_never_matched() {
    let mut builder = Ext2Builder::new();
    builder.file("notes/todo", b"t").unwrap();
    let mut volume = open(builder.build().unwrap());
    let err = cat(&mut volume, "notes").unwrap_err();
    assert!(matches!(err, FsError::NotFound(ref name) if name == "notes"));
}

#[test]
fn files_in_lost_found_can_be_found() {
    let mut builder = Ext2Builder::new();
    builder.file("lost+found/#12", b"recovered").unwrap();
    let mut volume = open(builder.build().unwrap());
    assert_eq!(cat(&mut volume, "#12").unwrap(), b"recovered");
}

#[test]
fn empty_files_produce_nothing() {
    let mut ext2 = Ext2Builder::new();
    ext2.file("empty", b"").unwrap();
    let mut volume = open(ext2.build().unwrap());
    assert!(cat(&mut volume, "empty").unwrap().is_empty());

    let mut fat = Fat16Builder::new();
    fat.file("EMPTY", b"").unwrap();
    let mut volume = open(fat.build().unwrap());
    assert!(cat(&mut volume, "empty").unwrap().is_empty());
}

#[test]
fn fat16_readme() {
    let mut builder = Fat16Builder::new();
    builder.file("A.TXT", b"x").unwrap();
    builder.file("README.TXT", b"hello world").unwrap();
    let mut volume = open(builder.build().unwrap());

    let found = volume.find_file("readme.txt").unwrap();
    assert_eq!(found.name, "readme.txt");
    assert_eq!(cat(&mut volume, "readme.txt").unwrap(), b"hello world");
    assert_eq!(cat(&mut volume, "README.TXT").unwrap(), b"hello world");
    assert!(cat(&mut volume, "readme").unwrap_err().is_not_found());
}

#[test]
fn fat16_multi_cluster_file() {
    let data = pattern(1300);
    let mut builder = Fat16Builder::new();
    builder.file("DIR/DATA.BIN", &data).unwrap();
    let mut volume = open(builder.build().unwrap());
    assert_eq!(cat(&mut volume, "data.bin").unwrap(), data);
}

#[test]
fn fat16_broken_file_chain_is_corrupt() {
    let mut builder = Fat16Builder::new();
    builder.file("DATA.BIN", &pattern(1300)).unwrap();
    let mut image = builder.build().unwrap();
    set_fat_link(&mut image, 2, 0x0001);
    let mut volume = open(image);
    let err = cat(&mut volume, "data.bin").unwrap_err();
    assert!(matches!(err, FsError::Corrupt(_)), "{err}");
}

#[test]
fn fat16_short_chain_stops_early() {
    let mut builder = Fat16Builder::new();
    builder.file("DATA.BIN", &pattern(1300)).unwrap();
    let mut image = builder.build().unwrap();
    set_fat_link(&mut image, 2, 0xFFFF);
    let mut volume = open(image);
    assert_eq!(cat(&mut volume, "data.bin").unwrap(), pattern(512));
}

#[test]
fn entries_from_another_format_are_refused() {
    let mut builder = Ext2Builder::new();
    builder.file("f", b"f").unwrap();
    let mut volume = open(builder.build().unwrap());
    let foreign = NodeRef::Fat16 {
        start_cluster: 2,
        size: 1,
    };
    let err = volume.extract(&foreign, &mut Vec::<u8>::new()).unwrap_err();
    assert!(matches!(err, FsError::ForeignEntry));
}

#[test]
fn four_kib_block_file_stops_at_its_size() {
    let mut builder = Ext2Builder::new().block_size(4096).blocks(64);
    builder.file("hello.txt", b"HELLO").unwrap();
    builder.file("docs/big.bin", &pattern(3 * 4096 + 5)).unwrap();
    let mut image = builder.build().unwrap();

    // Fill the tail of hello.txt's only block with junk.
    let at = image.windows(5).position(|w| w == b"HELLO").unwrap();
    image[at + 5..at + 13].copy_from_slice(b" garbage");

    let mut volume = open(image);
    assert_eq!(cat(&mut volume, "hello.txt").unwrap(), b"HELLO");
    assert_eq!(cat(&mut volume, "big.bin").unwrap(), pattern(3 * 4096 + 5));
}

#[test]
fn fat16_multi_sector_clusters() {
    let data = pattern(5000);
    for spc in [2u8, 4, 8] {
        let mut builder = Fat16Builder::new().sectors_per_cluster(spc);
        builder.file("TOP.BIN", &data).unwrap();
        builder.file("SUB/DEEP.BIN", &data[..1500]).unwrap();
        let mut volume = open(builder.build().unwrap());
        assert_eq!(cat(&mut volume, "top.bin").unwrap(), data, "spc {spc}");
        assert_eq!(cat(&mut volume, "deep.bin").unwrap(), &data[..1500], "spc {spc}");
    }
}

#[test]
fn ext2_truncated_data_block_is_a_short_read() {
    let mut builder = Ext2Builder::new();
    builder.file("tail.bin", &pattern(2048)).unwrap();
    let mut image = builder.build().unwrap();
    // Root dir at 21, lost+found at 22, tail.bin at 23 and 24.
    image.truncate(24 * 1024);
    let mut volume = open(image);
    let err = cat(&mut volume, "tail.bin").unwrap_err();
    assert!(
        matches!(err, FsError::ShortRead { offset, got: 0, .. } if offset == 24 * 1024),
        "{err}"
    );
}

#[test]
fn fat16_failed_seek_aborts_cat() {
    init_logging();
    let mut builder = Fat16Builder::new();
    builder.file("DATA.BIN", &pattern(100)).unwrap();
    // Everything up to and including the root directory is reachable.
    let data_start = (1 + 2 * 32 + 32) * 512;
    let source = DiskImage::new(SeekLimit::new(builder.build().unwrap(), data_start - 1));
    let mut volume = Volume::open(source, Detection::Signature).unwrap();
    let err = volume.cat("data.bin", &mut Vec::<u8>::new()).unwrap_err();
    assert!(matches!(err, FsError::SeekFailure { offset, .. } if offset == data_start), "{err}");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn contents_survive_both_formats(data in prop::collection::vec(any::<u8>(), 0..6000)) {
        let mut ext2 = Ext2Builder::new();
        ext2.file("blob", &data).unwrap();
        let mut volume = open(ext2.build().unwrap());
        prop_assert_eq!(cat(&mut volume, "blob").unwrap(), data.clone());

        let mut fat = Fat16Builder::new();
        fat.file("BLOB", &data).unwrap();
        let mut volume = open(fat.build().unwrap());
        prop_assert_eq!(cat(&mut volume, "blob").unwrap(), data);
    }
}
