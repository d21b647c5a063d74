mod common;

use common::{init_logging, open, outline, set_fat_link, walk};
use diskwalk_core::{
    Detection, DiskImage, Filesystem, FsError, FsKind, NodeRef, Volume, WalkOptions,
};
use diskwalk_fs::fat16::{Attributes, DirEntry};
use diskwalk_mkimg::{Fat16Builder, ImageBuilder};
use std::io::Cursor;

#[test]
fn short_names_are_lowercased_with_their_cluster() {
    let mut builder = Fat16Builder::new();
    builder.file("A.TXT", b"x").unwrap();
    builder.file("README.TXT", b"hello world").unwrap();
    let mut volume = open(builder.build().unwrap());
    assert_eq!(volume.kind(), FsKind::Fat16);

    let events = walk(&mut volume, WalkOptions::default()).unwrap();
    assert_eq!(outline(&events), [(0, "a.txt", false), (0, "readme.txt", true)]);
    assert_eq!(events[1].raw_name, b"README.TXT");
    assert_eq!(
        events[1].node,
        NodeRef::Fat16 {
            start_cluster: 3,
            size: 11
        }
    );
}

#[test]
fn deleted_entries_are_skipped() {
    let mut builder = Fat16Builder::new();
    builder.file("ONE.TXT", b"1").unwrap();
    builder.deleted("", "OLD.TXT").unwrap();
    builder.file("TWO.TXT", b"2").unwrap();
    let mut volume = open(builder.build().unwrap());

    let events = walk(&mut volume, WalkOptions::default()).unwrap();
    assert_eq!(outline(&events), [(0, "one.txt", false), (0, "two.txt", true)]);
}

#[test]
fn labels_and_long_name_fragments_are_skipped() {
    let mut builder = Fat16Builder::new().volume_label("DISK");
    builder.long_name_fragment("").unwrap();
    builder.file("NAME.TXT", b"n").unwrap();
    let mut volume = open(builder.build().unwrap());

    let events = walk(&mut volume, WalkOptions::default()).unwrap();
    assert_eq!(outline(&events), [(0, "name.txt", true)]);
}

#[test]
fn subdirectories_hide_their_dot_entries() {
    let mut builder = Fat16Builder::new();
    builder.file("SUB/INNER.TXT", b"i").unwrap();
    builder.dir("EMPTY").unwrap();
    builder.file("LAST.TXT", b"l").unwrap();
    let mut volume = open(builder.build().unwrap());

    let events = walk(&mut volume, WalkOptions::default()).unwrap();
    assert_eq!(
        outline(&events),
        [
            (0, "sub", false),
            (1, "inner.txt", true),
            (0, "empty", false),
            (0, "last.txt", true),
        ]
    );
    assert!(events[0].is_dir && events[2].is_dir);
}

#[test]
fn last_sibling_is_marked_per_sector() {
    for spc in [1, 4] {
        let mut builder = Fat16Builder::new().sectors_per_cluster(spc);
        for i in 0..20 {
            builder.file(&format!("MANY/F{i:02}.TXT"), b"").unwrap();
        }
        let mut volume = open(builder.build().unwrap());

        let events = walk(&mut volume, WalkOptions::default()).unwrap();
        let children: Vec<_> = events.iter().filter(|e| e.depth == 1).collect();
        assert_eq!(children.len(), 20, "spc {spc}");
        assert_eq!(children[0].name, "f00.txt");
        let lasts: Vec<_> = children
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_last)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(lasts, [13, 19], "spc {spc}");
    }
}

#[test]
fn leading_0x05_reads_as_0xe5() {
    let mut builder = Fat16Builder::new();
    builder
        .raw_entry(
            "",
            DirEntry {
                name: [0x05, b'A', b'B', b' ', b' ', b' ', b' ', b' '],
                ext: *b"TXT",
                attributes: Attributes::ARCHIVE.bits(),
                ..Default::default()
            },
        )
        .unwrap();
    let mut volume = open(builder.build().unwrap());

    let events = walk(&mut volume, WalkOptions::default()).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].raw_name, [0xE5, b'A', b'B', b'.', b'T', b'X', b'T']);
}

#[test]
fn directory_aliases_are_not_reentered() {
    let mut builder = Fat16Builder::new();
    builder.dir("A").unwrap();
    builder.alias("A/SELF", "A").unwrap();
    let mut volume = open(builder.build().unwrap());

    let events = walk(&mut volume, WalkOptions::default()).unwrap();
    assert_eq!(outline(&events), [(0, "a", true), (1, "self", true)]);
}

#[test]
fn walking_twice_gives_the_same_tree() {
    let mut builder = Fat16Builder::new();
    builder.file("X/Y/Z.BIN", &[1; 700]).unwrap();
    builder.file("TOP", b"t").unwrap();
    let mut volume = open(builder.build().unwrap());
    let first = walk(&mut volume, WalkOptions::default()).unwrap();
    let second = walk(&mut volume, WalkOptions::default()).unwrap();
    assert_eq!(first.len(), 4);
    assert_eq!(first, second);
}

/// A directory whose first sector is full, so the walk has to consult the FAT.
fn full_directory() -> (Vec<u8>, u16) {
    let mut builder = Fat16Builder::new();
    for i in 0..14 {
        builder.file(&format!("FULL/E{i:02}"), b"").unwrap();
    }
    (builder.build().unwrap(), 2)
}

#[test]
fn out_of_range_links_are_corrupt() {
    let (mut image, cluster) = full_directory();
    set_fat_link(&mut image, cluster, 0xFFF0);
    let mut volume = open(image);
    let err = walk(&mut volume, WalkOptions::default()).unwrap_err();
    assert!(matches!(err, FsError::Corrupt(_)), "{err}");
}

#[test]
fn bad_cluster_links_are_corrupt() {
    let (mut image, cluster) = full_directory();
    set_fat_link(&mut image, cluster, 0xFFF7);
    let mut volume = open(image);
    let err = walk(&mut volume, WalkOptions::default()).unwrap_err();
    assert!(matches!(err, FsError::Corrupt(_)), "{err}");
}

#[test]
fn looping_chains_are_cut_off() {
    let (mut image, cluster) = full_directory();
    set_fat_link(&mut image, cluster, cluster);
    let mut volume = open(image);
    let err = walk(&mut volume, WalkOptions::default()).unwrap_err();
    assert!(matches!(err, FsError::Corrupt(_)), "{err}");
}

#[test]
fn cluster_count_detection_ignores_the_type_string() {
    init_logging();
    let mut builder = Fat16Builder::new().without_signature();
    builder.file("F.TXT", b"f").unwrap();
    let image = builder.build().unwrap();

    let by_signature = Volume::open(DiskImage::new(Cursor::new(image.clone())), Detection::Signature);
    assert!(matches!(by_signature, Err(FsError::UnsupportedFormat)));

    let mut volume =
        Volume::open(DiskImage::new(Cursor::new(image)), Detection::ClusterCount).unwrap();
    assert_eq!(volume.kind(), FsKind::Fat16);
    assert_eq!(volume.list_root(WalkOptions::default()).unwrap().len(), 1);
}

#[test]
fn file_chain_lists_every_cluster() {
    let mut builder = Fat16Builder::new();
    builder.file("A.TXT", b"x").unwrap();
    builder.file("DATA.BIN", &[7u8; 1300]).unwrap();
    let mut volume = diskwalk_core::Fat16Volume::open(DiskImage::new(Cursor::new(
        builder.build().unwrap(),
    )))
    .unwrap();
    assert_eq!(volume.chain(2).unwrap(), [2]);
    assert_eq!(volume.chain(3).unwrap(), [3, 4, 5]);
    assert!(volume.chain(0).unwrap().is_empty());
}
