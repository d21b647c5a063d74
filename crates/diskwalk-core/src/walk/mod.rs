//! Depth-first, pre-order traversal shared by both formats.
//!
//! A walk is a lazy iterator of [`TreeEvent`]s. Each directory's entries come
//! out in on-disk order, with a subdirectory's contents immediately after the
//! subdirectory itself. `is_last` is decided by looking ahead within the same
//! physical container (an EXT2 block, a FAT16 sector), so a directory split
//! across containers has one "last" entry per container.

mod ext2;
mod fat16;
pub mod render;

pub use ext2::Ext2Walk;
pub use fat16::Fat16Walk;
pub use render::{render_tree, TreeRenderer};

use std::collections::VecDeque;

/// Where an entry's data lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef {
    Ext2 { inode: u32 },
    Fat16 { start_cluster: u16, size: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEvent {
    /// Display name. FAT16 short names are lower-cased.
    pub name: String,
    /// Name as stored: EXT2 bytes verbatim, FAT16 as the trimmed `NAME.EXT`.
    pub raw_name: Vec<u8>,
    /// Children of the root are at depth 0.
    pub depth: usize,
    pub is_last: bool,
    pub is_dir: bool,
    pub node: NodeRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkOptions {
    /// Leave EXT2's `lost+found` (and everything under it) out of the walk.
    pub hide_lost_found: bool,
    /// Deepest level yielded; `Some(0)` lists only the root directory.
    pub max_depth: Option<usize>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            hide_lost_found: true,
            max_depth: None,
        }
    }
}

impl WalkOptions {
    /// Everything, including `lost+found`.
    pub fn all() -> Self {
        Self {
            hide_lost_found: false,
            max_depth: None,
        }
    }

    fn descends_below(&self, depth: usize) -> bool {
        self.max_depth.map_or(true, |max| depth < max)
    }
}

fn mark_last(events: &mut VecDeque<TreeEvent>) {
    if let Some(last) = events.back_mut() {
        last.is_last = true;
    }
}
