use super::{mark_last, NodeRef, TreeEvent, WalkOptions};
use crate::error::{FsError, Result};
use crate::ext2::{direct_blocks, DirEntry, Ext2Volume, ROOT_INODE};
use crate::source::ByteSource;
use log::warn;
use std::collections::VecDeque;

const LOST_AND_FOUND: &[u8] = b"lost+found";

struct Frame {
    inode: u32,
    parent: u32,
    blocks: std::vec::IntoIter<u32>,
    pending: VecDeque<TreeEvent>,
    depth: usize,
}

/// Walks an EXT2 directory tree from inode 2.
///
/// `.` and `..` are recognised by inode number: a record pointing at the
/// directory being listed or at its parent is never yielded or entered.
pub struct Ext2Walk<'a, S> {
    volume: &'a mut Ext2Volume<S>,
    options: WalkOptions,
    stack: Vec<Frame>,
    started: bool,
    done: bool,
}

impl<'a, S: ByteSource> Ext2Walk<'a, S> {
    pub fn new(volume: &'a mut Ext2Volume<S>, options: WalkOptions) -> Self {
        Self {
            volume,
            options,
            stack: Vec::new(),
            started: false,
            done: false,
        }
    }

    fn open_root(&mut self) -> Result<()> {
        let root = self.volume.inode(ROOT_INODE)?;
        if !root.is_dir() {
            return Err(FsError::Corrupt(format!(
                "root inode has mode {:#o}, not a directory",
                root.mode
            )));
        }
        let blocks = direct_blocks(&root, self.volume.block_size());
        self.stack.push(Frame {
            inode: ROOT_INODE,
            parent: ROOT_INODE,
            blocks: blocks.into_iter(),
            pending: VecDeque::new(),
            depth: 0,
        });
        Ok(())
    }

    fn descend(&mut self, inode: u32, parent: u32, depth: usize) -> Result<()> {
        if !self.options.descends_below(depth) {
            warn!("not descending into inode {inode}: depth limit");
            return Ok(());
        }
        if self.stack.iter().any(|frame| frame.inode == inode) {
            warn!("directory inode {inode} is already on the walk path; not re-entered");
            return Ok(());
        }
        let dir = self.volume.inode(inode)?;
        if !dir.is_dir() {
            warn!("inode {inode} is listed as a directory but has mode {:#o}", dir.mode);
            return Ok(());
        }
        let blocks = direct_blocks(&dir, self.volume.block_size());
        self.stack.push(Frame {
            inode,
            parent,
            blocks: blocks.into_iter(),
            pending: VecDeque::new(),
            depth: depth + 1,
        });
        Ok(())
    }

    fn step(&mut self) -> Result<Option<TreeEvent>> {
        if !self.started {
            self.started = true;
            self.open_root()?;
        }

        loop {
            let Some(frame) = self.stack.last_mut() else {
                return Ok(None);
            };

            if let Some(event) = frame.pending.pop_front() {
                let (current, depth) = (frame.inode, frame.depth);
                if let (true, NodeRef::Ext2 { inode }) = (event.is_dir, event.node) {
                    self.descend(inode, current, depth)?;
                }
                return Ok(Some(event));
            }

            match frame.blocks.next() {
                Some(block) => {
                    let entries = self.volume.directory_block(block)?;
                    if let Some(frame) = self.stack.last_mut() {
                        frame.pending = visible(entries, frame, &self.options);
                    }
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// Entries of one block that will actually be yielded, with the final one
/// marked as the last sibling.
fn visible(entries: Vec<DirEntry>, frame: &Frame, options: &WalkOptions) -> VecDeque<TreeEvent> {
    let mut events: VecDeque<TreeEvent> = entries
        .into_iter()
        .filter(|e| e.inode != frame.inode && e.inode != frame.parent)
        .filter(|e| !(options.hide_lost_found && e.name == LOST_AND_FOUND))
        .map(|e| TreeEvent {
            name: e.name_lossy(),
            depth: frame.depth,
            is_last: false,
            is_dir: e.is_dir(),
            node: NodeRef::Ext2 { inode: e.inode },
            raw_name: e.name,
        })
        .collect();
    mark_last(&mut events);
    events
}

impl<S: ByteSource> Iterator for Ext2Walk<'_, S> {
    type Item = Result<TreeEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
