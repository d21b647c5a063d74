use super::{mark_last, NodeRef, TreeEvent, WalkOptions};
use crate::error::Result;
use crate::fat16::{
    first_sector_of_cluster, read_directory_records, records_per_sector, root_directory_region,
    ClusterChain, Fat16Volume,
};
use crate::source::ByteSource;
use diskwalk_fs::fat16::{BootSector, DirEntry, FIRST_DATA_CLUSTER};
use log::{debug, warn};
use std::collections::VecDeque;

/// Where the next sector of a directory comes from.
enum Span {
    /// The fixed root region, bounded by its record count.
    Root { next_sector: u64, remaining: usize },
    /// A cluster-chained subdirectory.
    Chain {
        chain: ClusterChain,
        current: Option<u16>,
        offset: u8,
    },
}

impl Span {
    /// Next sector to scan and how many records of it belong to the directory.
    fn next_sector<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        boot: &BootSector,
    ) -> Result<Option<(u64, usize)>> {
        let per_sector = records_per_sector(boot);
        match self {
            Span::Root {
                next_sector,
                remaining,
            } => {
                if *remaining == 0 {
                    return Ok(None);
                }
                let records = per_sector.min(*remaining);
                *remaining -= records;
                let sector = *next_sector;
                *next_sector += 1;
                Ok(Some((sector, records)))
            }
            Span::Chain {
                chain,
                current,
                offset,
            } => {
                if current.is_none() || *offset == boot.sectors_per_cluster {
                    *current = chain.advance(source, boot)?;
                    *offset = 0;
                }
                let Some(cluster) = *current else {
                    return Ok(None);
                };
                let sector = first_sector_of_cluster(cluster, boot) + u64::from(*offset);
                *offset += 1;
                Ok(Some((sector, per_sector)))
            }
        }
    }
}

struct Frame {
    span: Span,
    /// Start cluster of this directory; 0 for the root region.
    cluster: u16,
    pending: VecDeque<TreeEvent>,
    depth: usize,
    ended: bool,
}

/// Walks a FAT16 directory tree starting from the fixed root region.
pub struct Fat16Walk<'a, S> {
    volume: &'a mut Fat16Volume<S>,
    options: WalkOptions,
    stack: Vec<Frame>,
    done: bool,
}

impl<'a, S: ByteSource> Fat16Walk<'a, S> {
    pub fn new(volume: &'a mut Fat16Volume<S>, options: WalkOptions) -> Self {
        let boot = volume.boot_sector();
        let (start, records) = root_directory_region(boot);
        let root = Frame {
            span: Span::Root {
                next_sector: start / u64::from(boot.bytes_per_sector),
                remaining: records as usize,
            },
            cluster: 0,
            pending: VecDeque::new(),
            depth: 0,
            ended: false,
        };
        Self {
            volume,
            options,
            stack: vec![root],
            done: false,
        }
    }

    fn descend(&mut self, start_cluster: u16, depth: usize) {
        if start_cluster < FIRST_DATA_CLUSTER {
            debug!("directory with start cluster {start_cluster} has no clusters");
            return;
        }
        if !self.options.descends_below(depth) {
            warn!("not descending into cluster {start_cluster}: depth limit");
            return;
        }
        if self.stack.iter().any(|frame| frame.cluster == start_cluster) {
            warn!("directory at cluster {start_cluster} is already on the walk path; not re-entered");
            return;
        }
        let chain = ClusterChain::new(start_cluster, self.volume.boot_sector());
        self.stack.push(Frame {
            span: Span::Chain {
                chain,
                current: None,
                offset: 0,
            },
            cluster: start_cluster,
            pending: VecDeque::new(),
            depth: depth + 1,
            ended: false,
        });
    }

    fn step(&mut self) -> Result<Option<TreeEvent>> {
        loop {
            let Some(frame) = self.stack.last_mut() else {
                return Ok(None);
            };

            if let Some(event) = frame.pending.pop_front() {
                let depth = frame.depth;
                if let (true, NodeRef::Fat16 { start_cluster, .. }) = (event.is_dir, event.node) {
                    self.descend(start_cluster, depth);
                }
                return Ok(Some(event));
            }

            if frame.ended {
                self.stack.pop();
                continue;
            }

            let (source, boot) = self.volume.parts();
            match frame.span.next_sector(source, boot)? {
                Some((sector, records)) => {
                    let scan = read_directory_records(source, sector, boot, records)?;
                    frame.ended = scan.ended;
                    frame.pending = visible(scan.entries, frame.depth);
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

fn visible(entries: Vec<DirEntry>, depth: usize) -> VecDeque<TreeEvent> {
    let mut events: VecDeque<TreeEvent> = entries
        .into_iter()
        .map(|e| {
            let raw_name = e.short_name().as_bytes().to_vec();
            TreeEvent {
                name: String::from_utf8_lossy(&raw_name).to_ascii_lowercase(),
                raw_name,
                depth,
                is_last: false,
                is_dir: e.is_dir(),
                node: NodeRef::Fat16 {
                    start_cluster: e.first_cluster,
                    size: e.file_size,
                },
            }
        })
        .collect();
    mark_last(&mut events);
    events
}

impl<S: ByteSource> Iterator for Fat16Walk<'_, S> {
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
