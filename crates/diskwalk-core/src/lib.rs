//! Read-only access to EXT2 and FAT16 disk images.
//!
//! Open an image with [`Volume::open`] (or [`Volume::open_path`]), then use
//! the [`Filesystem`] operations to walk its directory tree or pull a file's
//! contents out by name.

pub mod detect;
pub mod error;
pub mod ext2;
pub mod extract;
pub mod fat16;
pub mod source;
pub mod volume;
pub mod walk;

pub use detect::{detect, Detection, FsKind};
pub use error::{FsError, Result};
pub use ext2::Ext2Volume;
pub use fat16::Fat16Volume;
pub use source::{ByteSource, DiskImage};
pub use volume::{Events, Filesystem, Volume};
pub use walk::{render_tree, NodeRef, TreeEvent, TreeRenderer, WalkOptions};
