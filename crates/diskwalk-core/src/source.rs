//! Random-access byte sources backing a filesystem image.

use crate::error::{FsError, Result};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

/// Read `buf.len()` bytes at `offset`, or fail.
///
/// A source never hands back fewer bytes than requested: running off the end
/// of the image is a [`FsError::ShortRead`].
pub trait ByteSource {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    fn read_vec(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read_at(offset, buf)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read_at(offset, buf)
    }
}

/// Any seekable reader: an image file, a block device, or an in-memory
/// `Cursor<Vec<u8>>`.
pub struct DiskImage<R> {
    inner: R,
}

impl DiskImage<File> {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        Ok(Self::new(file))
    }
}

impl<R: Read + Seek> DiskImage<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read + Seek> ByteSource for DiskImage<R> {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.inner
            .seek(SeekFrom::Start(offset))
            .map_err(|source| FsError::SeekFailure { offset, source })?;

        let mut got = 0;
        while got < buf.len() {
            match self.inner.read(&mut buf[got..]) {
                Ok(0) => break,
                Ok(n) => got += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(FsError::Io(e)),
            }
        }

        if got < buf.len() {
            return Err(FsError::ShortRead {
                offset,
                wanted: buf.len(),
                got,
            });
        }
        Ok(())
    }
}
