//! Random-access byte sources.

use std::cell::RefCell;
use std::io::{Read, Seek, SeekFrom};

use bytes::Bytes;
use memmap2::Mmap;

use crate::error::Result;

/// Seekable, bounded reads. The core never opens files itself.
pub trait ByteSource {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fills as much of `buf` as is available at `offset` and returns the
    /// count read. Reading at or past the end returns 0.
    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize>;
}

impl ByteSource for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize> {
        let Some(available) = self.get(offset..) else {
            return Ok(0);
        };
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        Ok(n)
    }
}

impl ByteSource for Vec<u8> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize> {
        self.as_slice().read_at(offset, buf)
    }
}

impl ByteSource for Bytes {
    fn len(&self) -> usize {
        self.as_ref().len()
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize> {
        self.as_ref().read_at(offset, buf)
    }
}

impl ByteSource for Mmap {
    fn len(&self) -> usize {
        self.as_ref().len()
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize> {
        self.as_ref().read_at(offset, buf)
    }
}

/// Adapts any `Read + Seek` (a `File`, a `Cursor`) to [`ByteSource`].
pub struct SeekSource<R> {
    inner: RefCell<R>,
    len: usize,
}

impl<R: Read + Seek> SeekSource<R> {
    pub fn new(mut inner: R) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))? as usize;
        Ok(Self {
            inner: RefCell::new(inner),
            len,
        })
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R: Read + Seek> ByteSource for SeekSource<R> {
    fn len(&self) -> usize {
        self.len
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize> {
        if offset >= self.len {
            return Ok(0);
        }
        let mut inner = self.inner.borrow_mut();
        inner.seek(SeekFrom::Start(offset as u64))?;
        let want = buf.len().min(self.len - offset);
        let mut filled = 0;
        while filled < want {
            match inner.read(&mut buf[filled..want])? {
                0 => break,
                n => filled += n,
            }
        }
        Ok(filled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_slice_read_past_end() {
        let data: &[u8] = b"abcdef";
        let mut buf = [0u8; 4];
        assert_eq!(data.read_at(4, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(data.read_at(10, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_seek_source() {
        let src = SeekSource::new(Cursor::new(b"hello world".to_vec())).unwrap();
        assert_eq!(src.len(), 11);
        let mut buf = [0u8; 5];
        assert_eq!(src.read_at(6, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"world");
    }
}
