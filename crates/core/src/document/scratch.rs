//! Block-structured scratch store for raw document bytes.
//!
//! An append-only run of fixed-size blocks. Releasing leading blocks nulls
//! them in place, so block `i` always holds bytes
//! `start + i * block_size ..` and resident data stays contiguous from the
//! first retained block to the end.

use bytes::Bytes;

use crate::error::{PdfError, Result};

#[derive(Debug)]
pub struct ScratchStore {
    block_size: usize,
    blocks: Vec<Option<Box<[u8]>>>,
    /// Byte position of block 0.
    start: usize,
    /// Number of leading blocks released.
    released: usize,
    /// One past the last written byte.
    end: usize,
    limit: Option<usize>,
}

impl ScratchStore {
    pub fn new(block_size: usize) -> Self {
        Self::starting_at(0, block_size)
    }

    /// A store whose first byte sits at position `start`.
    pub fn starting_at(start: usize, block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1),
            blocks: Vec::new(),
            start,
            released: 0,
            end: start,
            limit: None,
        }
    }

    /// Caps the number of resident bytes.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    /// First retained byte position.
    pub const fn retained_start(&self) -> usize {
        self.start + self.released * self.block_size
    }

    pub const fn end(&self) -> usize {
        self.end
    }

    /// Resident byte count.
    pub const fn retained_len(&self) -> usize {
        self.end.saturating_sub(self.retained_start())
    }

    const fn block_index(&self, pos: usize) -> usize {
        (pos - self.start) / self.block_size
    }

    fn out_of_range(&self, pos: usize) -> PdfError {
        PdfError::ScratchOutOfRange {
            pos,
            start: self.retained_start(),
            end: self.end,
        }
    }

    fn exhausted(&self) -> PdfError {
        PdfError::ScratchExhausted {
            retained: self.retained_len(),
        }
    }

    fn allocate_block(&mut self) -> Result<()> {
        self.blocks
            .try_reserve(1)
            .map_err(|_| self.exhausted())?;
        let mut block = Vec::new();
        block
            .try_reserve_exact(self.block_size)
            .map_err(|_| self.exhausted())?;
        block.resize(self.block_size, 0);
        self.blocks.push(Some(block.into_boxed_slice()));
        Ok(())
    }

    /// Appends bytes at the end.
    pub fn append(&mut self, mut data: &[u8]) -> Result<()> {
        if let Some(limit) = self.limit
            && self.retained_len() + data.len() > limit
        {
            return Err(self.exhausted());
        }
        while !data.is_empty() {
            let index = self.block_index(self.end);
            if index == self.blocks.len() {
                self.allocate_block()?;
            }
            let within = (self.end - self.start) % self.block_size;
            let take = data.len().min(self.block_size - within);
            if let Some(Some(block)) = self.blocks.get_mut(index) {
                block[within..within + take].copy_from_slice(&data[..take]);
            }
            self.end += take;
            data = &data[take..];
        }
        Ok(())
    }

    fn check_range(&self, pos: usize, len: usize) -> Result<()> {
        if pos < self.retained_start() || pos.saturating_add(len) > self.end {
            return Err(self.out_of_range(pos));
        }
        Ok(())
    }

    /// Copies `buf.len()` bytes starting at `pos`.
    pub fn read_at(&self, mut pos: usize, buf: &mut [u8]) -> Result<()> {
        self.check_range(pos, buf.len())?;
        let mut filled = 0;
        while filled < buf.len() {
            let index = self.block_index(pos);
            let within = (pos - self.start) % self.block_size;
            let take = (buf.len() - filled).min(self.block_size - within);
            let block = self.blocks[index]
                .as_ref()
                .ok_or_else(|| self.out_of_range(pos))?;
            buf[filled..filled + take].copy_from_slice(&block[within..within + take]);
            filled += take;
            pos += take;
        }
        Ok(())
    }

    /// Overwrites already-written bytes.
    pub fn write_at(&mut self, mut pos: usize, mut data: &[u8]) -> Result<()> {
        self.check_range(pos, data.len())?;
        while !data.is_empty() {
            let index = self.block_index(pos);
            let within = (pos - self.start) % self.block_size;
            let take = data.len().min(self.block_size - within);
            let Some(block) = self.blocks[index].as_mut() else {
                return Err(PdfError::ScratchOutOfRange {
                    pos,
                    start: self.start + self.released * self.block_size,
                    end: self.end,
                });
            };
            block[within..within + take].copy_from_slice(&data[..take]);
            data = &data[take..];
            pos += take;
        }
        Ok(())
    }

    /// Frees every block that lies entirely before `pos`. Blocks are nulled,
    /// never removed, so indexes stay stable.
    pub fn release_before(&mut self, pos: usize) {
        let limit = pos.min(self.end).saturating_sub(self.start) / self.block_size;
        for block in self.blocks.iter_mut().take(limit).skip(self.released) {
            *block = None;
        }
        self.released = self.released.max(limit.min(self.blocks.len()));
    }

    /// Copies `pos..pos+len` into one contiguous buffer.
    pub fn to_bytes(&self, pos: usize, len: usize) -> Result<Bytes> {
        let mut out = Vec::new();
        out.try_reserve_exact(len).map_err(|_| self.exhausted())?;
        out.resize(len, 0);
        self.read_at(pos, &mut out)?;
        Ok(Bytes::from(out))
    }

    /// Moves the retained bytes into one buffer, freeing each block once
    /// it has been copied. Resident memory stays at about one copy of the
    /// data plus a block.
    pub fn into_bytes(mut self) -> Result<Bytes> {
        let len = self.retained_len();
        let mut out = Vec::new();
        out.try_reserve_exact(len).map_err(|_| self.exhausted())?;
        let mut remaining = len;
        for block in self.blocks.drain(..).flatten() {
            let take = remaining.min(block.len());
            out.extend_from_slice(&block[..take]);
            remaining -= take;
        }
        Ok(Bytes::from(out))
    }
}
