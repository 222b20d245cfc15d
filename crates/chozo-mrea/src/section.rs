//! Section-table driven positioning.
//!
//! The size table is the only authority on section boundaries. Every read
//! starts by seeking to the section's start computed from the table, so a
//! parser that stops short of (or runs past) its section never shifts the
//! next one.

use chozo_common::{EntryReadStream, ReadStream, SeekOrigin};

use crate::block::BlockDecompressionStream;
use crate::{Error, Result};

/// A stream that can be positioned at a section start.
pub trait SectionStream: ReadStream {
    /// Seek to section `idx`; `base` is the logical offset of section 0.
    fn seek_section(&mut self, base: u64, idx: usize, sizes: &[u32]) -> Result<()>;
}

impl SectionStream for EntryReadStream {
    fn seek_section(&mut self, base: u64, idx: usize, sizes: &[u32]) -> Result<()> {
        let offset: u64 = sizes[..idx].iter().map(|&s| s as u64).sum();
        self.seek((base + offset) as i64, SeekOrigin::Begin)?;
        Ok(())
    }
}

impl<R: ReadStream + ?Sized> SectionStream for BlockDecompressionStream<'_, R> {
    fn seek_section(&mut self, _base: u64, idx: usize, sizes: &[u32]) -> Result<()> {
        self.seek_to_section(idx, sizes)
    }
}

/// Walks sections of one area in table order.
pub struct SectionCursor<'s> {
    stream: &'s mut dyn SectionStream,
    base: u64,
    sizes: Vec<u32>,
    next: usize,
}

impl<'s> SectionCursor<'s> {
    pub fn new(stream: &'s mut dyn SectionStream, base: u64, sizes: Vec<u32>) -> Self {
        Self {
            stream,
            base,
            sizes,
            next: 0,
        }
    }

    /// Position at section `idx` and return its size. Empty sections are
    /// not seeked to.
    pub fn open(&mut self, idx: u32) -> Result<u32> {
        let size = *self.sizes.get(idx as usize).ok_or(Error::SectionIndex {
            slot: "section",
            index: idx,
            count: self.sizes.len() as u32,
        })?;
        if size > 0 {
            self.stream.seek_section(self.base, idx as usize, &self.sizes)?;
        }
        self.next = idx as usize + 1;
        Ok(size)
    }

    /// Position at the section after the last one opened.
    pub fn next_section(&mut self) -> Result<u32> {
        self.open(self.next as u32)
    }

    /// Index the next [`next_section`](Self::next_section) call opens.
    pub fn next_index(&self) -> u32 {
        self.next as u32
    }

    pub fn stream(&mut self) -> &mut dyn SectionStream {
        &mut *self.stream
    }

    /// Bytes read since the start of section `idx`.
    pub fn consumed_in(&self, idx: u32) -> u64 {
        let start: u64 = self.sizes[..idx as usize].iter().map(|&s| s as u64).sum();
        self.stream.position() - (self.base + start)
    }
}
