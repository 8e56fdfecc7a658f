//! Transmit ring: N writer cursors, one consumer (the page-flip handler).

use alloc::vec::Vec;

use super::{
    CopyStrategy, Cursor, FramePart, FrameRing, fresh_cursors, partial_or, slot_of,
    zeroed_storage,
};
use crate::error::{ConfigError, DmaResult, IoError};

/// Fixed-capacity ring of frame-groups assembled from several writers.
///
/// Each writer fills its [`FramePart`] of successive groups. The consumer
/// always drains whole groups in order; slices a writer has not supplied
/// yet go out as silence and are counted as underruns.
#[derive(Debug)]
pub struct FrameSpscRing {
    storage: Vec<u8>,
    frame_bytes: usize,
    capacity: usize,
    /// Frame-groups drained so far
    tail: u64,
    cursors: Vec<Cursor>,
    underruns: u64,
}

impl FrameSpscRing {
    /// Copy as much of `src` as fits into `writer`'s slices.
    ///
    /// Returns the bytes accepted, 0 when the writer is a full ring ahead of
    /// the consumer. A writer the consumer has overtaken continues at the
    /// oldest undrained group, keeping its position within the slice.
    pub fn put(
        &mut self,
        writer: usize,
        part: FramePart,
        src: &[u8],
        copy: &mut impl CopyStrategy,
    ) -> crate::Result<usize> {
        let (offset, count) = part.range();
        if part.validate(self.frame_bytes as u32).is_err() {
            return Err(ConfigError::InvalidArgument.into());
        }
        let cursor = match self.cursors.get_mut(writer) {
            Some(cursor) if cursor.active => cursor,
            _ => return Err(IoError::NotConfigured.into()),
        };
        if cursor.frame < self.tail {
            cursor.frame = self.tail;
        }

        let limit = self.tail + self.capacity as u64;
        let mut accepted = 0;
        while accepted < src.len() && cursor.frame < limit {
            let n = (count - cursor.offset).min(src.len() - accepted);
            let start = slot_of(cursor.frame, self.capacity) * self.frame_bytes
                + offset
                + cursor.offset;
            if let Err(err) =
                copy.copy(&mut self.storage[start..start + n], &src[accepted..accepted + n])
            {
                return partial_or(accepted, err);
            }
            accepted += n;
            cursor.offset += n;
            if cursor.offset == count {
                cursor.offset = 0;
                cursor.frame += 1;
            }
        }

        Ok(accepted)
    }

    /// Drain whole frame-groups into `dst`, oldest first.
    ///
    /// Always fills `dst.len() / frame_bytes` groups; drained slots are
    /// zeroed so unwritten slices go out as silence next time around.
    /// Returns the bytes written.
    pub fn get(&mut self, dst: &mut [u8]) -> usize {
        let fb = self.frame_bytes;
        let mut written = 0;
        for chunk in dst.chunks_exact_mut(fb) {
            let start = slot_of(self.tail, self.capacity) * fb;
            let slot = &mut self.storage[start..start + fb];
            chunk.copy_from_slice(slot);
            slot.fill(0);

            let tail = self.tail;
            if self
                .cursors
                .iter()
                .any(|cursor| cursor.active && cursor.frame <= tail)
            {
                self.underruns += 1;
            }
            self.tail += 1;
            written += fb;
        }
        written
    }

    /// Frame-groups drained before every active writer had filled them.
    pub fn underruns(&self) -> u64 {
        self.underruns
    }

    /// Bytes of `part` that `writer` can place right now.
    pub fn room(&self, writer: usize, part: FramePart) -> crate::Result<usize> {
        if part.validate(self.frame_bytes as u32).is_err() {
            return Err(ConfigError::InvalidArgument.into());
        }
        let cursor = match self.cursors.get(writer) {
            Some(cursor) if cursor.active => cursor,
            _ => return Err(IoError::NotConfigured.into()),
        };
        let frame = cursor.frame.max(self.tail);
        let groups = (self.tail + self.capacity as u64 - frame) as usize;
        Ok((groups * part.byte_count as usize).saturating_sub(cursor.offset))
    }

    /// Whether `writer` can accept more bytes right now.
    pub fn has_space(&self, writer: usize) -> bool {
        self.cursors
            .get(writer)
            .is_some_and(|cursor| cursor.frame < self.tail + self.capacity as u64)
    }

    /// Capacity in frame-groups.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes per frame-group.
    pub fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }
}

impl FrameRing for FrameSpscRing {
    fn allocate(cursors: usize, capacity: usize, frame_bytes: usize) -> DmaResult<Self> {
        Ok(Self {
            storage: zeroed_storage(capacity, frame_bytes)?,
            frame_bytes,
            capacity,
            tail: 0,
            cursors: fresh_cursors(cursors)?,
            underruns: 0,
        })
    }

    fn is_ready(&self, cursor: usize) -> bool {
        match self.cursors.get(cursor) {
            Some(c) if c.active => self.has_space(cursor),
            _ => true,
        }
    }

    fn release_cursor(&mut self, cursor: usize) {
        if let Some(c) = self.cursors.get_mut(cursor) {
            c.active = false;
        }
    }
}
