//! Receive ring: one producer (the page-flip handler), N reader cursors.

use alloc::vec::Vec;

use super::{
    CopyStrategy, Cursor, FramePart, FrameRing, MemCopy, fresh_cursors, partial_or, slot_of,
    zeroed_storage,
};
use crate::error::{ConfigError, DmaResult, IoError, Overrun};

/// Fixed-capacity ring of frame-groups read by several clients at once.
///
/// The producer appends whole frame-groups. Every reader keeps its own
/// cursor and extracts only its [`FramePart`] of each group; a group's
/// storage is reused only after every active reader has consumed it.
#[derive(Debug)]
pub struct FrameRingBuffer {
    storage: Vec<u8>,
    frame_bytes: usize,
    capacity: usize,
    /// Frame-groups produced so far
    head: u64,
    cursors: Vec<Cursor>,
}

impl FrameRingBuffer {
    /// Append the whole frame-groups contained in `src`.
    ///
    /// Returns the bytes accepted. When the slowest active reader leaves too
    /// little room the newest groups are dropped and reported as an
    /// [`Overrun`]; the accepted prefix remains readable.
    pub fn put(&mut self, src: &[u8]) -> Result<usize, Overrun> {
        let fb = self.frame_bytes;
        let groups = src.len() / fb;
        let accept = groups.min(self.free_groups());

        for chunk in src.chunks_exact(fb).take(accept) {
            let start = slot_of(self.head, self.capacity) * fb;
            self.storage[start..start + fb].copy_from_slice(chunk);
            self.head += 1;
        }

        if accept < groups {
            Err(Overrun {
                accepted: accept * fb,
                dropped: (groups - accept) * fb,
            })
        } else {
            Ok(accept * fb)
        }
    }

    /// Copy up to `dst.len()` bytes of `part` for `reader` into `dst`.
    ///
    /// Returns the bytes copied, 0 when nothing is pending. A reader may stop
    /// mid-slice; the next call resumes at the same byte.
    pub fn get(
        &mut self,
        reader: usize,
        part: FramePart,
        dst: &mut [u8],
        copy: &mut impl CopyStrategy,
    ) -> crate::Result<usize> {
        let at = self.cursor(reader, part)?;
        let (copied, next, fault) = self.copy_out(at, part, dst, copy);
        if let Some(cursor) = self.cursors.get_mut(reader) {
            *cursor = next;
        }
        match fault {
            Some(err) => partial_or(copied, err),
            None => Ok(copied),
        }
    }

    /// Copy pending bytes of `part` for `reader` into `dst` without
    /// consuming them.
    ///
    /// The peeked groups stay reserved for `reader` until it calls
    /// [`consume`](Self::consume), so the producer cannot overwrite them.
    pub fn peek(&self, reader: usize, part: FramePart, dst: &mut [u8]) -> crate::Result<usize> {
        let at = self.cursor(reader, part)?;
        let (copied, _, _) = self.copy_out(at, part, dst, &mut MemCopy);
        Ok(copied)
    }

    /// Advance `reader` by `n` bytes of its slice, never past the newest
    /// frame-group.
    pub fn consume(&mut self, reader: usize, part: FramePart, n: usize) -> crate::Result<()> {
        let at = self.cursor(reader, part)?;
        let count = part.byte_count as usize;
        let bytes = at.offset + n;
        let mut frame = at.frame + (bytes / count) as u64;
        let mut offset = bytes % count;
        if frame >= self.head {
            frame = self.head;
            offset = 0;
        }
        if let Some(cursor) = self.cursors.get_mut(reader) {
            cursor.frame = frame;
            cursor.offset = offset;
        }
        Ok(())
    }

    /// Whether `reader` has nothing pending.
    pub fn is_empty(&self, reader: usize) -> bool {
        self.cursors
            .get(reader)
            .is_none_or(|cursor| cursor.frame >= self.head)
    }

    /// Frame-groups pending for `reader`.
    pub fn pending_groups(&self, reader: usize) -> usize {
        self.cursors
            .get(reader)
            .map_or(0, |cursor| (self.head - cursor.frame) as usize)
    }

    /// Capacity in frame-groups.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes per frame-group.
    pub fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    fn cursor(&self, reader: usize, part: FramePart) -> crate::Result<Cursor> {
        if part.validate(self.frame_bytes as u32).is_err() {
            return Err(ConfigError::InvalidArgument.into());
        }
        match self.cursors.get(reader) {
            Some(cursor) if cursor.active => Ok(*cursor),
            _ => Err(IoError::NotConfigured.into()),
        }
    }

    /// Walk `part` from `at` into `dst`. Returns the bytes copied, the
    /// position reached and the copy fault that stopped the walk, if any.
    fn copy_out(
        &self,
        mut at: Cursor,
        part: FramePart,
        dst: &mut [u8],
        copy: &mut impl CopyStrategy,
    ) -> (usize, Cursor, Option<IoError>) {
        let (offset, count) = part.range();
        let mut copied = 0;
        while copied < dst.len() && at.frame < self.head {
            let n = (count - at.offset).min(dst.len() - copied);
            let start =
                slot_of(at.frame, self.capacity) * self.frame_bytes + offset + at.offset;
            if let Err(err) = copy.copy(&mut dst[copied..copied + n], &self.storage[start..start + n])
            {
                return (copied, at, Some(err));
            }
            copied += n;
            at.offset += n;
            if at.offset == count {
                at.offset = 0;
                at.frame += 1;
            }
        }
        (copied, at, None)
    }

    fn free_groups(&self) -> usize {
        let slowest = self
            .cursors
            .iter()
            .filter(|cursor| cursor.active)
            .map(|cursor| cursor.frame)
            .min()
            .unwrap_or(self.head);
        self.capacity - (self.head - slowest) as usize
    }
}

impl FrameRing for FrameRingBuffer {
    fn allocate(cursors: usize, capacity: usize, frame_bytes: usize) -> DmaResult<Self> {
        Ok(Self {
            storage: zeroed_storage(capacity, frame_bytes)?,
            frame_bytes,
            capacity,
            head: 0,
            cursors: fresh_cursors(cursors)?,
        })
    }

    fn is_ready(&self, cursor: usize) -> bool {
        match self.cursors.get(cursor) {
            Some(c) if c.active => c.frame < self.head,
            _ => true,
        }
    }

    fn release_cursor(&mut self, cursor: usize) {
        if let Some(c) = self.cursors.get_mut(cursor) {
            c.active = false;
        }
    }
}
