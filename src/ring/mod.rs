//! Software frame rings shared between clients and the page-flip handler.
//!
//! Both rings store whole *frame-groups*: one hardware tick worth of
//! interleaved quadlet data for every client of a direction. Each client
//! owns a cursor and sees only its [`FramePart`] of every frame-group.
//!
//! - [`FrameRingBuffer`]: receive side, one producer and N reader cursors.
//! - [`FrameSpscRing`]: transmit side, N writer cursors and one consumer.

mod rx;
mod tx;

pub use rx::FrameRingBuffer;
pub use tx::FrameSpscRing;

use alloc::vec::Vec;

use crate::error::{ConfigError, ConfigResult, DmaError, DmaResult, Error, IoResult};

/// A client's slice of the interleaved frame-group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FramePart {
    /// Bytes per frame-group belonging to the client
    pub byte_count: u32,
    /// Offset of the first byte within the frame-group
    pub byte_offset: u32,
}

impl FramePart {
    /// Create a frame part.
    #[must_use]
    pub const fn new(byte_count: u32, byte_offset: u32) -> Self {
        Self {
            byte_count,
            byte_offset,
        }
    }

    /// One past the last byte, or `None` on overflow.
    #[must_use]
    pub const fn end(&self) -> Option<u32> {
        self.byte_offset.checked_add(self.byte_count)
    }

    /// Check the part is non-empty and fits a frame of `frame_bytes`.
    pub fn validate(&self, frame_bytes: u32) -> ConfigResult<()> {
        match self.end() {
            Some(end) if self.byte_count > 0 && end <= frame_bytes => Ok(()),
            _ => Err(ConfigError::InvalidArgument),
        }
    }

    pub(crate) fn range(&self) -> (usize, usize) {
        (self.byte_offset as usize, self.byte_count as usize)
    }
}

/// How bytes move between ring storage and a client buffer.
pub trait CopyStrategy {
    /// Copy `src` into `dst`; both have the same length.
    fn copy(&mut self, dst: &mut [u8], src: &[u8]) -> IoResult<()>;
}

/// Plain memory copy.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemCopy;

impl CopyStrategy for MemCopy {
    #[inline]
    fn copy(&mut self, dst: &mut [u8], src: &[u8]) -> IoResult<()> {
        dst.copy_from_slice(src);
        Ok(())
    }
}

/// Ring operations the stream endpoint needs independent of direction.
pub trait FrameRing: Sized + Send {
    /// Allocate a ring with `cursors` client cursors, `capacity`
    /// frame-groups of `frame_bytes` each.
    fn allocate(cursors: usize, capacity: usize, frame_bytes: usize) -> DmaResult<Self>;

    /// Whether the client behind `cursor` can make progress without waiting.
    ///
    /// Unknown cursors report ready so that waiters re-check their state.
    fn is_ready(&self, cursor: usize) -> bool;

    /// Stop accounting for a cursor whose client left the stream.
    fn release_cursor(&mut self, cursor: usize);
}

/// Cursor position: frame-group sequence number plus bytes of the client's
/// slice already handled within it.
#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    frame: u64,
    offset: usize,
    active: bool,
}

/// Allocate zeroed storage without aborting on allocation failure.
fn zeroed_storage(capacity: usize, frame_bytes: usize) -> DmaResult<Vec<u8>> {
    if capacity == 0 || frame_bytes == 0 {
        return Err(DmaError::InvalidLength);
    }
    let len = capacity
        .checked_mul(frame_bytes)
        .ok_or(DmaError::OutOfMemory)?;
    let mut storage = Vec::new();
    storage
        .try_reserve_exact(len)
        .map_err(|_| DmaError::OutOfMemory)?;
    storage.resize(len, 0);
    Ok(storage)
}

fn fresh_cursors(count: usize) -> DmaResult<Vec<Cursor>> {
    let mut cursors = Vec::new();
    cursors
        .try_reserve_exact(count)
        .map_err(|_| DmaError::OutOfMemory)?;
    cursors.resize(
        count,
        Cursor {
            active: true,
            ..Cursor::default()
        },
    );
    Ok(cursors)
}

fn slot_of(frame: u64, capacity: usize) -> usize {
    (frame % capacity as u64) as usize
}

/// An error after partial progress still reports the bytes moved.
pub(crate) fn partial_or(moved: usize, err: impl Into<Error>) -> crate::Result<usize> {
    if moved > 0 { Ok(moved) } else { Err(err.into()) }
}
