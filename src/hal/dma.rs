//! DMA-capable memory for the synchronous page pair.
//!
//! A [`DmaBuffer`] is one contiguous region split into two equal pages.
//! Hardware streams into (or out of) one page while software services the
//! other; which page hardware owns is read from the page status register
//! on every interrupt.

use alloc::sync::Arc;
use core::ptr::NonNull;

use crate::error::{DmaError, DmaResult};
use crate::internal::constants::{DMA_ALIGNMENT, DMA_PAGES};

/// One half of a DMA buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Page {
    /// First half
    A,
    /// Second half
    B,
}

impl Page {
    /// The opposite half.
    #[must_use]
    pub const fn other(self) -> Page {
        match self {
            Page::A => Page::B,
            Page::B => Page::A,
        }
    }

    /// Page letter for log messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Page::A => "A",
            Page::B => "B",
        }
    }

    const fn index(self) -> usize {
        match self {
            Page::A => 0,
            Page::B => 1,
        }
    }
}

/// Contiguous DMA region bound to the card.
///
/// Freed explicitly through the [`DmaAllocator`] that produced it; dropping
/// a buffer without freeing it leaks the region.
#[derive(Debug)]
pub struct DmaBuffer {
    bus_address: u64,
    cpu: NonNull<u8>,
    len: usize,
}

// SAFETY: the region is exclusively owned by the buffer; hardware access is
// coordinated through the page ownership protocol, not through Rust aliasing.
unsafe impl Send for DmaBuffer {}

impl DmaBuffer {
    /// Wrap a region produced by a platform allocator.
    ///
    /// # Safety
    ///
    /// `cpu` must point to `len` bytes that stay valid and unaliased by other
    /// Rust references until the buffer is handed back to its allocator, and
    /// `bus_address` must be the device-visible address of the same region.
    pub unsafe fn from_raw_parts(bus_address: u64, cpu: NonNull<u8>, len: usize) -> Self {
        Self {
            bus_address,
            cpu,
            len,
        }
    }

    /// Device-visible base address.
    pub fn bus_address(&self) -> u64 {
        self.bus_address
    }

    /// CPU-visible base pointer.
    pub fn as_ptr(&self) -> *mut u8 {
        self.cpu.as_ptr()
    }

    /// Total size in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the region is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Largest page the region can hold: half its size.
    pub fn page_len(&self) -> usize {
        self.len / DMA_PAGES
    }

    /// Software view of a page of `page_len` bytes (clamped to
    /// [`page_len`](Self::page_len)). Page B starts `page_len` bytes in.
    ///
    /// Only call for the page hardware does not currently own.
    pub fn page(&self, page: Page, page_len: usize) -> &[u8] {
        let len = page_len.min(self.page_len());
        // SAFETY: both pages lie within the region; hardware is not writing
        // this one per the page ownership protocol.
        unsafe { core::slice::from_raw_parts(self.cpu.as_ptr().add(page.index() * len), len) }
    }

    /// Mutable software view of a page, laid out as for [`page`](Self::page).
    ///
    /// Only call for the page hardware does not currently own.
    pub fn page_mut(&mut self, page: Page, page_len: usize) -> &mut [u8] {
        let len = page_len.min(self.page_len());
        // SAFETY: as for `page`, plus `&mut self` excludes other software views.
        unsafe {
            core::slice::from_raw_parts_mut(self.cpu.as_ptr().add(page.index() * len), len)
        }
    }

    /// Zero the whole region (both pages).
    pub fn zero(&mut self) {
        // SAFETY: the region is `len` bytes and exclusively owned.
        unsafe { core::ptr::write_bytes(self.cpu.as_ptr(), 0, self.len) };
    }
}

/// Allocator for DMA-capable memory bound to the PCI device.
pub trait DmaAllocator: Send + Sync {
    /// Allocate a zeroed region of `size` bytes.
    fn allocate(&self, size: usize) -> DmaResult<DmaBuffer>;

    /// Return a region obtained from [`allocate`](Self::allocate).
    fn free(&self, buffer: DmaBuffer);
}

impl<T: DmaAllocator + ?Sized> DmaAllocator for Arc<T> {
    fn allocate(&self, size: usize) -> DmaResult<DmaBuffer> {
        (**self).allocate(size)
    }

    fn free(&self, buffer: DmaBuffer) {
        (**self).free(buffer);
    }
}

/// Heap-backed allocator for hosts with an identity IOMMU mapping and tests.
///
/// Regions are page aligned and the bus address equals the CPU address.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapDmaAllocator;

impl HeapDmaAllocator {
    fn layout(size: usize) -> DmaResult<core::alloc::Layout> {
        if size == 0 {
            return Err(DmaError::InvalidLength);
        }
        core::alloc::Layout::from_size_align(size, DMA_ALIGNMENT)
            .map_err(|_| DmaError::OutOfMemory)
    }
}

impl DmaAllocator for HeapDmaAllocator {
    fn allocate(&self, size: usize) -> DmaResult<DmaBuffer> {
        let layout = Self::layout(size)?;
        // SAFETY: layout has non-zero size.
        let ptr = unsafe { alloc::alloc::alloc_zeroed(layout) };
        let cpu = NonNull::new(ptr).ok_or(DmaError::OutOfMemory)?;
        // SAFETY: freshly allocated, exclusively owned, identity mapped.
        Ok(unsafe { DmaBuffer::from_raw_parts(ptr as u64, cpu, size) })
    }

    fn free(&self, buffer: DmaBuffer) {
        if let Ok(layout) = Self::layout(buffer.len) {
            // SAFETY: the buffer came from `allocate` with this same layout.
            unsafe { alloc::alloc::dealloc(buffer.cpu.as_ptr(), layout) };
        }
    }
}
