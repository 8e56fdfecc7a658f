//! Testing utilities and mock implementations
//!
//! This module provides mock implementations for testing the streaming
//! core on the host without a card.
//!
//! Only available when running `cargo test`.

// Note: The #[cfg(test)] attribute is applied in lib.rs where this module is declared
#![allow(missing_docs)]
#![allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]

extern crate std;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::vec;
use std::vec::Vec;

use crate::error::{DmaError, DmaResult, IoError, IoResult};
use crate::hal::dma::{DmaAllocator, DmaBuffer, HeapDmaAllocator, Page};
use crate::hal::registers::{InterruptDispatch, InterruptHandler, RegisterAccess};
use crate::internal::constants::QUADLET_BYTES;
use crate::internal::register::chip::{CHIP_STATUS, CHIP_STATUS_READY};
use crate::internal::register::{CONTROL_START, PAGE_STATUS_PAGE_B, SyncRegs};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Mock Transceiver
// =============================================================================

#[derive(Debug, Default)]
struct TransceiverState {
    registers: HashMap<u16, u32>,
    write_log: Vec<(u16, u32)>,
    irq_mask: u32,
    irq_status: u32,
    ready_after_polls: u32,
    polls: u32,
    resets: usize,
    fail_reset: bool,
    fail_writes: bool,
    fail_allocations: usize,
    /// Live regions: bus address -> length
    live: HashMap<u64, usize>,
    allocations: usize,
}

impl TransceiverState {
    fn register(&self, addr: u16) -> u32 {
        self.registers.get(&addr).copied().unwrap_or(0)
    }

    fn store(&mut self, addr: u16, value: u32) {
        // Starting a stream restarts it on page A.
        if let Some(sync) = [SyncRegs::RX, SyncRegs::TX]
            .into_iter()
            .find(|sync| sync.control() == addr)
        {
            let was_started = self.register(addr) & CONTROL_START != 0;
            if !was_started && value & CONTROL_START != 0 {
                self.registers.insert(sync.page_status(), 0);
            }
        }
        self.registers.insert(addr, value);
    }

    /// Active page of a started stream, with its CPU address and length.
    fn active_page(&self, sync: SyncRegs) -> Option<(Page, *mut u8, usize)> {
        if self.register(sync.control()) & CONTROL_START == 0 {
            return None;
        }
        let page = if self.register(sync.page_status()) & PAGE_STATUS_PAGE_B != 0 {
            Page::B
        } else {
            Page::A
        };
        self.page_at(sync, page).map(|(ptr, len)| (page, ptr, len))
    }

    /// CPU address and length of `page`, checked against the live regions.
    fn page_at(&self, sync: SyncRegs, page: Page) -> Option<(*mut u8, usize)> {
        let base = u64::from(self.register(sync.dma_base_lo()))
            | (u64::from(self.register(sync.dma_base_hi())) << 32);
        let page_len = self.register(sync.quadlets()) as usize
            * QUADLET_BYTES
            * self.register(sync.page_frames()) as usize;
        let region = *self.live.get(&base)?;
        if page_len == 0 || page_len * 2 > region {
            return None;
        }
        let offset = match page {
            Page::A => 0,
            Page::B => page_len,
        };
        Some(((base as usize + offset) as *mut u8, page_len))
    }

    fn flip(&mut self, sync: SyncRegs) -> u32 {
        let status = self.register(sync.page_status()) ^ PAGE_STATUS_PAGE_B;
        self.registers.insert(sync.page_status(), status);
        self.irq_status |= sync.irq;
        sync.irq
    }
}

/// Mock card: bridge registers, transceiver chip and DMA memory.
///
/// Register values persist, writes are logged, and DMA regions come from
/// the heap with the bus address equal to the CPU address. The simulate
/// methods play the hardware side of the page flip.
///
/// # Example
///
/// ```ignore
/// let hw = MockTransceiver::new();
/// // ... configure a receive stream through the card ...
/// let bits = hw.simulate_rx_page(&[1, 2, 3, 4]);
/// card.handle_interrupt(bits);
/// ```
#[derive(Debug, Default)]
pub struct MockTransceiver {
    state: Mutex<TransceiverState>,
}

impl MockTransceiver {
    /// Create a mock with all registers zero and the chip ready
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a register value without logging a write
    pub fn set_register(&self, addr: u16, value: u32) {
        lock(&self.state).registers.insert(addr, value);
    }

    /// Current register value
    pub fn register(&self, addr: u16) -> u32 {
        lock(&self.state).register(addr)
    }

    /// Current interrupt enable mask
    pub fn interrupt_mask(&self) -> u32 {
        lock(&self.state).irq_mask
    }

    /// Logged register writes: (address, value)
    pub fn writes(&self) -> Vec<(u16, u32)> {
        lock(&self.state).write_log.clone()
    }

    /// Forget logged writes
    pub fn clear_writes(&self) {
        lock(&self.state).write_log.clear();
    }

    /// Report the chip not ready for the first `polls` status reads after
    /// each reset
    pub fn set_ready_after_polls(&self, polls: u32) {
        lock(&self.state).ready_after_polls = polls;
    }

    /// Number of reset pulses seen
    pub fn reset_count(&self) -> usize {
        lock(&self.state).resets
    }

    /// Reject reset pulses
    pub fn fail_reset(&self, fail: bool) {
        lock(&self.state).fail_reset = fail;
    }

    /// Reject register writes
    pub fn fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }

    /// Fail the next `count` DMA allocations
    pub fn fail_allocations(&self, count: usize) {
        lock(&self.state).fail_allocations = count;
    }

    /// DMA regions allocated and not yet freed
    pub fn live_allocations(&self) -> usize {
        lock(&self.state).live.len()
    }

    /// Successful DMA allocations so far
    pub fn allocation_count(&self) -> usize {
        lock(&self.state).allocations
    }

    /// Play one completed receive page: fill the page the card is writing
    /// with `data` (zero padded), flip pages and raise the interrupt.
    ///
    /// Returns the interrupt bits to hand to the card, 0 if the receive
    /// stream is not started.
    pub fn simulate_rx_page(&self, data: &[u8]) -> u32 {
        let mut state = lock(&self.state);
        let Some((_, ptr, len)) = state.active_page(SyncRegs::RX) else {
            return 0;
        };
        let n = data.len().min(len);
        // SAFETY: the page lies inside a live region (checked against the
        // allocation table while holding the lock `free` also takes).
        unsafe {
            core::ptr::copy_nonoverlapping(data.as_ptr(), ptr, n);
            core::ptr::write_bytes(ptr.add(n), 0, len - n);
        }
        state.flip(SyncRegs::RX)
    }

    /// Play one transmitted page: capture the page the card is sending,
    /// flip pages and raise the interrupt.
    ///
    /// Returns the page content and the interrupt bits, or an empty page
    /// and 0 if the transmit stream is not started.
    pub fn simulate_tx_page(&self) -> (Vec<u8>, u32) {
        let mut state = lock(&self.state);
        let Some((_, ptr, len)) = state.active_page(SyncRegs::TX) else {
            return (Vec::new(), 0);
        };
        let mut content = vec![0u8; len];
        // SAFETY: as in `simulate_rx_page`.
        unsafe { core::ptr::copy_nonoverlapping(ptr, content.as_mut_ptr(), len) };
        let bits = state.flip(SyncRegs::TX);
        (content, bits)
    }

    /// Current content of one DMA page of a stream, empty if none
    pub fn read_dma_page(&self, sync: SyncRegs, page: Page) -> Vec<u8> {
        let state = lock(&self.state);
        let Some((ptr, len)) = state.page_at(sync, page) else {
            return Vec::new();
        };
        let mut content = vec![0u8; len];
        // SAFETY: as in `simulate_rx_page`.
        unsafe { core::ptr::copy_nonoverlapping(ptr, content.as_mut_ptr(), len) };
        content
    }
}

impl RegisterAccess for MockTransceiver {
    fn read_register(&self, addr: u16) -> IoResult<u32> {
        let mut state = lock(&self.state);
        if addr == CHIP_STATUS {
            if state.polls < state.ready_after_polls {
                state.polls += 1;
                return Ok(0);
            }
            return Ok(CHIP_STATUS_READY);
        }
        Ok(state.register(addr))
    }

    fn write_register(&self, addr: u16, value: u32) -> IoResult<()> {
        let mut state = lock(&self.state);
        if state.fail_writes {
            return Err(IoError::RegisterAccess);
        }
        state.write_log.push((addr, value));
        state.store(addr, value);
        Ok(())
    }

    fn set_interrupt_mask(&self, bits: u32, mask: u32) -> u32 {
        let mut state = lock(&self.state);
        let previous = state.irq_mask;
        state.irq_mask = (previous & !mask) | (bits & mask);
        previous
    }

    fn clear_interrupt_status(&self, bits: u32) {
        lock(&self.state).irq_status &= !bits;
    }

    fn interrupt_status(&self) -> u32 {
        lock(&self.state).irq_status
    }

    fn reset_chip(&self) -> IoResult<()> {
        let mut state = lock(&self.state);
        if state.fail_reset {
            return Err(IoError::RegisterAccess);
        }
        state.resets += 1;
        state.polls = 0;
        Ok(())
    }
}

impl DmaAllocator for MockTransceiver {
    fn allocate(&self, size: usize) -> DmaResult<DmaBuffer> {
        let mut state = lock(&self.state);
        if state.fail_allocations > 0 {
            state.fail_allocations -= 1;
            return Err(DmaError::OutOfMemory);
        }
        let buffer = HeapDmaAllocator.allocate(size)?;
        state.live.insert(buffer.bus_address(), buffer.len());
        state.allocations += 1;
        Ok(buffer)
    }

    fn free(&self, buffer: DmaBuffer) {
        let mut state = lock(&self.state);
        state.live.remove(&buffer.bus_address());
        HeapDmaAllocator.free(buffer);
    }
}

// =============================================================================
// Mock Dispatch
// =============================================================================

#[derive(Default)]
struct DispatchState {
    handlers: Vec<(u32, InterruptHandler)>,
    keep_on_release: bool,
}

/// Mock interrupt vector: stores handlers and fires them on demand.
#[derive(Default)]
pub struct MockDispatch {
    state: Mutex<DispatchState>,
}

impl MockDispatch {
    /// Create a dispatch with no handlers
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke every handler whose mask overlaps `bits`
    pub fn fire(&self, bits: u32) {
        let state = lock(&self.state);
        for (mask, handler) in &state.handlers {
            if mask & bits != 0 {
                handler(bits & mask);
            }
        }
    }

    /// Registered handlers
    pub fn handler_count(&self) -> usize {
        lock(&self.state).handlers.len()
    }

    /// Ignore `release`, so handlers outlive their card
    pub fn keep_on_release(&self, keep: bool) {
        lock(&self.state).keep_on_release = keep;
    }
}

impl InterruptDispatch for MockDispatch {
    fn on_interrupt(&self, mask: u32, handler: InterruptHandler) -> IoResult<()> {
        lock(&self.state).handlers.push((mask, handler));
        Ok(())
    }

    fn release(&self, mask: u32) {
        let mut state = lock(&self.state);
        if !state.keep_on_release {
            state.handlers.retain(|(m, _)| *m != mask);
        }
    }
}

// =============================================================================
// Mock Delay
// =============================================================================

/// Mock delay that records total requested time without sleeping
#[derive(Debug, Default)]
pub struct MockDelay {
    total_ns: u64,
}

impl MockDelay {
    /// Create a new mock delay
    pub fn new() -> Self {
        Self::default()
    }

    /// Get total nanoseconds delayed
    pub fn total_ns(&self) -> u64 {
        self.total_ns
    }

    /// Get total milliseconds delayed
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }

    /// Reset the delay counter
    pub fn reset(&mut self) {
        self.total_ns = 0;
    }
}

impl embedded_hal::delay::DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::delay::DelayNs;
    use std::boxed::Box;

    #[test]
    fn mock_delay_accumulates() {
        let mut delay = MockDelay::new();
        delay.delay_us(100);
        delay.delay_ms(1);
        assert_eq!(delay.total_ns(), 1_100_000);
        assert_eq!(delay.total_ms(), 1);

        delay.reset();
        assert_eq!(delay.total_ns(), 0);
    }

    #[test]
    fn rx_page_needs_a_started_stream() {
        let hw = MockTransceiver::new();
        assert_eq!(hw.simulate_rx_page(&[1, 2, 3, 4]), 0);
        assert_eq!(hw.interrupt_status(), 0);
    }

    #[test]
    fn dispatch_fires_overlapping_handlers() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicU32, Ordering};

        let dispatch = MockDispatch::new();
        let seen = Arc::new(AtomicU32::new(0));
        let sink = seen.clone();
        dispatch
            .on_interrupt(0b10, Box::new(move |bits| sink.store(bits, Ordering::SeqCst)))
            .unwrap();

        dispatch.fire(0b01);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        dispatch.fire(0b11);
        assert_eq!(seen.load(Ordering::SeqCst), 0b10);

        dispatch.release(0b10);
        assert_eq!(dispatch.handler_count(), 0);
    }
}
