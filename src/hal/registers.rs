//! Register access and interrupt dispatch capabilities.
//!
//! The streaming core never touches memory-mapped I/O itself. The platform
//! glue (PCI probe, BAR mapping, interrupt vectors) implements these traits
//! and hands them to [`SyncDriver::probe`](crate::SyncDriver::probe).

use alloc::boxed::Box;
use alloc::sync::Arc;

use crate::error::IoResult;

/// Register-level access to the bridge and the transceiver chip.
///
/// All methods take `&self`: the page-flip handler and client threads call
/// them concurrently, so implementations serialize internally.
pub trait RegisterAccess: Send + Sync {
    /// Read a register.
    fn read_register(&self, addr: u16) -> IoResult<u32>;

    /// Write a register.
    fn write_register(&self, addr: u16, value: u32) -> IoResult<()>;

    /// Replace the bits selected by `mask` with those of `value`.
    fn change_register(&self, addr: u16, value: u32, mask: u32) -> IoResult<()> {
        let current = self.read_register(addr)?;
        self.write_register(addr, (current & !mask) | (value & mask))
    }

    /// Read consecutive 8-bit chip registers starting at `addr`.
    fn read_block(&self, addr: u16, buf: &mut [u8]) -> IoResult<()> {
        for (offset, byte) in buf.iter_mut().enumerate() {
            *byte = self.read_register(addr.wrapping_add(offset as u16))? as u8;
        }
        Ok(())
    }

    /// Write consecutive 8-bit chip registers starting at `addr`.
    fn write_block(&self, addr: u16, data: &[u8]) -> IoResult<()> {
        for (offset, byte) in data.iter().enumerate() {
            self.write_register(addr.wrapping_add(offset as u16), u32::from(*byte))?;
        }
        Ok(())
    }

    /// Update the interrupt enable mask: bits selected by `mask` take the
    /// value from `bits`. Returns the previous mask.
    fn set_interrupt_mask(&self, bits: u32, mask: u32) -> u32;

    /// Acknowledge (write-1-to-clear) pending interrupt sources.
    fn clear_interrupt_status(&self, bits: u32);

    /// Pending interrupt sources.
    fn interrupt_status(&self) -> u32;

    /// Pulse the transceiver reset line.
    fn reset_chip(&self) -> IoResult<()>;
}

impl<T: RegisterAccess + ?Sized> RegisterAccess for Arc<T> {
    fn read_register(&self, addr: u16) -> IoResult<u32> {
        (**self).read_register(addr)
    }

    fn write_register(&self, addr: u16, value: u32) -> IoResult<()> {
        (**self).write_register(addr, value)
    }

    fn change_register(&self, addr: u16, value: u32, mask: u32) -> IoResult<()> {
        (**self).change_register(addr, value, mask)
    }

    fn read_block(&self, addr: u16, buf: &mut [u8]) -> IoResult<()> {
        (**self).read_block(addr, buf)
    }

    fn write_block(&self, addr: u16, data: &[u8]) -> IoResult<()> {
        (**self).write_block(addr, data)
    }

    fn set_interrupt_mask(&self, bits: u32, mask: u32) -> u32 {
        (**self).set_interrupt_mask(bits, mask)
    }

    fn clear_interrupt_status(&self, bits: u32) {
        (**self).clear_interrupt_status(bits);
    }

    fn interrupt_status(&self) -> u32 {
        (**self).interrupt_status()
    }

    fn reset_chip(&self) -> IoResult<()> {
        (**self).reset_chip()
    }
}

/// Callback invoked with the triggered interrupt-source bits.
pub type InterruptHandler = Box<dyn Fn(u32) + Send + Sync>;

/// Interrupt vector plumbing provided by the platform.
pub trait InterruptDispatch {
    /// Register `handler` for the sources in `mask`.
    fn on_interrupt(&self, mask: u32, handler: InterruptHandler) -> IoResult<()>;

    /// Drop the handler registered for `mask`, if any.
    fn release(&self, mask: u32) {
        let _ = mask;
    }
}

impl<T: InterruptDispatch + ?Sized> InterruptDispatch for Arc<T> {
    fn on_interrupt(&self, mask: u32, handler: InterruptHandler) -> IoResult<()> {
        (**self).on_interrupt(mask, handler)
    }

    fn release(&self, mask: u32) {
        (**self).release(mask);
    }
}
