//! Transceiver (OS8104-class) registers used by the synchronous core.
//!
//! Only the handful of registers the streaming path touches are listed.
//! Addresses are offsets into the chip window of the bridge.

/// Chip register window base
pub const CHIP_WINDOW: u16 = 0x0400;

/// Node position register (read-only, position in the ring)
pub const NPR: u16 = CHIP_WINDOW + 0x87;

/// Synchronous bandwidth control (quadlets reserved for sync data)
pub const SBC: u16 = CHIP_WINDOW + 0x96;

/// Chip status register
pub const CHIP_STATUS: u16 = CHIP_WINDOW + 0x80;

/// CHIP_STATUS: chip finished reset and accepts register access
pub const CHIP_STATUS_READY: u32 = 1 << 0;

/// Chip registers carry 8 significant bits
pub const CHIP_VALUE_MASK: u32 = 0xFF;
