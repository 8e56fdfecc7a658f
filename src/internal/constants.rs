//! Centralized Constants
//!
//! This module provides a single source of truth for all magic numbers and
//! configuration constants used throughout the synchronous streaming core.
//!
//! # Organization
//!
//! Constants are grouped by category:
//! - **Frame geometry**: MOST frame and quadlet dimensions
//! - **Buffer depths**: Default software and hardware buffer sizes
//! - **Limits**: Card and client counts
//! - **Timing**: Reset timeouts and polling intervals
//!
//! # Note
//!
//! Register addresses and bit definitions remain in `internal::register`
//! as they are specific to the bridge and transceiver register blocks.

// =============================================================================
// Frame Geometry
// =============================================================================

/// Bytes per quadlet, the hardware transfer unit
pub const QUADLET_BYTES: usize = 4;

/// Bytes of synchronous payload available in one MOST frame
pub const MAX_SYNC_FRAME_BYTES: u32 = 60;

/// MOST frame rate in frames per second
pub const FRAME_RATE_HZ: usize = 44_100;

/// Number of halves ("pages") a DMA buffer is split into
pub const DMA_PAGES: usize = 2;

// =============================================================================
// Buffer Depths
// =============================================================================

/// Default receive software ring depth in frame-groups (about one second)
pub const DEFAULT_SW_RX_DEPTH: usize = FRAME_RATE_HZ;

/// Default transmit software ring depth in frame-groups (about one second)
pub const DEFAULT_SW_TX_DEPTH: usize = FRAME_RATE_HZ;

/// Default receive frame-groups per DMA half (about one millisecond)
pub const DEFAULT_HW_RX_FRAMES: usize = FRAME_RATE_HZ / 1000;

/// Default transmit frame-groups per DMA half (about one millisecond)
pub const DEFAULT_HW_TX_FRAMES: usize = FRAME_RATE_HZ / 1000;

/// Bytes moved between a software ring and a client buffer per entry into
/// the stream state's critical section
pub const TRANSFER_CHUNK_BYTES: usize = 1024;

/// Alignment of host DMA allocations
pub const DMA_ALIGNMENT: usize = 4096;

// =============================================================================
// Limits
// =============================================================================

/// Maximum number of cards a driver instance manages
pub const MAX_CARDS: usize = 4;

/// Default limit of simultaneously open clients per card
pub const DEFAULT_MAX_CLIENTS: usize = 16;

// =============================================================================
// Timing Constants
// =============================================================================

/// Default chip reset timeout in milliseconds
pub const RESET_TIMEOUT_MS: u32 = 100;

/// Chip reset poll interval in microseconds
pub const RESET_POLL_INTERVAL_US: u32 = 100;

// =============================================================================
// Compile-time Validation
// =============================================================================

const _: () = assert!(MAX_SYNC_FRAME_BYTES as usize % QUADLET_BYTES == 0);
const _: () = assert!(DEFAULT_HW_RX_FRAMES > 0 && DEFAULT_HW_TX_FRAMES > 0);
const _: () = assert!(DEFAULT_SW_RX_DEPTH >= DEFAULT_HW_RX_FRAMES);
const _: () = assert!(DMA_ALIGNMENT.is_power_of_two());
const _: () = assert!(TRANSFER_CHUNK_BYTES >= MAX_SYNC_FRAME_BYTES as usize);
