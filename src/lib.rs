//! MOST PCI Synchronous Streaming Core
//!
//! A `no_std` + `alloc` Rust implementation of the synchronous (isochronous)
//! data path of MOST PCI network interface cards.
//!
//! The card moves synchronous data through a pair of DMA pages per
//! direction, flipping between them every `hw_*_frames` frame-groups and
//! raising an interrupt on each flip. This crate turns those page pairs into
//! independent byte streams, one per client and direction, each carrying the
//! client's slice ([`FramePart`]) of every frame-group.
//!
//! # Architecture
//!
//! The crate is organized into four layers:
//!
//! 1. **Driver Layer** ([`driver`]): Card registry, client handles, and the
//!    per-direction stream state machine
//! 2. **Ring Layer** ([`ring`]): Multi-cursor software rings between clients
//!    and the page-flip handler
//! 3. **Sync Layer** ([`sync`]): ISR-safe shared state, the reconfiguration
//!    lock, and pluggable blocking strategies
//! 4. **HAL Layer** ([`hal`]): Register access, interrupt dispatch, and DMA
//!    memory capabilities supplied by the platform
//!
//! ## Data Flow
//!
//! - **Receive**: hardware fills a page, flips, interrupts; the handler
//!   appends the completed page to a [`FrameRingBuffer`] that every reader
//!   drains through its own cursor.
//! - **Transmit**: writers fill their slices of a [`FrameSpscRing`]; on each
//!   flip the handler drains whole frame-groups into the page hardware just
//!   released. Missing slices go out as silence.
//!
//! # Features
//!
//! - `std` (default): `critical-section` std implementation and the
//!   condition-variable blocking strategy ([`CondvarSuspend`])
//! - `log` (default): Log through the `log` facade
//! - `defmt`: Enable defmt formatting for public types and defmt logging
//!
//! Without `std`, the target must provide a `critical-section`
//! implementation, and blocking calls spin ([`SpinSuspend`]).
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ph_most_sync::{FramePart, StreamDirection, SyncConfig, SyncDriver};
//!
//! // Platform glue: register window, DMA allocator, interrupt vector
//! let regs: Arc<dyn RegisterAccess> = /* your BAR mapping */;
//! let dma: Arc<dyn DmaAllocator> = /* your coherent allocator */;
//! let dispatch = /* your interrupt registration */;
//!
//! let config = SyncConfig::new()
//!     .with_hw_rx_frames(44)
//!     .with_sw_rx_depth(44_100);
//!
//! let mut driver = SyncDriver::new(config)?;
//! let card = driver.probe(regs, dma, dispatch, delay)?;
//!
//! let client = card.open()?;
//! client.configure(StreamDirection::Receive, FramePart::new(4, 0))?;
//!
//! let mut samples = [0u8; 4 * 44];
//! let n = client.read(&mut samples)?;
//! ```
//!
//! # Memory Requirements
//!
//! Per running direction:
//! - DMA: `2 * hw_frames * frame_bytes` (frame bytes rounded up to quadlets)
//! - Ring: `sw_depth * frame_bytes` plus one cursor per client

#![no_std]
#![deny(missing_docs)]
#![allow(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]
// Clippy lint levels mirror the [lints] table in Cargo.toml.
#![deny(clippy::correctness)]
#![warn(
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::cloned_instead_of_copied,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::inconsistent_struct_constructor,
    clippy::manual_assert,
    clippy::manual_let_else,
    clippy::match_same_arms,
    clippy::needless_pass_by_value,
    clippy::semicolon_if_nothing_returned,
    clippy::uninlined_format_args,
    clippy::unnested_or_patterns,
    clippy::std_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::alloc_instead_of_core
)]
#![allow(
    clippy::mod_module_files,
    clippy::self_named_module_files,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::struct_excessive_bools,
    clippy::fn_params_excessive_bools,
    clippy::type_complexity,
    clippy::must_use_candidate,
    clippy::assertions_on_constants,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::panic_in_result_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::items_after_statements
)]

extern crate alloc;

// =============================================================================
// Modules
// =============================================================================

pub mod driver;
pub mod error;
pub mod hal;
pub mod ring;
pub mod sync;

// Internal implementation details (pub(crate) only)
mod internal;

// Test utilities (only available during testing)
#[cfg(test)]
pub mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use driver::{
    ClientHandle, ClientId, FramePart, InterruptStatus, Interrupter, SharedDispatch,
    StreamDirection, StreamState, StreamStats, SyncCard, SyncConfig, SyncDriver,
};
pub use error::{
    ConfigError, ConfigResult, DmaError, DmaResult, Error, IoError, IoResult, Overrun, Result,
};
pub use hal::{
    DmaAllocator, DmaBuffer, HeapDmaAllocator, InterruptDispatch, InterruptHandler, Page,
    RegisterAccess, ResetController,
};
pub use ring::{CopyStrategy, FrameRing, FrameRingBuffer, FrameSpscRing, MemCopy};
#[cfg(feature = "std")]
pub use sync::CondvarSuspend;
pub use sync::{CancelFlag, DefaultSuspend, SpinSuspend, Suspend};

/// Low-level register map for platform glue and diagnostics.
///
/// The driver programs these itself; writing them behind its back breaks
/// the stream state machine.
pub mod registers {
    pub use crate::internal::register::chip::{CHIP_STATUS, CHIP_STATUS_READY, NPR, SBC};
    pub use crate::internal::register::{
        CONTROL_START, IRQ_SYNC_ALL, IRQ_SYNC_RX, IRQ_SYNC_TX, PAGE_STATUS_PAGE_B, SyncRegs,
    };
}

/// Shared driver constants.
///
/// These are grouped into a dedicated module to keep the top-level facade
/// focused on driver types and integration points.
pub mod constants {
    pub use crate::internal::constants::{
        // Buffer depths
        DEFAULT_HW_RX_FRAMES,
        DEFAULT_HW_TX_FRAMES,
        DEFAULT_MAX_CLIENTS,
        DEFAULT_SW_RX_DEPTH,
        DEFAULT_SW_TX_DEPTH,
        // DMA layout
        DMA_ALIGNMENT,
        DMA_PAGES,
        // Frame geometry
        FRAME_RATE_HZ,
        // Registry
        MAX_CARDS,
        MAX_SYNC_FRAME_BYTES,
        QUADLET_BYTES,
        // Timing
        RESET_POLL_INTERVAL_US,
        RESET_TIMEOUT_MS,
    };
}
