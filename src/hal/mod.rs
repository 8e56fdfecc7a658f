//! Hardware Abstraction Layer
//!
//! The streaming core reaches hardware only through the capabilities in
//! this module, which the platform glue implements.
//!
//! # Modules
//!
//! - [`registers`]: Register access and interrupt dispatch traits
//! - [`dma`]: DMA buffer type and allocator trait
//! - [`reset`]: Transceiver reset with ready polling
//!
//! # Delay Integration
//!
//! Types that require delays use `embedded_hal::delay::DelayNs` directly.
//! Pass any delay implementation from your HAL.

pub mod dma;
pub mod registers;
pub mod reset;

// Re-export commonly used types
pub use dma::{DmaAllocator, DmaBuffer, HeapDmaAllocator, Page};
pub use registers::{InterruptDispatch, InterruptHandler, RegisterAccess};
pub use reset::ResetController;
