//! Register map of the MOST PCI bridge and transceiver
//!
//! The bridge exposes one register block per synchronous direction plus
//! the interrupt controller. Transceiver (chip) registers sit in a separate
//! window reached through the same [`RegisterAccess`](crate::RegisterAccess)
//! capability and only carry 8 significant bits.

pub mod chip;

// =============================================================================
// Interrupt Sources
// =============================================================================

/// Synchronous receive page flipped
pub const IRQ_SYNC_RX: u32 = 1 << 4;

/// Synchronous transmit page flipped
pub const IRQ_SYNC_TX: u32 = 1 << 5;

/// All synchronous interrupt sources
pub const IRQ_SYNC_ALL: u32 = IRQ_SYNC_RX | IRQ_SYNC_TX;

// =============================================================================
// Per-direction Register Blocks
// =============================================================================

/// Receive block base offset
pub const SYNC_RX_BLOCK: u16 = 0x0100;

/// Transmit block base offset
pub const SYNC_TX_BLOCK: u16 = 0x0140;

/// DMA base address, low 32 bits
pub const DMA_BASE_LO_OFFSET: u16 = 0x00;
/// DMA base address, high 32 bits
pub const DMA_BASE_HI_OFFSET: u16 = 0x04;
/// Quadlets per frame-group
pub const QUADLETS_OFFSET: u16 = 0x08;
/// Frame-groups per DMA half
pub const PAGE_FRAMES_OFFSET: u16 = 0x0C;
/// Stream control
pub const CONTROL_OFFSET: u16 = 0x10;
/// Page parity status (read-only)
pub const PAGE_STATUS_OFFSET: u16 = 0x14;
/// Node position the stream is bound to
pub const NODE_POSITION_OFFSET: u16 = 0x18;

/// CONTROL: start the DMA engine for this direction
pub const CONTROL_START: u32 = 1 << 0;

/// PAGE_STATUS: hardware currently owns page B (clear: page A)
pub const PAGE_STATUS_PAGE_B: u32 = 1 << 0;

/// Addresses and interrupt bit of one synchronous direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncRegs {
    /// Block base offset
    pub block: u16,
    /// Interrupt source bit for this direction
    pub irq: u32,
}

impl SyncRegs {
    /// Receive register block
    pub const RX: SyncRegs = SyncRegs {
        block: SYNC_RX_BLOCK,
        irq: IRQ_SYNC_RX,
    };

    /// Transmit register block
    pub const TX: SyncRegs = SyncRegs {
        block: SYNC_TX_BLOCK,
        irq: IRQ_SYNC_TX,
    };

    /// DMA base address low register
    #[inline(always)]
    pub const fn dma_base_lo(&self) -> u16 {
        self.block + DMA_BASE_LO_OFFSET
    }

    /// DMA base address high register
    #[inline(always)]
    pub const fn dma_base_hi(&self) -> u16 {
        self.block + DMA_BASE_HI_OFFSET
    }

    /// Quadlet count register
    #[inline(always)]
    pub const fn quadlets(&self) -> u16 {
        self.block + QUADLETS_OFFSET
    }

    /// Frames-per-page register
    #[inline(always)]
    pub const fn page_frames(&self) -> u16 {
        self.block + PAGE_FRAMES_OFFSET
    }

    /// Control register
    #[inline(always)]
    pub const fn control(&self) -> u16 {
        self.block + CONTROL_OFFSET
    }

    /// Page status register
    #[inline(always)]
    pub const fn page_status(&self) -> u16 {
        self.block + PAGE_STATUS_OFFSET
    }

    /// Node position register
    #[inline(always)]
    pub const fn node_position(&self) -> u16 {
        self.block + NODE_POSITION_OFFSET
    }
}
