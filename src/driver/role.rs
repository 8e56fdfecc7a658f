//! Direction roles for the generic stream endpoint.
//!
//! A role binds a direction to its register block, its ring type and the
//! routine that moves one completed DMA page through that ring.

use super::config::StreamDirection;
use super::endpoint::StreamStats;
use crate::internal::log::{stream_debug, stream_warn};
use crate::internal::register::SyncRegs;
use crate::ring::{FrameRing, FrameRingBuffer, FrameSpscRing};

/// Direction-specific half of a stream endpoint.
pub trait StreamRole: Send + Sync + 'static {
    /// Software ring between clients and the page-flip handler
    type Ring: FrameRing;

    /// Direction served
    const DIRECTION: StreamDirection;

    /// Short name for log messages
    const NAME: &'static str;

    /// Bridge register block and interrupt bit
    const REGS: SyncRegs;

    /// Move the page hardware just released through the ring.
    ///
    /// Runs inside the interrupt bridge with the stream state locked; must
    /// neither block nor allocate.
    fn service_page(ring: &mut Self::Ring, page: &mut [u8], stats: &mut StreamStats);
}

/// Receive role: completed pages are appended to a [`FrameRingBuffer`].
#[derive(Debug, Clone, Copy)]
pub struct Rx;

/// Transmit role: released pages are refilled from a [`FrameSpscRing`].
#[derive(Debug, Clone, Copy)]
pub struct Tx;

impl StreamRole for Rx {
    type Ring = FrameRingBuffer;

    const DIRECTION: StreamDirection = StreamDirection::Receive;
    const NAME: &'static str = "rx";
    const REGS: SyncRegs = SyncRegs::RX;

    fn service_page(ring: &mut FrameRingBuffer, page: &mut [u8], stats: &mut StreamStats) {
        let fb = ring.frame_bytes() as u64;
        match ring.put(page) {
            Ok(accepted) => stats.frame_groups += accepted as u64 / fb,
            Err(overrun) => {
                stats.frame_groups += overrun.accepted as u64 / fb;
                stats.overruns += 1;
                stream_warn!(
                    "sync rx overrun: {} bytes dropped, {} kept",
                    overrun.dropped,
                    overrun.accepted
                );
            }
        }
        page.fill(0);
    }
}

impl StreamRole for Tx {
    type Ring = FrameSpscRing;

    const DIRECTION: StreamDirection = StreamDirection::Transmit;
    const NAME: &'static str = "tx";
    const REGS: SyncRegs = SyncRegs::TX;

    fn service_page(ring: &mut FrameSpscRing, page: &mut [u8], stats: &mut StreamStats) {
        page.fill(0);
        let before = ring.underruns();
        let written = ring.get(page);
        stats.frame_groups += (written / ring.frame_bytes()) as u64;

        let short = ring.underruns() - before;
        if short > 0 {
            stats.underruns += short;
            stream_debug!("sync tx underrun: {} frame-groups zero-filled", short);
        }
    }
}
