//! Per-direction stream control.
//!
//! One [`StreamEndpoint`] exists per direction per card. It owns the DMA
//! page pair, the software ring and the set of running clients, and
//! implements configure, stop, teardown, blocking transfer and page-flip
//! servicing once for both directions through [`StreamRole`].
//!
//! # Locking
//!
//! - Stream state lives in a [`CriticalSectionCell`]; the page-flip handler
//!   only ever takes this short lock.
//! - Reconfiguration holds the direction's [`ReconfigureLock`], so no read
//!   or write is inside its copy while buffers are replaced.
//! - Reads and writes copy client bytes outside the critical section, in
//!   bounded chunks staged on the stack.
//! - Register access and waiter notification happen outside the critical
//!   section.

use alloc::vec::Vec;
use core::marker::PhantomData;
use core::sync::atomic::{Ordering, fence};

use super::config::{FramePart, StreamState, SyncConfig};
use super::role::{Rx, StreamRole, Tx};
use crate::error::{DmaError, DmaResult, Error, IoError, Result};
use crate::hal::dma::{DmaAllocator, DmaBuffer, Page};
use crate::hal::registers::RegisterAccess;
use crate::internal::constants::{
    DMA_PAGES, MAX_SYNC_FRAME_BYTES, QUADLET_BYTES, TRANSFER_CHUNK_BYTES,
};
use crate::internal::log::{stream_debug, stream_info, stream_warn};
use crate::internal::register::chip::{CHIP_VALUE_MASK, NPR, SBC};
use crate::internal::register::{CONTROL_START, PAGE_STATUS_PAGE_B};
use crate::ring::{CopyStrategy, FrameRing, MemCopy, partial_or};
use crate::sync::{CancelFlag, CriticalSectionCell, ReconfigureLock, Suspend};

/// Identity of an open client handle within its card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClientId(u32);

impl ClientId {
    pub(crate) const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw numeric id
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Counters kept per direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamStats {
    /// Page flips serviced
    pub interrupts: u64,
    /// Frame-groups moved between DMA pages and the ring
    pub frame_groups: u64,
    /// Receive pages that did not fit behind the slowest reader
    pub overruns: u64,
    /// Transmit frame-groups sent before every writer had filled them
    pub underruns: u64,
    /// The same page reported complete twice in a row
    pub page_anomalies: u64,
    /// Successful configure calls
    pub reconfigurations: u64,
}

/// Platform capabilities an endpoint programs and allocates through.
#[derive(Clone, Copy)]
pub(crate) struct Bus<'a> {
    pub(crate) regs: &'a dyn RegisterAccess,
    pub(crate) dma: &'a dyn DmaAllocator,
}

#[derive(Debug, Clone, Copy)]
struct Member {
    client: ClientId,
    part: FramePart,
    cursor: usize,
}

struct Shared<Ring> {
    state: StreamState,
    dma: Option<DmaBuffer>,
    ring: Option<Ring>,
    members: Vec<Member>,
    quadlets: u32,
    page_bytes: usize,
    current_page: Option<Page>,
    /// Bumped whenever the ring or the member set changes
    epoch: u64,
    stats: StreamStats,
}

impl<Ring> Shared<Ring> {
    const fn new() -> Self {
        Self {
            state: StreamState::Idle,
            dma: None,
            ring: None,
            members: Vec::new(),
            quadlets: 0,
            page_bytes: 0,
            current_page: None,
            epoch: 0,
            stats: StreamStats {
                interrupts: 0,
                frame_groups: 0,
                overruns: 0,
                underruns: 0,
                page_anomalies: 0,
                reconfigurations: 0,
            },
        }
    }

    fn member(&self, client: ClientId) -> Option<Member> {
        self.members.iter().find(|m| m.client == client).copied()
    }
}

/// One direction of a card's synchronous stream.
pub struct StreamEndpoint<R: StreamRole, S: Suspend> {
    shared: CriticalSectionCell<Shared<R::Ring>>,
    lock: ReconfigureLock<S>,
    /// Waiters for data (receive) or space (transmit)
    data: S,
    sw_depth: usize,
    hw_frames: usize,
    _role: PhantomData<R>,
}

impl<R: StreamRole, S: Suspend> StreamEndpoint<R, S> {
    pub(crate) fn new(config: &SyncConfig) -> Self {
        Self {
            shared: CriticalSectionCell::new(Shared::new()),
            lock: ReconfigureLock::new(),
            data: S::default(),
            sw_depth: config.sw_depth(R::DIRECTION),
            hw_frames: config.hw_frames(R::DIRECTION),
            _role: PhantomData,
        }
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Current state
    pub fn state(&self) -> StreamState {
        self.shared.with_ref(|s| s.state)
    }

    /// Counter snapshot
    pub fn stats(&self) -> StreamStats {
        self.shared.with_ref(|s| s.stats)
    }

    /// Quadlets per frame-group currently programmed, 0 when idle
    pub fn quadlets(&self) -> u32 {
        self.shared.with_ref(|s| s.quadlets)
    }

    /// Page serviced by the most recent page flip
    pub fn current_page(&self) -> Option<Page> {
        self.shared.with_ref(|s| s.current_page)
    }

    /// Running clients
    pub fn client_count(&self) -> usize {
        self.shared.with_ref(|s| s.members.len())
    }

    /// Whether `client` is running in this direction
    pub fn is_running(&self, client: ClientId) -> bool {
        self.shared.with_ref(|s| s.member(client).is_some())
    }

    /// Cursor index assigned to `client` by the last configure
    pub fn cursor_of(&self, client: ClientId) -> Option<usize> {
        self.shared.with_ref(|s| s.member(client).map(|m| m.cursor))
    }

    /// Reads or writes currently inside their copy
    pub fn in_flight(&self) -> usize {
        self.lock.in_flight()
    }

    /// Size of the DMA region held, 0 when none
    pub fn dma_len(&self) -> usize {
        self.shared.with_ref(|s| s.dma.as_ref().map_or(0, DmaBuffer::len))
    }

    pub(crate) fn wake_all(&self) {
        self.lock.wake_all();
        self.data.notify_all();
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Add `client` with `part` (or move it to a new part) and restart the
    /// direction sized for every running client.
    ///
    /// `other_quadlets` is the opposite direction's width, needed for the
    /// chip bandwidth register.
    pub(crate) fn configure(
        &self,
        bus: Bus<'_>,
        client: ClientId,
        part: FramePart,
        other_quadlets: u32,
    ) -> Result<()> {
        part.validate(MAX_SYNC_FRAME_BYTES)?;
        let guard = self.lock.try_begin()?;

        let was_running = self.shared.with(|s| {
            let running = s.state == StreamState::Running;
            s.state = StreamState::Configuring;
            running
        });
        if was_running {
            self.halt(bus.regs);
        }

        let (old_dma, old_ring) = self.shared.with(|s| (s.dma.take(), s.ring.take()));
        drop(old_ring);

        let members = match self.members_with(client, part) {
            Ok(members) => members,
            Err(err) => return Err(self.roll_back(bus, old_dma, other_quadlets, err)),
        };
        let max_end = members
            .iter()
            .filter_map(|m| m.part.end())
            .max()
            .unwrap_or(0);
        let quadlets = max_end.div_ceil(QUADLET_BYTES as u32);
        let frame_bytes = quadlets as usize * QUADLET_BYTES;
        let page_bytes = frame_bytes * self.hw_frames;

        let regs = R::REGS;
        write_reg(bus.regs, regs.quadlets(), quadlets);
        write_reg(bus.regs, regs.page_frames(), self.hw_frames as u32);
        let node = read_reg(bus.regs, NPR) & CHIP_VALUE_MASK;
        write_reg(bus.regs, regs.node_position(), node);
        write_reg(bus.regs, SBC, quadlets.max(other_quadlets) & CHIP_VALUE_MASK);

        let dma = match self.provision_dma(bus, old_dma, page_bytes * DMA_PAGES) {
            Ok(dma) => dma,
            Err(err) => return Err(self.roll_back(bus, None, other_quadlets, err)),
        };
        let ring = match R::Ring::allocate(members.len(), self.sw_depth, frame_bytes) {
            Ok(ring) => ring,
            Err(err) => return Err(self.roll_back(bus, Some(dma), other_quadlets, err)),
        };

        let bus_address = dma.bus_address();
        write_reg(bus.regs, regs.dma_base_lo(), bus_address as u32);
        write_reg(bus.regs, regs.dma_base_hi(), (bus_address >> 32) as u32);

        let clients = members.len();
        debug_assert_eq!(guard.in_flight(), 0);
        self.shared.with(|s| {
            s.dma = Some(dma);
            s.ring = Some(ring);
            s.members = members;
            s.quadlets = quadlets;
            s.page_bytes = page_bytes;
            s.current_page = None;
            s.epoch += 1;
            s.state = StreamState::Running;
            s.stats.reconfigurations += 1;
        });

        fence(Ordering::SeqCst);
        change_reg(bus.regs, regs.control(), CONTROL_START, CONTROL_START);
        bus.regs.set_interrupt_mask(regs.irq, regs.irq);

        drop(guard);
        self.data.notify_all();
        stream_info!(
            "sync {} running: {} clients, {} quadlets",
            R::NAME,
            clients,
            quadlets
        );
        Ok(())
    }

    /// Stop `client` in this direction. The last client out tears the
    /// direction down.
    ///
    /// Returns whether the client was running. Waits for a running
    /// configure to finish.
    pub(crate) fn stop(&self, bus: Bus<'_>, client: ClientId, other_quadlets: u32) -> bool {
        let guard = self.lock.begin();
        let outcome = self.shared.with(|s| {
            let pos = s.members.iter().position(|m| m.client == client)?;
            let member = s.members.remove(pos);
            if let Some(ring) = s.ring.as_mut() {
                ring.release_cursor(member.cursor);
            }
            s.epoch += 1;
            Some(s.members.is_empty())
        });

        let Some(last) = outcome else {
            return false;
        };
        if last {
            self.teardown(bus, other_quadlets);
        }
        drop(guard);
        self.data.notify_all();
        true
    }

    /// Stop every client and release all resources.
    pub(crate) fn shutdown(&self, bus: Bus<'_>, other_quadlets: u32) {
        let guard = self.lock.begin();
        self.shared.with(|s| s.members.clear());
        self.teardown(bus, other_quadlets);
        drop(guard);
        self.data.notify_all();
    }

    /// New member list: current members in order, then `client`, with dense
    /// cursor indices.
    fn members_with(&self, client: ClientId, part: FramePart) -> DmaResult<Vec<Member>> {
        let mut members = Vec::new();
        let current = self.shared.with_ref(|s| s.members.len());
        members
            .try_reserve_exact(current + 1)
            .map_err(|_| DmaError::OutOfMemory)?;

        self.shared.with_ref(|s| {
            members.extend(s.members.iter().filter(|m| m.client != client).copied());
        });
        members.push(Member {
            client,
            part,
            cursor: 0,
        });
        for (cursor, member) in members.iter_mut().enumerate() {
            member.cursor = cursor;
        }
        Ok(members)
    }

    /// Reuse the current region when it is large enough, else replace it.
    fn provision_dma(
        &self,
        bus: Bus<'_>,
        old: Option<DmaBuffer>,
        required: usize,
    ) -> DmaResult<DmaBuffer> {
        let mut buffer = match old {
            Some(buffer) if buffer.len() >= required => buffer,
            old => {
                if let Some(buffer) = old {
                    bus.dma.free(buffer);
                }
                bus.dma.allocate(required)?
            }
        };
        buffer.zero();
        Ok(buffer)
    }

    /// Abandon a failed configure: the direction drops to idle and every
    /// client of it must configure again.
    fn roll_back(
        &self,
        bus: Bus<'_>,
        dma: Option<DmaBuffer>,
        other_quadlets: u32,
        err: DmaError,
    ) -> Error {
        if let Some(buffer) = dma {
            bus.dma.free(buffer);
        }
        self.shared.with(|s| {
            s.members.clear();
            s.state = StreamState::Idle;
            s.quadlets = 0;
            s.page_bytes = 0;
            s.current_page = None;
            s.epoch += 1;
        });
        write_reg(bus.regs, SBC, other_quadlets & CHIP_VALUE_MASK);
        self.data.notify_all();
        stream_warn!("sync {} configure failed: {}", R::NAME, err.as_str());
        err.into()
    }

    /// Halt hardware and free the ring and DMA region. Caller holds the
    /// reconfigure guard.
    fn teardown(&self, bus: Bus<'_>, other_quadlets: u32) {
        self.halt(bus.regs);
        let (dma, ring) = self.shared.with(|s| {
            s.state = StreamState::Idle;
            s.quadlets = 0;
            s.page_bytes = 0;
            s.current_page = None;
            s.epoch += 1;
            (s.dma.take(), s.ring.take())
        });
        drop(ring);
        if let Some(buffer) = dma {
            bus.dma.free(buffer);
        }
        write_reg(bus.regs, SBC, other_quadlets & CHIP_VALUE_MASK);
        stream_debug!("sync {} torn down", R::NAME);
    }

    /// Disable the interrupt source, clear START and drop pending status.
    fn halt(&self, regs: &dyn RegisterAccess) {
        let sync = R::REGS;
        regs.set_interrupt_mask(0, sync.irq);
        change_reg(regs, sync.control(), 0, CONTROL_START);
        regs.clear_interrupt_status(sync.irq);
    }

    // =========================================================================
    // Page Flip
    // =========================================================================

    /// Service one page flip for this direction.
    ///
    /// Reads the page parity fresh, moves the page hardware just released
    /// through the ring and wakes waiters. No-op while nothing is allocated.
    pub(crate) fn service_interrupt(&self, regs: &dyn RegisterAccess) {
        let parity = read_reg(regs, R::REGS.page_status());
        let active = if parity & PAGE_STATUS_PAGE_B != 0 {
            Page::B
        } else {
            Page::A
        };
        let released = active.other();

        let serviced = self.shared.with(|s| {
            let Shared {
                dma,
                ring,
                current_page,
                page_bytes,
                stats,
                ..
            } = s;
            let (Some(dma), Some(ring)) = (dma.as_mut(), ring.as_mut()) else {
                return false;
            };

            stats.interrupts += 1;
            if *current_page == Some(released) {
                stats.page_anomalies += 1;
                stream_warn!("sync {} page {} reported twice", R::NAME, released.name());
            }
            *current_page = Some(released);
            R::service_page(ring, dma.page_mut(released, *page_bytes), stats);
            true
        });

        if serviced {
            self.data.notify_all();
        }
    }

    // =========================================================================
    // Transfer
    // =========================================================================

    /// Run `step` against `client`'s cursor inside the critical section.
    ///
    /// Returns the step's value with the epoch and cursor it ran under.
    fn locked<T, F>(&self, client: ClientId, step: F) -> Result<(T, u64, usize)>
    where
        F: FnOnce(&mut R::Ring, Member) -> Result<T>,
    {
        self.shared.with(|s| -> Result<(T, u64, usize)> {
            let member = s.member(client).ok_or(IoError::NotConfigured)?;
            let ring = s.ring.as_mut().ok_or(IoError::NotConfigured)?;
            let value = step(ring, member)?;
            Ok((value, s.epoch, member.cursor))
        })
    }

    /// Block until `cursor` can make progress or the direction changes.
    fn wait_ready(&self, cancel: &CancelFlag, epoch: u64, cursor: usize) -> Result<()> {
        self.data.wait_until(Some(cancel), || {
            self.shared.with_ref(|s| {
                let ready = s.epoch != epoch
                    || s.ring.as_ref().is_none_or(|ring| ring.is_ready(cursor));
                ready.then_some(())
            })
        })?;
        Ok(())
    }
}

// Transfers hold an `IoGuard` from staging to commit, so the ring they
// touch cannot be replaced underneath them. The critical section is taken
// only to move at most `TRANSFER_CHUNK_BYTES` between the ring and a stack
// buffer; the caller's `CopyStrategy` always runs outside it.

impl<S: Suspend> StreamEndpoint<Rx, S> {
    /// Block until `client` has data, then copy what is available.
    ///
    /// Returns 0 only for an empty `dst`. An error after partial progress
    /// returns the bytes copied so far.
    pub(crate) fn read(
        &self,
        client: ClientId,
        dst: &mut [u8],
        cancel: &CancelFlag,
        copy: &mut impl CopyStrategy,
    ) -> Result<usize> {
        let mut stage = [0u8; TRANSFER_CHUNK_BYTES];
        let mut copied = 0;
        while copied < dst.len() {
            let io = match self.lock.enter_io(Some(cancel)) {
                Ok(io) => io,
                Err(err) => return partial_or(copied, err),
            };
            let want = (dst.len() - copied).min(stage.len());
            let peeked = self.locked(client, |ring, member| {
                ring.peek(member.cursor, member.part, &mut stage[..want])
            });
            let (n, epoch, cursor) = match peeked {
                Ok(peeked) => peeked,
                Err(err) => return partial_or(copied, err),
            };

            if n == 0 {
                drop(io);
                if copied > 0 {
                    break;
                }
                self.wait_ready(cancel, epoch, cursor)?;
                continue;
            }

            if let Err(err) = copy.copy(&mut dst[copied..copied + n], &stage[..n]) {
                return partial_or(copied, err);
            }
            if let Err(err) = self.locked(client, |ring, member| {
                ring.consume(member.cursor, member.part, n)
            }) {
                return partial_or(copied, err);
            }
            copied += n;
            drop(io);
        }
        Ok(copied)
    }
}

impl<S: Suspend> StreamEndpoint<Tx, S> {
    /// Block until every byte of `src` is queued.
    ///
    /// An error after partial progress returns the bytes queued so far.
    pub(crate) fn write(
        &self,
        client: ClientId,
        src: &[u8],
        cancel: &CancelFlag,
        copy: &mut impl CopyStrategy,
    ) -> Result<usize> {
        let mut stage = [0u8; TRANSFER_CHUNK_BYTES];
        let mut written = 0;
        while written < src.len() {
            let io = match self.lock.enter_io(Some(cancel)) {
                Ok(io) => io,
                Err(err) => return partial_or(written, err),
            };
            let room = self.locked(client, |ring, member| ring.room(member.cursor, member.part));
            let (room, epoch, cursor) = match room {
                Ok(room) => room,
                Err(err) => return partial_or(written, err),
            };

            if room == 0 {
                drop(io);
                if let Err(err) = self.wait_ready(cancel, epoch, cursor) {
                    return partial_or(written, err);
                }
                continue;
            }

            let n = room.min(src.len() - written).min(stage.len());
            if let Err(err) = copy.copy(&mut stage[..n], &src[written..written + n]) {
                return partial_or(written, err);
            }
            match self.locked(client, |ring, member| {
                ring.put(member.cursor, member.part, &stage[..n], &mut MemCopy)
            }) {
                Ok((accepted, ..)) => written += accepted,
                Err(err) => return partial_or(written, err),
            }
            drop(io);
        }
        Ok(written)
    }
}

// =============================================================================
// Register Helpers
// =============================================================================

/// Best-effort read: failures are logged and read as 0.
fn read_reg(regs: &dyn RegisterAccess, addr: u16) -> u32 {
    regs.read_register(addr).unwrap_or_else(|err| {
        stream_warn!("register read {} failed: {}", addr, err.as_str());
        0
    })
}

fn write_reg(regs: &dyn RegisterAccess, addr: u16, value: u32) {
    if let Err(err) = regs.write_register(addr, value) {
        stream_warn!("register write {} failed: {}", addr, err.as_str());
    }
}

fn change_reg(regs: &dyn RegisterAccess, addr: u16, value: u32, mask: u32) {
    if let Err(err) = regs.change_register(addr, value, mask) {
        stream_warn!("register update {} failed: {}", addr, err.as_str());
    }
}
