//! End-to-end behaviour of a card driven by the mock hardware.
//!
//! Each test plays the hardware side through [`MockTransceiver`] and the
//! interrupt side through [`SyncCard::handle_interrupt`].

#![allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]

extern crate std;

use alloc::sync::Arc;
use alloc::vec::Vec;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use super::card::SyncCard;
use super::config::{FramePart, StreamDirection, StreamState, SyncConfig};
use crate::error::{ConfigError, DmaError, Error, IoError, IoResult};
use crate::hal::dma::Page;
use crate::internal::constants::MAX_SYNC_FRAME_BYTES;
use crate::internal::register::SyncRegs;
use crate::ring::CopyStrategy;
use crate::testing::MockTransceiver;

const RX: StreamDirection = StreamDirection::Receive;
const TX: StreamDirection = StreamDirection::Transmit;

fn card(config: SyncConfig) -> (Arc<MockTransceiver>, Arc<SyncCard>) {
    let hw = Arc::new(MockTransceiver::new());
    let card = Arc::new(SyncCard::new(0, hw.clone(), hw.clone(), config));
    (hw, card)
}

/// One frame-group per page, small software rings.
fn one_group_pages() -> SyncConfig {
    SyncConfig::new()
        .with_sw_rx_depth(16)
        .with_sw_tx_depth(16)
        .with_hw_rx_frames(1)
        .with_hw_tx_frames(1)
}

fn rx_flip(hw: &MockTransceiver, card: &SyncCard, page: &[u8]) {
    let bits = hw.simulate_rx_page(page);
    assert_ne!(bits, 0, "receive stream not started");
    card.handle_interrupt(bits);
}

#[test]
fn single_reader_collects_ten_page_flips() {
    let (hw, card) = card(one_group_pages());
    let client = card.open().unwrap();
    client.configure(RX, FramePart::new(4, 0)).unwrap();

    for group in 0u8..10 {
        let base = group * 4;
        rx_flip(&hw, &card, &[base, base + 1, base + 2, base + 3]);
    }

    let mut buf = [0u8; 40];
    assert_eq!(client.read(&mut buf), Ok(40));
    let expected: Vec<u8> = (0u8..40).collect();
    assert_eq!(&buf[..], &expected[..]);
    assert_eq!(card.stats(RX).interrupts, 10);
    assert_eq!(card.stats(RX).overruns, 0);
}

#[test]
fn disjoint_parts_split_one_frame_group() {
    let (hw, card) = card(one_group_pages());
    let first = card.open().unwrap();
    let second = card.open().unwrap();
    first.configure(RX, FramePart::new(4, 0)).unwrap();
    second.configure(RX, FramePart::new(4, 4)).unwrap();

    rx_flip(&hw, &card, &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x11, 0x22]);

    let mut buf = [0u8; 4];
    assert_eq!(first.read(&mut buf), Ok(4));
    assert_eq!(buf, [0xAA, 0xBB, 0xCC, 0xDD]);
    assert_eq!(second.read(&mut buf), Ok(4));
    assert_eq!(buf, [0xEE, 0xFF, 0x11, 0x22]);
}

#[test]
fn identical_parts_see_identical_streams() {
    let (hw, card) = card(one_group_pages());
    let first = card.open().unwrap();
    let second = card.open().unwrap();
    first.configure(RX, FramePart::new(2, 2)).unwrap();
    second.configure(RX, FramePart::new(2, 2)).unwrap();

    rx_flip(&hw, &card, &[1, 2, 3, 4]);
    rx_flip(&hw, &card, &[5, 6, 7, 8]);

    let mut a = [0u8; 4];
    assert_eq!(first.read(&mut a), Ok(4));
    assert_eq!(a, [3, 4, 7, 8]);

    // The second cursor is independent of the first one's progress.
    let mut b = [0u8; 1];
    assert_eq!(second.read(&mut b), Ok(1));
    let mut rest = [0u8; 3];
    assert_eq!(second.read(&mut rest), Ok(3));
    assert_eq!([b[0], rest[0], rest[1], rest[2]], a);
}

#[test]
fn short_write_goes_out_zero_filled() {
    let (hw, card) = card(one_group_pages());
    let client = card.open().unwrap();
    client.configure(TX, FramePart::new(4, 0)).unwrap();

    assert_eq!(client.write(&[9, 8]), Ok(2));
    let (_, bits) = hw.simulate_tx_page();
    card.handle_interrupt(bits);

    assert_eq!(hw.read_dma_page(SyncRegs::TX, Page::A), [9, 8, 0, 0]);
    assert_eq!(card.stats(TX).underruns, 1);

    // The refilled page is what hardware sends two flips later.
    let (_, bits) = hw.simulate_tx_page();
    card.handle_interrupt(bits);
    let (sent, _) = hw.simulate_tx_page();
    assert_eq!(sent, [9, 8, 0, 0]);
}

#[test]
fn transmit_writers_share_a_frame_group() {
    let (hw, card) = card(one_group_pages());
    let left = card.open().unwrap();
    let right = card.open().unwrap();
    left.configure(TX, FramePart::new(2, 0)).unwrap();
    right.configure(TX, FramePart::new(2, 2)).unwrap();

    left.write(&[1, 2]).unwrap();
    right.write(&[3, 4]).unwrap();
    let (_, bits) = hw.simulate_tx_page();
    card.handle_interrupt(bits);

    assert_eq!(hw.read_dma_page(SyncRegs::TX, Page::A), [1, 2, 3, 4]);
    assert_eq!(card.stats(TX).underruns, 0);
}

#[test]
fn configure_while_read_is_blocked() {
    let (hw, card) = card(one_group_pages());
    let reader = card.open().unwrap();
    let newcomer = card.open().unwrap();
    reader.configure(RX, FramePart::new(4, 0)).unwrap();

    let blocked = thread::spawn(move || {
        let mut buf = [0u8; 4];
        let result = reader.read(&mut buf);
        (result, buf)
    });

    thread::sleep(Duration::from_millis(20));
    assert_eq!(card.receive().in_flight(), 0);
    newcomer.configure(RX, FramePart::new(4, 4)).unwrap();
    assert_eq!(card.running_clients(RX), 2);

    rx_flip(&hw, &card, &[1, 2, 3, 4, 5, 6, 7, 8]);
    let (result, buf) = blocked.join().unwrap();
    assert_eq!(result, Ok(4));
    assert_eq!(buf, [1, 2, 3, 4]);
}

#[test]
fn blocked_read_can_be_cancelled_across_reconfiguration() {
    let (_hw, card) = card(one_group_pages());
    let reader = card.open().unwrap();
    let newcomer = card.open().unwrap();
    reader.configure(RX, FramePart::new(4, 0)).unwrap();
    let interrupter = reader.interrupter();

    let blocked = thread::spawn(move || {
        let mut buf = [0u8; 4];
        reader.read(&mut buf)
    });

    thread::sleep(Duration::from_millis(10));
    newcomer.configure(RX, FramePart::new(8, 0)).unwrap();
    thread::sleep(Duration::from_millis(10));
    interrupter.interrupt();

    assert_eq!(blocked.join().unwrap(), Err(Error::Io(IoError::Interrupted)));
}

/// Copy that reports its first call and then takes `stall` per call.
struct StallingCopy {
    started: Option<mpsc::Sender<()>>,
    stall: Duration,
}

impl StallingCopy {
    fn new(stall: Duration) -> (Self, mpsc::Receiver<()>) {
        let (started, copying) = mpsc::channel();
        let copy = Self {
            started: Some(started),
            stall,
        };
        (copy, copying)
    }
}

impl CopyStrategy for StallingCopy {
    fn copy(&mut self, dst: &mut [u8], src: &[u8]) -> IoResult<()> {
        if let Some(started) = self.started.take() {
            started.send(()).unwrap();
        }
        thread::sleep(self.stall);
        dst.copy_from_slice(src);
        Ok(())
    }
}

#[test]
fn page_flip_is_not_held_up_by_a_slow_read_copy() {
    let (hw, card) = card(one_group_pages());
    let client = card.open().unwrap();
    client.configure(RX, FramePart::new(4, 0)).unwrap();
    rx_flip(&hw, &card, &[1, 2, 3, 4]);

    let (mut copy, copying) = StallingCopy::new(Duration::from_millis(300));
    let reader = thread::spawn(move || {
        let mut buf = [0u8; 4];
        let result = client.read_with(&mut buf, &mut copy);
        (result, buf)
    });
    copying.recv().unwrap();

    let begin = Instant::now();
    rx_flip(&hw, &card, &[5, 6, 7, 8]);
    assert!(begin.elapsed() < Duration::from_millis(150));
    assert_eq!(card.stats(RX).interrupts, 2);

    let (result, buf) = reader.join().unwrap();
    assert_eq!(result, Ok(4));
    assert_eq!(buf, [1, 2, 3, 4]);
}

#[test]
fn page_flip_is_not_held_up_by_a_slow_write_copy() {
    let (hw, card) = card(one_group_pages());
    let client = card.open().unwrap();
    client.configure(TX, FramePart::new(4, 0)).unwrap();

    let (mut copy, copying) = StallingCopy::new(Duration::from_millis(300));
    let writer = thread::spawn(move || client.write_with(&[9, 9, 9, 9], &mut copy));
    copying.recv().unwrap();

    let (_, bits) = hw.simulate_tx_page();
    let begin = Instant::now();
    card.handle_interrupt(bits);
    assert!(begin.elapsed() < Duration::from_millis(150));
    assert_eq!(card.stats(TX).interrupts, 1);

    assert_eq!(writer.join().unwrap(), Ok(4));
}

#[test]
fn out_of_bounds_part_programs_nothing() {
    let (hw, card) = card(one_group_pages());
    let client = card.open().unwrap();

    assert_eq!(
        client.configure(RX, FramePart::new(4, MAX_SYNC_FRAME_BYTES)),
        Err(Error::Config(ConfigError::InvalidArgument))
    );
    assert_eq!(
        client.configure(TX, FramePart::new(0, 0)),
        Err(Error::Config(ConfigError::InvalidArgument))
    );
    assert!(hw.writes().is_empty());
    assert_eq!(hw.allocation_count(), 0);
    assert_eq!(card.state(RX), StreamState::Idle);
    assert!(!client.is_running(RX));
}

#[test]
fn ring_holds_capacity_without_overrun() {
    let config = SyncConfig::new()
        .with_sw_rx_depth(8)
        .with_hw_rx_frames(2);
    let (hw, card) = card(config);
    let client = card.open().unwrap();
    client.configure(RX, FramePart::new(4, 0)).unwrap();

    // Four pages of two groups fill the ring exactly.
    let produced: Vec<u8> = (0u8..32).collect();
    for page in produced.chunks(8) {
        rx_flip(&hw, &card, page);
    }
    assert_eq!(card.stats(RX).overruns, 0);

    let mut buf = [0u8; 32];
    assert_eq!(client.read(&mut buf), Ok(32));
    assert_eq!(&buf[..], &produced[..]);

    // Reader keeps up: the ring never overflows.
    for round in 0u8..20 {
        rx_flip(&hw, &card, &[round; 8]);
        let mut out = [0u8; 8];
        assert_eq!(client.read(&mut out), Ok(8));
        assert_eq!(out, [round; 8]);
    }
    assert_eq!(card.stats(RX).overruns, 0);

    // One page beyond a full ring is the first overrun.
    for _ in 0..5 {
        rx_flip(&hw, &card, &[0xEE; 8]);
    }
    assert_eq!(card.stats(RX).overruns, 1);
}

#[test]
fn slowest_reader_bounds_the_producer() {
    let config = SyncConfig::new()
        .with_sw_rx_depth(2)
        .with_hw_rx_frames(1);
    let (hw, card) = card(config);
    let fast = card.open().unwrap();
    let slow = card.open().unwrap();
    fast.configure(RX, FramePart::new(4, 0)).unwrap();
    slow.configure(RX, FramePart::new(4, 0)).unwrap();

    let mut buf = [0u8; 4];
    for group in 0u8..2 {
        rx_flip(&hw, &card, &[group; 4]);
        fast.read(&mut buf).unwrap();
    }
    rx_flip(&hw, &card, &[2; 4]);
    assert_eq!(card.stats(RX).overruns, 1);

    // Once the slow reader leaves, only the fast one holds the ring back.
    slow.stop(RX);
    rx_flip(&hw, &card, &[3; 4]);
    assert_eq!(card.stats(RX).overruns, 1);
    assert_eq!(fast.read(&mut buf), Ok(4));
    assert_eq!(buf, [3; 4]);
}

#[test]
fn reconfiguration_waits_for_in_flight_io() {
    let config = SyncConfig::new()
        .with_sw_rx_depth(64)
        .with_hw_rx_frames(1);
    let (hw, card) = card(config);
    let admin = card.open().unwrap();

    let mut readers = Vec::new();
    let mut interrupters = Vec::new();
    for offset in [0u32, 4] {
        let client = card.open().unwrap();
        client.configure(RX, FramePart::new(4, offset)).unwrap();
        interrupters.push(client.interrupter());
        readers.push(thread::spawn(move || {
            let mut total = 0usize;
            let mut buf = [0u8; 16];
            loop {
                match client.read(&mut buf) {
                    Ok(n) => total += n,
                    Err(Error::Io(IoError::Interrupted)) => return total,
                    Err(err) => panic!("unexpected read error: {err:?}"),
                }
            }
        }));
    }

    for round in 0u32..200 {
        if round % 10 == 0 {
            let width = 4 * (1 + round % 3);
            admin.configure(RX, FramePart::new(width, 8)).unwrap();
        }
        rx_flip(&hw, &card, &[round as u8; 20]);
    }

    thread::sleep(Duration::from_millis(20));
    for interrupter in &interrupters {
        interrupter.interrupt();
    }
    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
    assert_eq!(card.receive().in_flight(), 0);
    assert_eq!(card.stats(RX).reconfigurations, 2 + 20);
}

/// Open, stream three pages, close; returns everything read.
fn session(hw: &MockTransceiver, card: &Arc<SyncCard>) -> Vec<u8> {
    let client = card.open().unwrap();
    client.configure(RX, FramePart::new(4, 0)).unwrap();
    client.configure(TX, FramePart::new(4, 0)).unwrap();

    for group in 0u8..3 {
        rx_flip(hw, card, &[group, group + 1, group + 2, group + 3]);
    }
    let mut buf = [0u8; 12];
    let n = client.read(&mut buf).unwrap();

    client.write(&buf[..4]).unwrap();
    let (_, bits) = hw.simulate_tx_page();
    card.handle_interrupt(bits);

    let mut seen = buf[..n].to_vec();
    seen.extend(hw.read_dma_page(SyncRegs::TX, Page::A));
    client.close();
    seen
}

#[test]
fn reopen_after_teardown_behaves_identically() {
    let (hw, card) = card(one_group_pages());

    let first = session(&hw, &card);
    assert_eq!(hw.live_allocations(), 0);
    assert_eq!(card.state(RX), StreamState::Idle);
    assert_eq!(card.state(TX), StreamState::Idle);

    let second = session(&hw, &card);
    assert_eq!(first, second);
    assert_eq!(hw.live_allocations(), 0);
    assert_eq!(card.open_clients(), 0);
}

#[test]
fn failed_allocation_drops_direction_to_idle() {
    let (hw, card) = card(one_group_pages());
    let first = card.open().unwrap();
    let second = card.open().unwrap();
    first.configure(RX, FramePart::new(4, 0)).unwrap();
    first.configure(TX, FramePart::new(4, 0)).unwrap();

    // A wider frame needs a larger region; that allocation fails.
    hw.fail_allocations(1);
    assert_eq!(
        second.configure(RX, FramePart::new(8, 8)),
        Err(Error::Dma(DmaError::OutOfMemory))
    );

    assert_eq!(card.state(RX), StreamState::Idle);
    assert!(!first.is_running(RX));
    assert!(!second.is_running(RX));
    let mut buf = [0u8; 4];
    assert_eq!(first.read(&mut buf), Err(Error::Io(IoError::NotConfigured)));

    // The other direction is untouched.
    assert_eq!(card.state(TX), StreamState::Running);
    assert_eq!(hw.live_allocations(), 1);

    first.configure(RX, FramePart::new(4, 0)).unwrap();
    rx_flip(&hw, &card, &[4, 3, 2, 1]);
    assert_eq!(first.read(&mut buf), Ok(4));
    assert_eq!(buf, [4, 3, 2, 1]);
}

#[test]
fn stop_of_one_client_keeps_the_stream_running() {
    let (hw, card) = card(one_group_pages());
    let staying = card.open().unwrap();
    let leaving = card.open().unwrap();
    staying.configure(RX, FramePart::new(4, 0)).unwrap();
    leaving.configure(RX, FramePart::new(4, 4)).unwrap();

    assert!(leaving.stop(RX));
    assert!(!leaving.stop(RX));
    assert_eq!(card.state(RX), StreamState::Running);

    rx_flip(&hw, &card, &[1, 1, 1, 1, 2, 2, 2, 2]);
    let mut buf = [0u8; 4];
    assert_eq!(staying.read(&mut buf), Ok(4));
    assert_eq!(buf, [1; 4]);
    assert_eq!(leaving.read(&mut buf), Err(Error::Io(IoError::NotConfigured)));
}
