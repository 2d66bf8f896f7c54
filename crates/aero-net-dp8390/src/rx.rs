//! Receive engine: address filtering and the receive ring.
//!
//! Accepted frames are stored at CURR behind a four byte header
//! `[status, next_page, count_lo, count_hi]`, where `count` includes the header itself. The ring
//! is page-granular and bounded by PSTART/PSTOP; one page is always kept free so that
//! CURR == BNRY unambiguously means "empty".

use tracing::{debug, trace, warn};

use crate::backend::NetworkBackend;
use crate::chip::Dp8390;
use crate::irq::IrqSink;
use crate::regs::{Dcr, Isr, Rcr, Rsr, PAGE_SIZE};

/// Frames shorter than this are runts; accepted runts are zero-padded to it.
pub const MIN_FRAME_LEN: usize = 60;
/// Longest frame (without FCS) the receive FIFO accepts.
pub const MAX_FRAME_LEN: usize = 1514;
/// Size of the header prepended to each frame in the ring.
pub const RX_HEADER_LEN: usize = 4;

const BROADCAST: [u8; 6] = [0xFF; 6];

const TALLY_FRAME_ALIGNMENT: usize = 0;
const TALLY_CRC: usize = 1;
const TALLY_MISSED: usize = 2;

/// Receive errors reported by the backend alongside a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RxErrors {
    pub crc: bool,
    pub frame_alignment: bool,
}

/// Index (0..64) of `dst` in the multicast address hash filter (MAR0..MAR7).
///
/// This is the upper six bits of a bit-reflected-input CRC over the destination address, as used
/// by the 8390 hardware hash.
pub fn multicast_hash_index(dst: &[u8; 6]) -> usize {
    const POLYNOMIAL: u32 = 0x04C1_1DB6;

    let mut crc = 0xFFFF_FFFFu32;
    for &byte in dst {
        let mut b = byte;
        for _ in 0..8 {
            let carry = (crc >> 31) ^ u32::from(b & 1);
            crc <<= 1;
            b >>= 1;
            if carry != 0 {
                crc = (crc ^ POLYNOMIAL) | carry;
            }
        }
    }
    (crc >> 26) as usize
}

/// Number of ring pages a frame of `len` bytes occupies, header included.
pub fn pages_for_frame(len: usize) -> usize {
    (RX_HEADER_LEN + len).div_ceil(PAGE_SIZE)
}

impl<B: NetworkBackend, I: IrqSink> Dp8390<B, I> {
    /// Delivers a frame from the network.
    ///
    /// Returns `true` if the frame was stored in the receive ring. Frames are ignored while the
    /// receiver is looped back (DCR.LS clear or TCR.LB non-zero).
    pub fn receive_frame(&mut self, frame: &[u8]) -> bool {
        self.receive_frame_with_errors(frame, RxErrors::default())
    }

    /// Like [`Self::receive_frame`], for a frame the backend saw arrive with errors.
    pub fn receive_frame_with_errors(&mut self, frame: &[u8], errors: RxErrors) -> bool {
        if !self.regs.dcr.contains(Dcr::LS) || self.regs.tcr.loopback() != 0 {
            trace!(
                instance = self.config.instance,
                len = frame.len(),
                "dp8390: receiver looped back, network frame ignored"
            );
            return false;
        }
        self.receive_common(frame, errors)
    }

    /// Entry point shared by network delivery and transmit loopback.
    pub(crate) fn receive_common(&mut self, frame: &[u8], errors: RxErrors) -> bool {
        let stored = self.deliver(frame, errors);
        self.update_irq();
        stored
    }

    fn deliver(&mut self, frame: &[u8], errors: RxErrors) -> bool {
        let instance = self.config.instance;
        if !self.is_running() {
            return false;
        }
        if self.regs.page_start >= self.regs.page_stop {
            warn!(
                instance,
                pstart = self.regs.page_start,
                pstop = self.regs.page_stop,
                "dp8390: receive ring not configured, frame dropped"
            );
            return false;
        }
        if frame.len() < MIN_FRAME_LEN && !self.regs.rcr.contains(Rcr::AR) {
            debug!(instance, len = frame.len(), "dp8390: runt frame rejected");
            return false;
        }

        let padded;
        let frame = if frame.len() < MIN_FRAME_LEN {
            let mut buf = frame.to_vec();
            buf.resize(MIN_FRAME_LEN, 0);
            padded = buf;
            padded.as_slice()
        } else {
            frame
        };

        let mut dst = [0u8; 6];
        dst.copy_from_slice(&frame[..6]);
        let Some(group) = self.accept_destination(&dst) else {
            trace!(instance, dst = ?dst, "dp8390: frame filtered");
            return false;
        };

        let mut status = Rsr::empty();
        status.set(Rsr::PHY, group);
        status.set(Rsr::CRC, errors.crc);
        status.set(Rsr::FAE, errors.frame_alignment);
        status.set(Rsr::FO, frame.len() > MAX_FRAME_LEN);
        let failed = status.intersects(Rsr::CRC | Rsr::FAE | Rsr::FO);

        if self.regs.rcr.contains(Rcr::MON) {
            self.regs.rsr = status | Rsr::DIS;
            return false;
        }

        if failed {
            if errors.frame_alignment {
                self.bump_tally(TALLY_FRAME_ALIGNMENT);
            }
            if errors.crc {
                self.bump_tally(TALLY_CRC);
            }
            self.regs.isr.insert(Isr::RXE);
            if !self.regs.rcr.contains(Rcr::SEP) {
                debug!(instance, status = status.bits(), "dp8390: errored frame dropped");
                self.regs.rsr = status;
                return false;
            }
        } else {
            status.insert(Rsr::PRX);
        }

        let pages = pages_for_frame(frame.len());
        let avail = self.ring_free_pages();
        if avail <= pages {
            warn!(
                instance,
                pages,
                avail,
                curr = self.regs.curr_page,
                bnry = self.regs.bound_ptr,
                "dp8390: receive ring full, frame missed"
            );
            self.bump_tally(TALLY_MISSED);
            self.regs.rsr = Rsr::MPA;
            self.regs.isr.insert(Isr::OVW);
            return false;
        }

        self.store_frame(frame, status, pages);
        self.regs.rsr = status;
        if !failed {
            self.regs.isr.insert(Isr::PRX);
        }
        true
    }

    /// Returns `Some(is_group_address)` if the destination passes the RCR filters.
    fn accept_destination(&self, dst: &[u8; 6]) -> Option<bool> {
        let rcr = self.regs.rcr;
        let group = dst[0] & 0x01 != 0;
        if rcr.contains(Rcr::PRO) {
            return Some(group);
        }
        if *dst == BROADCAST {
            return rcr.contains(Rcr::AB).then_some(true);
        }
        if group {
            if !rcr.contains(Rcr::AM) {
                return None;
            }
            let idx = multicast_hash_index(dst);
            let listed = self.regs.mchash[idx >> 3] & (1 << (idx & 7)) != 0;
            return listed.then_some(true);
        }
        (*dst == self.regs.physaddr).then_some(false)
    }

    /// Free pages between CURR and BNRY, walking forward around the ring.
    pub(crate) fn ring_free_pages(&self) -> usize {
        let start = usize::from(self.regs.page_start);
        let stop = usize::from(self.regs.page_stop);
        let curr = usize::from(self.regs.curr_page);
        let bound = usize::from(self.regs.bound_ptr);
        if curr < bound {
            bound - curr
        } else {
            (stop - start).saturating_sub(curr - bound)
        }
    }

    fn store_frame(&mut self, frame: &[u8], status: Rsr, pages: usize) {
        let start = usize::from(self.regs.page_start);
        let stop = usize::from(self.regs.page_stop);
        let curr = self.regs.curr_page;

        let mut next = usize::from(curr) + pages;
        if next >= stop {
            next -= stop - start;
        }
        let next_page = next as u8;

        let count = (frame.len() + RX_HEADER_LEN) as u16;
        let header = [status.bits(), next_page, count as u8, (count >> 8) as u8];

        let ring_start = (start * PAGE_SIZE) as u32;
        let ring_stop = (stop * PAGE_SIZE) as u32;
        let mut addr = u32::from(curr) * PAGE_SIZE as u32;
        for &byte in header.iter().chain(frame) {
            self.mem.write_u8(addr, byte);
            addr += 1;
            if addr >= ring_stop {
                addr = ring_start;
            }
        }

        trace!(
            instance = self.config.instance,
            curr,
            next_page,
            len = frame.len(),
            status = status.bits(),
            "dp8390: frame stored"
        );
        self.regs.curr_page = next_page;
        self.regs.localpkt_ptr = next_page;
        self.regs.local_dma = addr as u16;
    }

    fn bump_tally(&mut self, counter: usize) {
        let tally = &mut self.regs.tally[counter];
        let before = *tally;
        *tally = tally.saturating_add(1);
        if before & 0x80 == 0 && *tally & 0x80 != 0 {
            self.regs.isr.insert(Isr::CNT);
        }
    }
}
